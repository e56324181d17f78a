//! Encoder configuration.

/// Tunables for frame serialization.
///
/// Defaults are what a production endpoint wants; the knobs exist mostly
/// for interop testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderConfig {
    /// Randomize GREASE frames instead of emitting the fixed reserved
    /// type with a one-byte payload.
    ///
    /// RFC 9114 Section 7.2.8: implementations may send frames of reserved
    /// types to exercise peers' handling of unknown frames. The randomized
    /// variant draws the type from the `0x1f * N + 0x21` pattern and a
    /// payload of up to three random bytes.
    pub enable_grease_randomness: bool,
}
