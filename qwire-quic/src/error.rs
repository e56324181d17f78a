//! Error types for QUIC wire-format operations.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Failures raised by the codec, packet protection, and extractor plumbing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Value does not fit the 62-bit variable-length integer range.
    #[error("value {0} exceeds the 62-bit varint range")]
    VarIntRange(u64),

    /// Writer has fewer bytes remaining than the operation needs.
    #[error("writer overflow: need {needed} bytes, {remaining} remaining")]
    WriterOverflow { needed: usize, remaining: usize },

    /// Input ended in the middle of the named field.
    #[error("truncated input while reading {0}")]
    Truncated(&'static str),

    /// Packet bytes violate the header layout.
    #[error("malformed packet: {0}")]
    PacketParse(&'static str),

    /// Version is not one this library derives Initial keys for.
    #[error("unsupported QUIC version {0:#010x}")]
    UnsupportedVersion(u32),

    /// HKDF expansion of the Initial secret failed.
    #[error("initial key derivation failed")]
    KeyDerivation,

    /// AEAD open failed (bad keys, corrupt ciphertext, or wrong AAD).
    #[error("packet decryption failed")]
    DecryptionFailed,

    /// AEAD seal failed.
    #[error("packet encryption failed")]
    EncryptionFailed,

    /// Header protection sample unavailable or mask computation failed.
    #[error("header protection failed")]
    HeaderProtection,

    /// Overlapping crypto stream retransmission carried different bytes.
    #[error("inconsistent crypto stream data at offset {0}")]
    InconsistentStreamData(u64),

    /// More handshake bytes buffered than the driver is willing to hold.
    #[error("crypto buffer limit exceeded")]
    CryptoBufferExceeded,

    /// The TLS driver rejected provided input.
    #[error("TLS driver rejected input: {0}")]
    Tls(&'static str),
}
