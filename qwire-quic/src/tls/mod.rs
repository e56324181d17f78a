//! TLS driver interface for handshake inspection.
//!
//! The extractor drives a TLS 1.3 engine just far enough to see a
//! ClientHello. The engine is modeled as a buffers-only [`TlsDriver`]:
//! record bytes go in at an encryption level, and everything the engine has
//! to say comes back through a [`TlsCallbacks`] object passed explicitly
//! into every call. Passing the callbacks object per call (rather than
//! registering a static callback plus a user-data slot) means there is no
//! back-pointer to keep alive and nothing to re-register when the owner
//! moves.
//!
//! Six callback slots exist. For a ClientHello-only consumer, only
//! certificate selection and (after aborting) a handshake-failure alert are
//! expected; the key/message callbacks firing at all means the handshake
//! progressed past the point we ever feed it to.

mod scanner;

pub use scanner::ChloScanner;

use bytes::Bytes;

use crate::error::Result;

/// Encryption levels of the QUIC crypto stream (RFC 9001 Section 4.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EncryptionLevel {
    Initial,
    ZeroRTT,
    Handshake,
    OneRTT,
}

/// TLS alert codes this crate names (RFC 8446 Section 6).
pub mod alert {
    pub const UNEXPECTED_MESSAGE: u8 = 10;
    pub const HANDSHAKE_FAILURE: u8 = 40;
    pub const DECODE_ERROR: u8 = 50;

    /// Human-readable alert description for diagnostics.
    pub fn description(alert: u8) -> &'static str {
        match alert {
            UNEXPECTED_MESSAGE => "unexpected_message",
            HANDSHAKE_FAILURE => "handshake_failure",
            DECODE_ERROR => "decode_error",
            _ => "unknown_alert",
        }
    }
}

/// ClientHello extension type codes used here (RFC 8446 Section 4.2).
pub const EXTENSION_SERVER_NAME: u16 = 0;
pub const EXTENSION_ALPN: u16 = 16;

/// Verdict returned from certificate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectCertResult {
    /// Continue the handshake.
    Proceed,
    /// Cancel all further processing.
    Abort,
}

/// A parsed ClientHello as surfaced to the certificate-selection callback.
///
/// Extension payloads are exposed exactly as they appeared on the wire;
/// validating their contents is the callback's problem.
#[derive(Debug, Clone, Default)]
pub struct ClientHello {
    pub(crate) server_name: Option<String>,
    pub(crate) extensions: Vec<(u16, Bytes)>,
}

impl ClientHello {
    /// The SNI host name, if the client sent one.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Raw payload of the first extension with the given type code.
    pub fn extension(&self, extension_type: u16) -> Option<&[u8]> {
        self.extensions
            .iter()
            .find(|(ty, _)| *ty == extension_type)
            .map(|(_, payload)| payload.as_ref())
    }
}

/// Receiver for everything a TLS driver reports back.
pub trait TlsCallbacks {
    fn on_set_read_secret(&mut self, level: EncryptionLevel);
    fn on_set_write_secret(&mut self, level: EncryptionLevel);
    fn on_write_message(&mut self, level: EncryptionLevel, data: &[u8]);
    fn on_flush_flight(&mut self);
    fn on_send_alert(&mut self, level: EncryptionLevel, alert: u8);
    fn on_select_certificate(&mut self, client_hello: &ClientHello) -> SelectCertResult;
}

/// A TLS 1.3 engine driven with buffers only, in server mode.
pub trait TlsDriver {
    /// Hand the driver reassembled crypto stream bytes at `level`.
    fn provide_data(
        &mut self,
        level: EncryptionLevel,
        data: &[u8],
        callbacks: &mut dyn TlsCallbacks,
    ) -> Result<()>;

    /// Let the driver make whatever progress it can. Outcomes are reported
    /// through the callbacks; there is deliberately no return value.
    fn drive_handshake(&mut self, callbacks: &mut dyn TlsCallbacks);
}
