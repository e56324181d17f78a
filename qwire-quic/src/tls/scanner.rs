//! A buffers-only TLS driver that stops at the ClientHello.
//!
//! [`ChloScanner`] accumulates Initial-level handshake bytes and, once a
//! complete first handshake message is buffered, parses it as a ClientHello
//! and runs certificate selection. It never derives keys and never writes
//! handshake messages of its own; when selection aborts, it raises the
//! handshake-failure alert a full TLS stack would send in its place.

use bytes::{Bytes, BytesMut};

use crate::buf::DataReader;
use crate::error::{Error, Result};
use crate::tls::{
    alert, ClientHello, EncryptionLevel, SelectCertResult, TlsCallbacks, TlsDriver,
    EXTENSION_SERVER_NAME,
};

/// Upper bound on buffered handshake bytes before we give up on the peer.
const MAX_BUFFERED_BYTES: usize = 64 * 1024;

/// TLS handshake message type for ClientHello (RFC 8446 Section 4).
const HANDSHAKE_CLIENT_HELLO: u8 = 1;

/// Handshake message header: one type byte plus a 24-bit length.
const HANDSHAKE_HEADER_LEN: usize = 4;

#[derive(Debug, Default)]
pub struct ChloScanner {
    buffer: BytesMut,
    concluded: bool,
}

impl ChloScanner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TlsDriver for ChloScanner {
    fn provide_data(
        &mut self,
        level: EncryptionLevel,
        data: &[u8],
        _callbacks: &mut dyn TlsCallbacks,
    ) -> Result<()> {
        if level != EncryptionLevel::Initial {
            return Err(Error::Tls("handshake data at unexpected encryption level"));
        }
        if self.concluded {
            return Ok(());
        }
        if self.buffer.len() + data.len() > MAX_BUFFERED_BYTES {
            return Err(Error::CryptoBufferExceeded);
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn drive_handshake(&mut self, callbacks: &mut dyn TlsCallbacks) {
        if self.concluded || self.buffer.len() < HANDSHAKE_HEADER_LEN {
            return;
        }

        let msg_type = self.buffer[0];
        let body_len =
            u32::from_be_bytes([0, self.buffer[1], self.buffer[2], self.buffer[3]]) as usize;

        if msg_type != HANDSHAKE_CLIENT_HELLO {
            self.concluded = true;
            callbacks.on_send_alert(EncryptionLevel::Initial, alert::UNEXPECTED_MESSAGE);
            return;
        }
        if self.buffer.len() < HANDSHAKE_HEADER_LEN + body_len {
            // Fragmented ClientHello; wait for more crypto stream bytes.
            return;
        }

        let body = &self.buffer[HANDSHAKE_HEADER_LEN..HANDSHAKE_HEADER_LEN + body_len];
        let client_hello = match parse_client_hello_body(body) {
            Ok(hello) => hello,
            Err(_) => {
                self.concluded = true;
                callbacks.on_send_alert(EncryptionLevel::Initial, alert::DECODE_ERROR);
                return;
            }
        };

        self.concluded = true;
        match callbacks.on_select_certificate(&client_hello) {
            SelectCertResult::Abort => {
                callbacks.on_send_alert(EncryptionLevel::Initial, alert::HANDSHAKE_FAILURE);
            }
            // Continuing would require actual key negotiation, which this
            // driver does not implement; selection is as far as it goes.
            SelectCertResult::Proceed => {}
        }
    }
}

/// Parse a ClientHello body (RFC 8446 Section 4.1.2), everything after the
/// handshake message header.
fn parse_client_hello_body(body: &[u8]) -> Result<ClientHello> {
    let mut r = DataReader::new(body);
    r.read_u16()?; // legacy_version
    r.read_bytes(32)?; // random
    r.read_length_prefixed_u8()?; // legacy_session_id
    let cipher_suites = r.read_length_prefixed_u16()?;
    if cipher_suites.is_empty() || cipher_suites.len() % 2 != 0 {
        return Err(Error::Tls("malformed cipher suite list"));
    }
    r.read_length_prefixed_u8()?; // legacy_compression_methods

    let mut hello = ClientHello::default();
    if r.is_done() {
        // The extension block is optional on the wire.
        return Ok(hello);
    }

    let extensions = r.read_length_prefixed_u16()?;
    let mut er = DataReader::new(extensions);
    while !er.is_done() {
        let extension_type = er.read_u16()?;
        let payload = er.read_length_prefixed_u16()?;
        if extension_type == EXTENSION_SERVER_NAME {
            hello.server_name = parse_server_name(payload);
        }
        hello
            .extensions
            .push((extension_type, Bytes::copy_from_slice(payload)));
    }
    Ok(hello)
}

/// Pull the host name out of a server_name extension (RFC 6066 Section 3).
fn parse_server_name(payload: &[u8]) -> Option<String> {
    let mut r = DataReader::new(payload);
    let list = r.read_length_prefixed_u16().ok()?;
    let mut lr = DataReader::new(list);
    while !lr.is_done() {
        let name_type = lr.read_u8().ok()?;
        let name = lr.read_length_prefixed_u16().ok()?;
        if name_type == 0 {
            return String::from_utf8(name.to_vec()).ok();
        }
    }
    None
}
