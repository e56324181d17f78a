//! QUIC version registry (RFC 8999, RFC 9000 Section 15, RFC 9369).
//!
//! Versions differ in three ways this crate cares about: whether we derive
//! Initial keys for them at all, which handshake protocol rides the crypto
//! stream, and the salt/label pair used for Initial secret derivation.

/// Handshake protocol carried on the crypto stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeProtocol {
    /// TLS 1.3 (RFC 9001). All standardized versions.
    Tls13,
    /// The pre-standard Google crypto handshake ("Q0xx" versions).
    QuicCrypto,
}

/// A QUIC version label as carried in long packet headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuicVersion(pub u32);

impl QuicVersion {
    /// Version Negotiation marker (RFC 9000 Section 6).
    pub const NEGOTIATION: QuicVersion = QuicVersion(0x0000_0000);

    /// QUIC v1 (RFC 9000).
    pub const V1: QuicVersion = QuicVersion(0x0000_0001);

    /// QUIC v2 (RFC 9369), functionally v1 with rotated packet protection.
    pub const V2: QuicVersion = QuicVersion(0x6b33_43cf);

    /// Whether this library can process Initial packets of this version.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::V1 | Self::V2)
    }

    /// The handshake protocol a client of this version speaks.
    pub fn handshake_protocol(self) -> HandshakeProtocol {
        if self.is_legacy_google() {
            HandshakeProtocol::QuicCrypto
        } else {
            HandshakeProtocol::Tls13
        }
    }

    /// Pre-standard versions advertise themselves as ASCII "Q0xx".
    fn is_legacy_google(self) -> bool {
        self.0 >> 16 == 0x5130
    }

    /// Initial salt for key derivation (RFC 9001 Section 5.2, RFC 9369
    /// Section 3.3.1). `None` for versions we do not support.
    pub fn initial_salt(self) -> Option<&'static [u8; 20]> {
        match self {
            Self::V1 => Some(&V1_INITIAL_SALT),
            Self::V2 => Some(&V2_INITIAL_SALT),
            _ => None,
        }
    }

    /// Label prefix for Initial traffic key expansion ("quic key" vs
    /// "quicv2 key", RFC 9369 Section 3.3.2).
    pub fn key_label_prefix(self) -> &'static str {
        match self {
            Self::V2 => "quicv2",
            _ => "quic",
        }
    }
}

const V1_INITIAL_SALT: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c,
    0xad, 0xcc, 0xbb, 0x7f, 0x0a,
];

const V2_INITIAL_SALT: [u8; 20] = [
    0x0d, 0xed, 0xe3, 0xde, 0xf7, 0x00, 0xa6, 0xdb, 0x81, 0x93, 0x81, 0xbe, 0x6e, 0x26, 0x9d,
    0xcb, 0xf9, 0xbd, 0x2e, 0xd9,
];
