//! Packet header types and unauthenticated header parsing (RFC 9000
//! Section 17, RFC 8999).
//!
//! Only the version-independent invariants and the long-header layout are
//! parsed here; everything after the length field is protected and belongs
//! to [`crate::protection`].

use crate::buf::DataReader;
use crate::error::{Error, Result};
use crate::version::QuicVersion;

/// Maximum connection ID length per RFC 9000 Section 17.2.
pub const MAX_CONNECTION_ID_LENGTH: usize = 20;

/// An owned connection ID of up to 20 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    len: u8,
    bytes: [u8; MAX_CONNECTION_ID_LENGTH],
}

impl ConnectionId {
    /// The zero-length connection ID.
    pub const EMPTY: ConnectionId = ConnectionId {
        len: 0,
        bytes: [0; MAX_CONNECTION_ID_LENGTH],
    };

    /// Copy `bytes` into a connection ID. Returns `None` above 20 bytes.
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_CONNECTION_ID_LENGTH {
            return None;
        }
        let mut cid = Self::EMPTY;
        cid.len = bytes.len() as u8;
        cid.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(cid)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.as_slice() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Header form selected by the first bit (RFC 8999 Section 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketForm {
    LongHeader,
    ShortHeader,
}

/// Long-header packet types. The type-bit mapping rotated in v2
/// (RFC 9369 Section 3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPacketType {
    Initial,
    ZeroRtt,
    Handshake,
    Retry,
}

impl LongPacketType {
    pub fn from_first_byte(first_byte: u8, version: QuicVersion) -> Self {
        let bits = (first_byte >> 4) & 0x03;
        if version == QuicVersion::V2 {
            match bits {
                0 => LongPacketType::Retry,
                1 => LongPacketType::Initial,
                2 => LongPacketType::ZeroRtt,
                _ => LongPacketType::Handshake,
            }
        } else {
            match bits {
                0 => LongPacketType::Initial,
                1 => LongPacketType::ZeroRtt,
                2 => LongPacketType::Handshake,
                _ => LongPacketType::Retry,
            }
        }
    }
}

/// The unauthenticated parts of a packet header.
#[derive(Debug, Clone)]
pub struct PacketHeader {
    pub form: PacketForm,
    /// `None` for short headers.
    pub long_packet_type: Option<LongPacketType>,
    /// Wire version; `None` for short headers.
    pub version: Option<QuicVersion>,
    pub destination_connection_id: ConnectionId,
    pub source_connection_id: ConnectionId,
}

/// Byte offsets the decrypter needs, valid only for Initial packets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderLayout {
    /// Offset of the (protected) packet number field.
    pub pn_offset: usize,
    /// Value of the Length field: packet number plus ciphertext.
    pub payload_length: usize,
}

/// Parse the unprotected parts of a packet header.
///
/// Short headers yield a header with empty connection IDs (this parser is
/// configured for a zero-length server connection ID, which is fine because
/// callers drop short headers anyway). For Initial packets the token is
/// parsed and skipped and the layout for decryption is returned.
pub(crate) fn parse_unauthenticated_header(
    packet: &[u8],
) -> Result<(PacketHeader, Option<HeaderLayout>)> {
    let mut r = DataReader::new(packet);
    let first = r.read_u8().map_err(|_| Error::PacketParse("empty packet"))?;

    if first & 0x80 == 0 {
        if first & 0x40 == 0 {
            return Err(Error::PacketParse("fixed bit unset"));
        }
        let header = PacketHeader {
            form: PacketForm::ShortHeader,
            long_packet_type: None,
            version: None,
            destination_connection_id: ConnectionId::EMPTY,
            source_connection_id: ConnectionId::EMPTY,
        };
        return Ok((header, None));
    }

    let version_raw = r
        .read_u32()
        .map_err(|_| Error::PacketParse("truncated version"))?;
    if version_raw == 0 {
        // Version Negotiation packets carry no frames we care about.
        return Err(Error::PacketParse("version negotiation packet"));
    }
    if first & 0x40 == 0 {
        return Err(Error::PacketParse("fixed bit unset"));
    }
    let version = QuicVersion(version_raw);

    let dcid_len = r.read_u8().map_err(|_| Error::PacketParse("truncated DCID length"))? as usize;
    if dcid_len > MAX_CONNECTION_ID_LENGTH {
        return Err(Error::PacketParse("DCID too long"));
    }
    let dcid = r
        .read_bytes(dcid_len)
        .map_err(|_| Error::PacketParse("truncated DCID"))?;

    let scid_len = r.read_u8().map_err(|_| Error::PacketParse("truncated SCID length"))? as usize;
    if scid_len > MAX_CONNECTION_ID_LENGTH {
        return Err(Error::PacketParse("SCID too long"));
    }
    let scid = r
        .read_bytes(scid_len)
        .map_err(|_| Error::PacketParse("truncated SCID"))?;

    let long_packet_type = LongPacketType::from_first_byte(first, version);

    let layout = if long_packet_type == LongPacketType::Initial {
        let token_len = r
            .read_varint()
            .map_err(|_| Error::PacketParse("truncated token length"))?;
        r.read_bytes(token_len as usize)
            .map_err(|_| Error::PacketParse("truncated token"))?;
        let payload_length = r
            .read_varint()
            .map_err(|_| Error::PacketParse("truncated length field"))?;
        Some(HeaderLayout {
            pn_offset: r.position(),
            payload_length: payload_length as usize,
        })
    } else {
        None
    };

    let header = PacketHeader {
        form: PacketForm::LongHeader,
        long_packet_type: Some(long_packet_type),
        version: Some(version),
        destination_connection_id: ConnectionId::new(dcid).unwrap_or(ConnectionId::EMPTY),
        source_connection_id: ConnectionId::new(scid).unwrap_or(ConnectionId::EMPTY),
    };
    Ok((header, layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial_packet_bytes() -> Vec<u8> {
        let mut packet = vec![
            0xc0, 0x00, 0x00, 0x00, 0x01, // long header, Initial, v1
            0x08, // DCID length
            0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08, // DCID
            0x00, // SCID length
            0x00, // token length
            0x41, 0x02, // length = 0x102 (2-byte varint)
        ];
        packet.resize(packet.len() + 0x102, 0);
        packet
    }

    #[test]
    fn test_parse_initial_header() {
        let packet = initial_packet_bytes();
        let (header, layout) = parse_unauthenticated_header(&packet).unwrap();
        assert_eq!(header.form, PacketForm::LongHeader);
        assert_eq!(header.long_packet_type, Some(LongPacketType::Initial));
        assert_eq!(header.version, Some(QuicVersion::V1));
        assert_eq!(
            header.destination_connection_id.as_slice(),
            &[0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08]
        );
        assert!(header.source_connection_id.is_empty());
        let layout = layout.unwrap();
        assert_eq!(layout.pn_offset, 18);
        assert_eq!(layout.payload_length, 0x102);
    }

    #[test]
    fn test_parse_skips_token() {
        let packet = vec![
            0xc0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, // no connection IDs
            0x04, 0xaa, 0xbb, 0xcc, 0xdd, // 4-byte token
            0x05, 1, 2, 3, 4, 5, // length + payload
        ];
        let (header, layout) = parse_unauthenticated_header(&packet).unwrap();
        assert_eq!(header.long_packet_type, Some(LongPacketType::Initial));
        assert_eq!(layout.unwrap().pn_offset, 13);
    }

    #[test]
    fn test_short_header_dropped_to_caller() {
        let (header, layout) = parse_unauthenticated_header(&[0x40, 0x01, 0x02]).unwrap();
        assert_eq!(header.form, PacketForm::ShortHeader);
        assert!(header.long_packet_type.is_none());
        assert!(layout.is_none());
    }

    #[test]
    fn test_handshake_packet_has_no_layout() {
        let packet = vec![
            0xe0, 0x00, 0x00, 0x00, 0x01, // long header, type bits 0b10 = Handshake (v1)
            0x00, 0x00,
        ];
        let (header, layout) = parse_unauthenticated_header(&packet).unwrap();
        assert_eq!(header.long_packet_type, Some(LongPacketType::Handshake));
        assert!(layout.is_none());
    }

    #[test]
    fn test_v2_type_rotation() {
        assert_eq!(
            LongPacketType::from_first_byte(0xd0, QuicVersion::V2),
            LongPacketType::Initial
        );
        assert_eq!(
            LongPacketType::from_first_byte(0xc0, QuicVersion::V2),
            LongPacketType::Retry
        );
        assert_eq!(
            LongPacketType::from_first_byte(0xc0, QuicVersion::V1),
            LongPacketType::Initial
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_unauthenticated_header(&[]).is_err());
        // fixed bit unset
        assert!(parse_unauthenticated_header(&[0x80, 0, 0, 0, 1, 0, 0]).is_err());
        // version negotiation
        assert!(parse_unauthenticated_header(&[0xc0, 0, 0, 0, 0, 0, 0]).is_err());
        // truncated DCID
        assert!(parse_unauthenticated_header(&[0xc0, 0, 0, 0, 1, 0x08, 1, 2]).is_err());
        // oversized DCID length
        let mut p = vec![0xc0, 0, 0, 0, 1, 21];
        p.resize(64, 0);
        assert!(parse_unauthenticated_header(&p).is_err());
    }
}
