//! Packet-to-frames parsing with a visitor interface.
//!
//! [`QuicFramer`] turns one received datagram into callbacks on a
//! [`FramerVisitor`]: first the unauthenticated header, then, if the visitor
//! accepts, each frame of the decrypted payload. The framer carries no
//! connection state beyond the negotiated version, the Initial keys, and the
//! largest packet number seen; everything else is the visitor's business.
//!
//! Because the visitor is borrowed for the duration of
//! [`QuicFramer::process_packet`], it cannot reach back into the framer.
//! Key installation is therefore expressed as a [`HeaderDisposition`]: the
//! visitor inspects the header and tells the framer whether to derive
//! Initial obfuscators from the destination connection ID and continue.

use tracing::debug;

use crate::buf::DataReader;
use crate::error::Result;
use crate::packet::{parse_unauthenticated_header, PacketHeader};
use crate::protection::{
    decode_packet_number, derive_initial_keys, remove_header_protection, Direction, InitialKeys,
    AEAD_TAG_LEN,
};
use crate::tls::EncryptionLevel;
use crate::version::QuicVersion;

/// Which endpoint this framer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    Client,
    Server,
}

/// Verdict from the header callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDisposition {
    /// Derive Initial protection from this header's destination connection
    /// ID, then decrypt and walk the frames.
    InstallInitialKeys,
    /// Stop processing this packet.
    Drop,
}

/// Receiver for parse events.
pub trait FramerVisitor {
    /// Called once the unprotected header fields are known.
    fn on_unauthenticated_public_header(&mut self, header: &PacketHeader) -> HeaderDisposition;

    /// Called when the wire version disagrees with the framer's version.
    /// Returning `false` abandons the packet.
    fn on_version_mismatch(&mut self, version: QuicVersion) -> bool;

    /// Called for each CRYPTO frame. Returning `false` abandons the packet.
    fn on_crypto_frame(&mut self, level: EncryptionLevel, offset: u64, data: &[u8]) -> bool;
}

/// Parses received packets of a single QUIC version.
pub struct QuicFramer {
    version: QuicVersion,
    perspective: Perspective,
    keys: Option<InitialKeys>,
    largest_packet_number: u64,
}

impl QuicFramer {
    /// `expected_connection_id_length` only matters for short-header
    /// packets; callers that drop those can pass zero.
    pub fn new(
        version: QuicVersion,
        perspective: Perspective,
        _expected_connection_id_length: usize,
    ) -> Self {
        Self {
            version,
            perspective,
            keys: None,
            largest_packet_number: 0,
        }
    }

    pub fn version(&self) -> QuicVersion {
        self.version
    }

    pub fn is_supported_version(&self, version: QuicVersion) -> bool {
        version == self.version
    }

    /// Derive and install Initial packet protection for the peer's traffic
    /// from a destination connection ID.
    pub fn set_initial_obfuscators(&mut self, dcid: &[u8]) -> Result<()> {
        let direction = match self.perspective {
            Perspective::Server => Direction::Client,
            Perspective::Client => Direction::Server,
        };
        self.keys = Some(derive_initial_keys(dcid, self.version, direction)?);
        Ok(())
    }

    /// Parse one received datagram, invoking the visitor synchronously.
    /// Returns overall parse success; failures leave the visitor free to
    /// keep feeding later packets.
    pub fn process_packet(&mut self, packet: &[u8], visitor: &mut dyn FramerVisitor) -> bool {
        let (header, layout) = match parse_unauthenticated_header(packet) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("dropping unparseable packet: {e}");
                return false;
            }
        };

        if let Some(wire_version) = header.version {
            if wire_version != self.version {
                return visitor.on_version_mismatch(wire_version);
            }
        }

        match visitor.on_unauthenticated_public_header(&header) {
            HeaderDisposition::Drop => return false,
            HeaderDisposition::InstallInitialKeys => {
                if let Err(e) =
                    self.set_initial_obfuscators(header.destination_connection_id.as_slice())
                {
                    debug!("failed to derive initial keys: {e}");
                    return false;
                }
            }
        }

        let Some(layout) = layout else {
            debug!("no decryptable payload in accepted packet");
            return false;
        };
        let Some(keys) = self.keys.as_ref() else {
            return false;
        };

        let (first_byte, pn_bytes, pn_len) =
            match remove_header_protection(keys, packet, layout.pn_offset) {
                Ok(unmasked) => unmasked,
                Err(e) => {
                    debug!("failed to remove header protection: {e}");
                    return false;
                }
            };

        let truncated = pn_bytes[..pn_len]
            .iter()
            .fold(0u64, |acc, &b| acc << 8 | b as u64);
        let packet_number = decode_packet_number(self.largest_packet_number, truncated, pn_len);

        let payload_start = layout.pn_offset + pn_len;
        let payload_end = layout.pn_offset + layout.payload_length;
        if payload_end > packet.len() || payload_start + AEAD_TAG_LEN > payload_end {
            debug!("length field inconsistent with packet size");
            return false;
        }

        let mut aad = Vec::with_capacity(payload_start);
        aad.push(first_byte);
        aad.extend_from_slice(&packet[1..layout.pn_offset]);
        aad.extend_from_slice(&pn_bytes[..pn_len]);

        let plaintext = match keys.open(&aad, packet_number, &packet[payload_start..payload_end]) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                debug!("failed to decrypt packet: {e}");
                return false;
            }
        };

        if packet_number > self.largest_packet_number {
            self.largest_packet_number = packet_number;
        }

        self.process_frames(&plaintext, visitor)
    }

    /// Walk the frames of a decrypted Initial payload (RFC 9000
    /// Section 12.4 lists which types may appear there).
    fn process_frames(&self, payload: &[u8], visitor: &mut dyn FramerVisitor) -> bool {
        let mut r = DataReader::new(payload);
        while !r.is_done() {
            let frame_type = match r.read_varint() {
                Ok(ty) => ty,
                Err(_) => return false,
            };
            let ok = match frame_type {
                0x00 | 0x01 => true, // PADDING, PING
                0x02 | 0x03 => skip_ack_frame(&mut r, frame_type == 0x03).is_ok(),
                0x06 => match self.read_crypto_frame(&mut r, visitor) {
                    Ok(keep_going) => keep_going,
                    Err(_) => false,
                },
                0x1c => skip_connection_close(&mut r).is_ok(),
                _ => {
                    debug!("unexpected frame type {frame_type:#x} in Initial packet");
                    false
                }
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn read_crypto_frame(
        &self,
        r: &mut DataReader<'_>,
        visitor: &mut dyn FramerVisitor,
    ) -> Result<bool> {
        let offset = r.read_varint()?;
        let length = r.read_varint()?;
        let data = r.read_bytes(length as usize)?;
        Ok(visitor.on_crypto_frame(EncryptionLevel::Initial, offset, data))
    }
}

fn skip_ack_frame(r: &mut DataReader<'_>, has_ecn: bool) -> Result<()> {
    r.read_varint()?; // largest acknowledged
    r.read_varint()?; // ack delay
    let range_count = r.read_varint()?;
    r.read_varint()?; // first ack range
    for _ in 0..range_count {
        r.read_varint()?; // gap
        r.read_varint()?; // ack range length
    }
    if has_ecn {
        r.read_varint()?;
        r.read_varint()?;
        r.read_varint()?;
    }
    Ok(())
}

fn skip_connection_close(r: &mut DataReader<'_>) -> Result<()> {
    r.read_varint()?; // error code
    r.read_varint()?; // offending frame type
    let reason_len = r.read_varint()?;
    r.read_bytes(reason_len as usize)?;
    Ok(())
}
