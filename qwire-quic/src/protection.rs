//! Initial packet protection (RFC 9001 Sections 5.2-5.4).
//!
//! Initial packets are protected with keys derived solely from the client's
//! destination connection ID, so any observer of the first flight can derive
//! them. This module implements that derivation (HKDF-SHA256 with the
//! per-version salt and labels), the AES-ECB header-protection mask, and
//! AES-128-GCM payload seal/open. Both directions are provided: the framer
//! opens client-protected packets, and packet builders (clients, tests) seal
//! them with the same keys.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::version::QuicVersion;

/// AES-128-GCM authentication tag length.
pub const AEAD_TAG_LEN: usize = 16;

const KEY_LEN: usize = 16;
const IV_LEN: usize = 12;
const HP_KEY_LEN: usize = 16;
const SAMPLE_LEN: usize = 16;

/// Which endpoint's traffic the keys protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Keys for packets the client sends ("client in").
    Client,
    /// Keys for packets the server sends ("server in").
    Server,
}

/// Traffic keys for one direction of Initial packet protection.
#[derive(Clone)]
pub struct InitialKeys {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
    hp: [u8; HP_KEY_LEN],
}

/// Derive Initial traffic keys from the destination connection ID
/// (RFC 9001 Section 5.2; v2 labels per RFC 9369 Section 3.3.2).
pub fn derive_initial_keys(
    dcid: &[u8],
    version: QuicVersion,
    direction: Direction,
) -> Result<InitialKeys> {
    let salt = version
        .initial_salt()
        .ok_or(Error::UnsupportedVersion(version.0))?;
    let label_prefix = version.key_label_prefix();

    let initial_secret = Hkdf::<Sha256>::new(Some(salt), dcid);

    let direction_label = match direction {
        Direction::Client => "client in",
        Direction::Server => "server in",
    };
    let mut traffic_secret = [0u8; 32];
    initial_secret
        .expand(&expand_label_info(direction_label, 32), &mut traffic_secret)
        .map_err(|_| Error::KeyDerivation)?;

    let traffic = Hkdf::<Sha256>::new(None, &traffic_secret);

    let mut key = [0u8; KEY_LEN];
    traffic
        .expand(
            &expand_label_info(&format!("{label_prefix} key"), KEY_LEN),
            &mut key,
        )
        .map_err(|_| Error::KeyDerivation)?;

    let mut iv = [0u8; IV_LEN];
    traffic
        .expand(
            &expand_label_info(&format!("{label_prefix} iv"), IV_LEN),
            &mut iv,
        )
        .map_err(|_| Error::KeyDerivation)?;

    let mut hp = [0u8; HP_KEY_LEN];
    traffic
        .expand(
            &expand_label_info(&format!("{label_prefix} hp"), HP_KEY_LEN),
            &mut hp,
        )
        .map_err(|_| Error::KeyDerivation)?;

    Ok(InitialKeys { key, iv, hp })
}

/// HKDF-Expand-Label info structure (RFC 8446 Section 7.1): two-byte output
/// length, "tls13 "-prefixed label, empty context.
fn expand_label_info(label: &str, out_len: usize) -> Vec<u8> {
    let full = format!("tls13 {label}");
    let mut info = Vec::with_capacity(4 + full.len());
    info.extend_from_slice(&(out_len as u16).to_be_bytes());
    info.push(full.len() as u8);
    info.extend_from_slice(full.as_bytes());
    info.push(0);
    info
}

impl InitialKeys {
    fn nonce(&self, packet_number: u64) -> [u8; IV_LEN] {
        let mut nonce = self.iv;
        let pn = packet_number.to_be_bytes();
        for i in 0..8 {
            nonce[IV_LEN - 8 + i] ^= pn[i];
        }
        nonce
    }

    /// Decrypt and authenticate a packet payload.
    pub fn open(&self, aad: &[u8], packet_number: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new_from_slice(&self.key).map_err(|_| Error::DecryptionFailed)?;
        let nonce = self.nonce(packet_number);
        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| Error::DecryptionFailed)
    }

    /// Encrypt a packet payload; the returned ciphertext carries the tag.
    pub fn seal(&self, aad: &[u8], packet_number: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new_from_slice(&self.key).map_err(|_| Error::EncryptionFailed)?;
        let nonce = self.nonce(packet_number);
        cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::EncryptionFailed)
    }

    /// AES-ECB mask over the 16-byte sample (RFC 9001 Section 5.4.3).
    fn header_protection_mask(&self, sample: &[u8]) -> Result<[u8; SAMPLE_LEN]> {
        use aes::cipher::{BlockEncrypt, KeyInit};
        use aes::Aes128;

        if sample.len() < SAMPLE_LEN {
            return Err(Error::HeaderProtection);
        }
        let cipher = Aes128::new_from_slice(&self.hp).map_err(|_| Error::HeaderProtection)?;
        let mut block = [0u8; SAMPLE_LEN];
        block.copy_from_slice(&sample[..SAMPLE_LEN]);
        cipher.encrypt_block(aes::Block::from_mut_slice(&mut block));
        Ok(block)
    }
}

/// Unmask the first byte and packet number of a long-header packet
/// (RFC 9001 Section 5.4.1). The sample starts four bytes past the start of
/// the packet number field. Returns the unprotected first byte, the
/// truncated packet number bytes, and the packet number length.
pub fn remove_header_protection(
    keys: &InitialKeys,
    packet: &[u8],
    pn_offset: usize,
) -> Result<(u8, [u8; 4], usize)> {
    let sample_offset = pn_offset + 4;
    if sample_offset + SAMPLE_LEN > packet.len() {
        return Err(Error::HeaderProtection);
    }
    let mask = keys.header_protection_mask(&packet[sample_offset..sample_offset + SAMPLE_LEN])?;

    let first_byte = packet[0] ^ (mask[0] & 0x0f);
    let pn_len = ((first_byte & 0x03) + 1) as usize;
    if pn_offset + pn_len > packet.len() {
        return Err(Error::HeaderProtection);
    }

    let mut pn_bytes = [0u8; 4];
    for i in 0..pn_len {
        pn_bytes[i] = packet[pn_offset + i] ^ mask[1 + i];
    }
    Ok((first_byte, pn_bytes, pn_len))
}

/// Mask the first byte and packet number of a long-header packet in place;
/// the inverse of [`remove_header_protection`], used when sealing.
pub fn apply_header_protection(
    keys: &InitialKeys,
    packet: &mut [u8],
    pn_offset: usize,
    pn_len: usize,
) -> Result<()> {
    let sample_offset = pn_offset + 4;
    if sample_offset + SAMPLE_LEN > packet.len() || pn_offset + pn_len > packet.len() {
        return Err(Error::HeaderProtection);
    }
    let mask = keys.header_protection_mask(&packet[sample_offset..sample_offset + SAMPLE_LEN])?;
    packet[0] ^= mask[0] & 0x0f;
    for i in 0..pn_len {
        packet[pn_offset + i] ^= mask[1 + i];
    }
    Ok(())
}

/// Reconstruct a full packet number from its truncated encoding
/// (RFC 9000 Appendix A.3).
pub fn decode_packet_number(largest_pn: u64, truncated_pn: u64, pn_len: usize) -> u64 {
    let pn_nbits = 8 * pn_len as u32;
    let expected = largest_pn + 1;
    let win = 1u64 << pn_nbits;
    let hwin = win / 2;
    let mask = win - 1;
    let candidate = (expected & !mask) | truncated_pn;
    if expected > hwin && candidate <= expected - hwin && candidate < (1u64 << 62) - win {
        candidate + win
    } else if candidate > expected + hwin && candidate >= win {
        candidate - win
    } else {
        candidate
    }
}
