//! In-order reassembly of crypto stream bytes.
//!
//! CRYPTO frames arrive as (offset, bytes) ranges that may duplicate,
//! overlap, or precede a gap. The sequencer keeps non-overlapping chunks in
//! a BTreeMap keyed by offset, clips anything already consumed, and reports
//! when the contiguous region at the read cursor grows so the caller knows
//! to drain. Overlapping retransmissions must byte-match what is already
//! buffered; a disagreement is not recoverable.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct CryptoStreamSequencer {
    chunks: BTreeMap<u64, Bytes>,
    read_offset: u64,
}

impl CryptoStreamSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next byte the consumer will read.
    pub fn read_offset(&self) -> u64 {
        self.read_offset
    }

    /// Length of the contiguous run of buffered bytes at the read cursor.
    fn readable_len(&self) -> usize {
        let mut cursor = self.read_offset;
        let mut len = 0usize;
        for (&offset, chunk) in self.chunks.range(self.read_offset..) {
            if offset != cursor {
                break;
            }
            cursor += chunk.len() as u64;
            len += chunk.len();
        }
        len
    }

    /// Buffer one received range. Returns whether the contiguous readable
    /// region grew.
    ///
    /// # Errors
    ///
    /// `InconsistentStreamData` if an overlap disagrees with bytes already
    /// buffered.
    pub fn insert(&mut self, offset: u64, data: &[u8]) -> Result<bool> {
        let before = self.readable_len();

        let mut offset = offset;
        let mut data = Bytes::copy_from_slice(data);

        // Clip the part that was already consumed.
        if offset < self.read_offset {
            let skip = self.read_offset - offset;
            if skip >= data.len() as u64 {
                return Ok(false);
            }
            data = data.slice(skip as usize..);
            offset = self.read_offset;
        }

        while !data.is_empty() {
            let end = offset + data.len() as u64;

            // A chunk starting at or before `offset` may cover its front.
            if let Some((&prev_offset, prev_chunk)) = self.chunks.range(..=offset).next_back() {
                let prev_end = prev_offset + prev_chunk.len() as u64;
                if prev_end > offset {
                    let shared = (prev_end.min(end) - offset) as usize;
                    let within = (offset - prev_offset) as usize;
                    if prev_chunk[within..within + shared] != data[..shared] {
                        return Err(Error::InconsistentStreamData(offset));
                    }
                    data = data.slice(shared..);
                    offset += shared as u64;
                    continue;
                }
            }

            // Free until the next buffered chunk, if any starts inside us.
            match self.chunks.range(offset..end).next().map(|(&o, _)| o) {
                Some(next_offset) => {
                    let piece = (next_offset - offset) as usize;
                    self.chunks.insert(offset, data.slice(..piece));
                    data = data.slice(piece..);
                    offset = next_offset;
                }
                None => {
                    self.chunks.insert(offset, data);
                    break;
                }
            }
        }

        Ok(self.readable_len() > before)
    }

    /// The next contiguous region at the read cursor, if any.
    pub fn next_region(&self) -> Option<Bytes> {
        self.chunks.get(&self.read_offset).cloned()
    }

    /// Consume `n` bytes of the region returned by [`next_region`].
    pub fn mark_consumed(&mut self, n: usize) {
        let Some(chunk) = self.chunks.remove(&self.read_offset) else {
            debug_assert_eq!(n, 0, "consumed bytes with nothing buffered");
            return;
        };
        let n = n.min(chunk.len());
        if n < chunk.len() {
            self.chunks
                .insert(self.read_offset + n as u64, chunk.slice(n..));
        }
        self.read_offset += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(seq: &mut CryptoStreamSequencer) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(region) = seq.next_region() {
            out.extend_from_slice(&region);
            seq.mark_consumed(region.len());
        }
        out
    }

    #[test]
    fn test_in_order_delivery() {
        let mut seq = CryptoStreamSequencer::new();
        assert!(seq.insert(0, b"hello").unwrap());
        assert!(seq.insert(5, b" world").unwrap());
        assert_eq!(drain(&mut seq), b"hello world");
        assert_eq!(seq.read_offset(), 11);
    }

    #[test]
    fn test_out_of_order_held_back() {
        let mut seq = CryptoStreamSequencer::new();
        assert!(!seq.insert(5, b"world").unwrap());
        assert!(seq.next_region().is_none());
        assert!(seq.insert(0, b"hello").unwrap());
        assert_eq!(drain(&mut seq), b"helloworld");
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        let mut seq = CryptoStreamSequencer::new();
        assert!(seq.insert(0, b"hello").unwrap());
        assert!(!seq.insert(0, b"hello").unwrap());
        assert_eq!(drain(&mut seq), b"hello");
        // Retransmission of consumed bytes is ignored outright.
        assert!(!seq.insert(0, b"hello").unwrap());
        assert!(seq.next_region().is_none());
    }

    #[test]
    fn test_overlap_fills_gap() {
        let mut seq = CryptoStreamSequencer::new();
        assert!(!seq.insert(4, b"efgh").unwrap());
        // Overlaps the buffered chunk on both sides.
        assert!(seq.insert(0, b"abcdefghij").unwrap());
        assert_eq!(drain(&mut seq), b"abcdefghij");
    }

    #[test]
    fn test_overlap_mismatch_detected() {
        let mut seq = CryptoStreamSequencer::new();
        seq.insert(0, b"hello").unwrap();
        assert_eq!(
            seq.insert(3, b"XY"),
            Err(Error::InconsistentStreamData(3))
        );
    }

    #[test]
    fn test_partial_consume() {
        let mut seq = CryptoStreamSequencer::new();
        seq.insert(0, b"hello world").unwrap();
        let region = seq.next_region().unwrap();
        assert_eq!(&region[..], b"hello world");
        seq.mark_consumed(5);
        assert_eq!(seq.read_offset(), 5);
        assert_eq!(&seq.next_region().unwrap()[..], b" world");
    }

    #[test]
    fn test_straddling_consumed_prefix() {
        let mut seq = CryptoStreamSequencer::new();
        seq.insert(0, b"hello").unwrap();
        assert_eq!(drain(&mut seq), b"hello");
        // Retransmission straddles the cursor; only the tail is new.
        assert!(seq.insert(3, b"lo world").unwrap());
        assert_eq!(drain(&mut seq), b" world");
    }

    #[test]
    fn test_growth_signal_only_at_cursor() {
        let mut seq = CryptoStreamSequencer::new();
        assert!(!seq.insert(10, b"zz").unwrap());
        assert!(!seq.insert(20, b"yy").unwrap());
        assert!(seq.insert(0, b"0123456789").unwrap());
    }
}
