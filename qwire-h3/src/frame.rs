//! HTTP/3 frame types and values (RFC 9114 Section 7.2, RFC 9218,
//! RFC 9412-adjacent extension codes).
//!
//! Frames share the layout `varint(type) || varint(length) || payload`.
//! DATA and HEADERS payloads are owned by the caller, so only their headers
//! are modeled here; the remaining kinds carry typed values.

use std::collections::BTreeMap;

/// Frame type codes the encoder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum FrameType {
    Data = 0x00,
    Headers = 0x01,
    Settings = 0x04,
    GoAway = 0x07,
    /// WebTransport unidirectional/bidirectional stream prefix; a stream
    /// type rather than a length-prefixed frame.
    WebTransportStream = 0x41,
    AcceptCh = 0x89,
    /// RFC 9218, request-stream variant.
    PriorityUpdateRequestStream = 0xF0700,
    /// HTTP capsule carrier (datagram draft).
    Capsule = 0xFFCAB5E,
}

impl FrameType {
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// SETTINGS frame contents (RFC 9114 Section 7.2.4).
///
/// Keyed storage makes duplicate identifiers unrepresentable and gives the
/// deterministic ascending-identifier wire order for free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFrame {
    pub values: BTreeMap<u64, u64>,
}

/// GOAWAY frame contents (RFC 9114 Section 7.2.6). Any 62-bit id is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoAwayFrame {
    pub id: u64,
}

/// Which element a PRIORITY_UPDATE frame prioritizes (RFC 9218 Section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrioritizedElementType {
    RequestStream,
    PushStream,
}

/// PRIORITY_UPDATE frame contents (RFC 9218).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityUpdateFrame {
    pub prioritized_element_type: PrioritizedElementType,
    pub prioritized_element_id: u64,
    /// Structured-field priority value, e.g. `u=3, i`.
    pub priority_field_value: String,
}

/// One origin/value pair of an ACCEPT_CH frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptChEntry {
    pub origin: String,
    pub value: String,
}

/// ACCEPT_CH frame contents (HTTP client hints). Entries are emitted in
/// the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptChFrame {
    pub entries: Vec<AcceptChEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type_codes() {
        assert_eq!(FrameType::Data.code(), 0x00);
        assert_eq!(FrameType::Headers.code(), 0x01);
        assert_eq!(FrameType::Settings.code(), 0x04);
        assert_eq!(FrameType::GoAway.code(), 0x07);
        assert_eq!(FrameType::WebTransportStream.code(), 0x41);
        assert_eq!(FrameType::AcceptCh.code(), 0x89);
        assert_eq!(FrameType::PriorityUpdateRequestStream.code(), 0xF0700);
        assert_eq!(FrameType::Capsule.code(), 0xFFCAB5E);
    }

    #[test]
    fn test_settings_values_order_themselves() {
        let mut settings = SettingsFrame::default();
        settings.values.insert(7, 0);
        settings.values.insert(1, 100);
        settings.values.insert(6, 1024);
        let ids: Vec<u64> = settings.values.keys().copied().collect();
        assert_eq!(ids, vec![1, 6, 7]);
    }
}
