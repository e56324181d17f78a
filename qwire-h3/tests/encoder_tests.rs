//! Byte-exact and round-trip tests for the frame encoder.
//!
//! The decoder here is test-local on purpose: the shipped crate only
//! writes frames, but reading our own output back is the cheapest way to
//! prove the layout.

use std::collections::BTreeMap;

use bytes::Bytes;
use qwire_h3::encoder::*;
use qwire_h3::{
    AcceptChEntry, AcceptChFrame, Capsule, EncoderConfig, GoAwayFrame, PrioritizedElementType,
    PriorityUpdateFrame, SettingsFrame,
};
use qwire_quic::DataReader;

/// Split a frame into its type code and payload.
fn parse_frame(frame: &[u8]) -> (u64, Vec<u8>) {
    let mut r = DataReader::new(frame);
    let frame_type = r.read_varint().unwrap();
    let payload_len = r.read_varint().unwrap() as usize;
    let payload = r.read_bytes(payload_len).unwrap().to_vec();
    assert!(r.is_done(), "trailing bytes after frame payload");
    (frame_type, payload)
}

fn settings(values: &[(u64, u64)]) -> SettingsFrame {
    SettingsFrame {
        values: values.iter().copied().collect::<BTreeMap<u64, u64>>(),
    }
}

// Scenario S1.
#[test]
fn empty_settings_frame() {
    let frame = serialize_settings_frame(&settings(&[])).unwrap();
    assert_eq!(hex::encode(&frame), "0400");
    assert_eq!(frame.len(), settings_frame_len(&settings(&[])));
}

// Scenario S2.
#[test]
fn settings_frame_bytes() {
    let input = settings(&[(6, 1024), (7, 0)]);
    let frame = serialize_settings_frame(&input).unwrap();
    assert_eq!(hex::encode(&frame), "04050644000700");
    assert_eq!(frame.len(), settings_frame_len(&input));
}

// Scenario S3.
#[test]
fn goaway_frame_bytes() {
    let goaway = GoAwayFrame { id: 7 };
    let frame = serialize_goaway_frame(&goaway).unwrap();
    assert_eq!(hex::encode(&frame), "070107");
    assert_eq!(frame.len(), goaway_frame_len(&goaway));
}

// Scenario S4.
#[test]
fn priority_update_frame_bytes() {
    let update = PriorityUpdateFrame {
        prioritized_element_type: PrioritizedElementType::RequestStream,
        prioritized_element_id: 3,
        priority_field_value: "u=1".to_string(),
    };
    let frame = serialize_priority_update_frame(&update).unwrap();
    assert_eq!(hex::encode(&frame), "800f07000403753d31");
    assert_eq!(frame.len(), priority_update_frame_len(&update));
}

// Scenario S5. The stream type 0x41 is above the one-byte varint bound,
// so it costs two bytes on the wire.
#[test]
fn webtransport_stream_header_bytes() {
    let frame = serialize_webtransport_stream_header(0x17).unwrap();
    assert_eq!(hex::encode(&frame), "404117");
    assert_eq!(frame.len(), webtransport_stream_header_len(0x17));

    // Wide session ids widen their varint.
    let frame = serialize_webtransport_stream_header(0x100).unwrap();
    assert_eq!(hex::encode(&frame), "40414100");
}

// Scenario S6.
#[test]
fn data_frame_header_bytes() {
    let frame = serialize_data_frame_header(5).unwrap();
    assert_eq!(hex::encode(&frame), "0005");
    assert_eq!(frame.len(), data_frame_header_len(5));
}

#[test]
fn headers_frame_header_bytes() {
    let frame = serialize_headers_frame_header(0x2a).unwrap();
    assert_eq!(hex::encode(&frame), "012a");
    // Two-byte payload lengths widen the length varint.
    let frame = serialize_headers_frame_header(16383).unwrap();
    assert_eq!(hex::encode(&frame), "017fff");
    assert_eq!(frame.len(), headers_frame_header_len(16383));
}

#[test]
fn settings_identifiers_strictly_ascending() {
    let input = settings(&[(0x4000, 1), (1, 1), (6, 0x3fff_ffff), (0x21, 9)]);
    let frame = serialize_settings_frame(&input).unwrap();
    let (frame_type, payload) = parse_frame(&frame);
    assert_eq!(frame_type, 0x04);

    let mut r = DataReader::new(&payload);
    let mut last: Option<u64> = None;
    let mut parsed = BTreeMap::new();
    while !r.is_done() {
        let id = r.read_varint().unwrap();
        let value = r.read_varint().unwrap();
        if let Some(last) = last {
            assert!(id > last, "identifiers must be strictly ascending");
        }
        last = Some(id);
        parsed.insert(id, value);
    }
    assert_eq!(parsed, input.values);
}

#[test]
fn goaway_accepts_full_varint_range() {
    for id in [0, 63, 64, u64::pow(2, 62) - 1] {
        let goaway = GoAwayFrame { id };
        let frame = serialize_goaway_frame(&goaway).unwrap();
        assert_eq!(frame.len(), goaway_frame_len(&goaway));
        let (frame_type, payload) = parse_frame(&frame);
        assert_eq!(frame_type, 0x07);
        let mut r = DataReader::new(&payload);
        assert_eq!(r.read_varint().unwrap(), id);
        assert!(r.is_done());
    }
}

#[test]
fn priority_update_roundtrip() {
    let update = PriorityUpdateFrame {
        prioritized_element_type: PrioritizedElementType::RequestStream,
        prioritized_element_id: 0x3fff,
        priority_field_value: "u=3, i".to_string(),
    };
    let frame = serialize_priority_update_frame(&update).unwrap();
    assert_eq!(frame.len(), priority_update_frame_len(&update));

    let (frame_type, payload) = parse_frame(&frame);
    assert_eq!(frame_type, 0xF0700);
    let mut r = DataReader::new(&payload);
    assert_eq!(r.read_varint().unwrap(), 0x3fff);
    assert_eq!(r.read_bytes(r.remaining()).unwrap(), b"u=3, i");
}

#[test]
fn accept_ch_preserves_order() {
    let input = AcceptChFrame {
        entries: vec![
            AcceptChEntry {
                origin: "https://b.example".to_string(),
                value: "Sec-CH-UA".to_string(),
            },
            AcceptChEntry {
                origin: "https://a.example".to_string(),
                value: String::new(),
            },
        ],
    };
    let frame = serialize_accept_ch_frame(&input).unwrap();
    assert_eq!(frame.len(), accept_ch_frame_len(&input));

    let (frame_type, payload) = parse_frame(&frame);
    assert_eq!(frame_type, 0x89);
    let mut r = DataReader::new(&payload);
    let mut entries = Vec::new();
    while !r.is_done() {
        let origin_len = r.read_varint().unwrap() as usize;
        let origin = String::from_utf8(r.read_bytes(origin_len).unwrap().to_vec()).unwrap();
        let value_len = r.read_varint().unwrap() as usize;
        let value = String::from_utf8(r.read_bytes(value_len).unwrap().to_vec()).unwrap();
        entries.push(AcceptChEntry { origin, value });
    }
    assert_eq!(entries, input.entries);
}

#[test]
fn empty_accept_ch_frame() {
    let frame = serialize_accept_ch_frame(&AcceptChFrame::default()).unwrap();
    assert_eq!(hex::encode(&frame), "408900");
}

#[test]
fn capsule_length_accounting() {
    // The capsule-type varint lives inside the frame's length field.
    let capsule = Capsule::RegisterDatagramContext {
        context_id: 2,
        extensions: Bytes::from_static(b"ext"),
    };
    let frame = serialize_capsule_frame(&capsule).unwrap();
    assert_eq!(frame.len(), capsule_frame_len(&capsule));

    let (frame_type, payload) = parse_frame(&frame);
    assert_eq!(frame_type, 0xFFCAB5E);
    let mut r = DataReader::new(&payload);
    assert_eq!(r.read_varint().unwrap(), 0x00); // capsule type
    assert_eq!(r.read_varint().unwrap(), 2); // context id
    assert_eq!(r.read_bytes(r.remaining()).unwrap(), b"ext");
}

#[test]
fn datagram_capsule_optional_context_id() {
    let without = Capsule::Datagram {
        context_id: None,
        payload: Bytes::from_static(b"dgram"),
    };
    let frame = serialize_capsule_frame(&without).unwrap();
    assert_eq!(frame.len(), capsule_frame_len(&without));
    let (_, payload) = parse_frame(&frame);
    let mut r = DataReader::new(&payload);
    assert_eq!(r.read_varint().unwrap(), 0x03);
    assert_eq!(r.read_bytes(r.remaining()).unwrap(), b"dgram");

    let with = Capsule::Datagram {
        context_id: Some(9),
        payload: Bytes::from_static(b"dgram"),
    };
    let frame = serialize_capsule_frame(&with).unwrap();
    assert_eq!(frame.len(), capsule_frame_len(&with));
    let (_, payload) = parse_frame(&frame);
    let mut r = DataReader::new(&payload);
    assert_eq!(r.read_varint().unwrap(), 0x03);
    assert_eq!(r.read_varint().unwrap(), 9);
    assert_eq!(r.read_bytes(r.remaining()).unwrap(), b"dgram");
}

#[test]
fn capsule_variants_roundtrip() {
    let capsules = vec![
        Capsule::RegisterDatagramContext {
            context_id: 0,
            extensions: Bytes::new(),
        },
        Capsule::CloseDatagramContext {
            context_id: 77,
            extensions: Bytes::from_static(b"why"),
        },
        Capsule::RegisterDatagramNoContext {
            extensions: Bytes::from_static(b"x"),
        },
        Capsule::Unknown {
            capsule_type: 0x1337,
            data: Bytes::from_static(b"opaque bytes"),
        },
    ];
    for capsule in capsules {
        let frame = serialize_capsule_frame(&capsule).unwrap();
        assert_eq!(frame.len(), capsule_frame_len(&capsule), "{capsule:?}");
        let (frame_type, payload) = parse_frame(&frame);
        assert_eq!(frame_type, 0xFFCAB5E);
        let mut r = DataReader::new(&payload);
        assert_eq!(r.read_varint().unwrap(), capsule.capsule_type());
    }
}

#[test]
fn every_serializer_matches_its_size_query() {
    let settings = settings(&[(1, 1), (6, 1024), (0x4001, 0x3fff_ffff)]);
    assert_eq!(
        serialize_settings_frame(&settings).unwrap().len(),
        settings_frame_len(&settings)
    );

    let goaway = GoAwayFrame { id: 0x1_0000 };
    assert_eq!(
        serialize_goaway_frame(&goaway).unwrap().len(),
        goaway_frame_len(&goaway)
    );

    let update = PriorityUpdateFrame {
        prioritized_element_type: PrioritizedElementType::RequestStream,
        prioritized_element_id: 4,
        priority_field_value: "u=7".to_string(),
    };
    assert_eq!(
        serialize_priority_update_frame(&update).unwrap().len(),
        priority_update_frame_len(&update)
    );

    let accept_ch = AcceptChFrame {
        entries: vec![AcceptChEntry {
            origin: "https://example.com".to_string(),
            value: "DPR".to_string(),
        }],
    };
    assert_eq!(
        serialize_accept_ch_frame(&accept_ch).unwrap().len(),
        accept_ch_frame_len(&accept_ch)
    );

    assert_eq!(
        serialize_webtransport_stream_header(u64::pow(2, 32))
            .unwrap()
            .len(),
        webtransport_stream_header_len(u64::pow(2, 32))
    );

    assert_eq!(
        serialize_data_frame_header(1).unwrap().len(),
        data_frame_header_len(1)
    );
}

#[test]
fn grease_both_modes() {
    let frame = serialize_greasing_frame(&EncoderConfig::default()).unwrap();
    assert_eq!(hex::encode(&frame), "40400161");

    let config = EncoderConfig {
        enable_grease_randomness: true,
    };
    for _ in 0..32 {
        let frame = serialize_greasing_frame(&config).unwrap();
        let (frame_type, payload) = parse_frame(&frame);
        assert_eq!((frame_type - 0x21) % 0x1f, 0, "reserved GREASE pattern");
        assert!(payload.len() <= 3);
    }
}
