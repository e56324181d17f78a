//! HTTP/3 frame serialization.
//!
//! Every frame kind comes as a pair: a size query that computes the exact
//! on-wire length without allocating, and a serializer that allocates one
//! buffer of exactly that length and fills it. The writer must end exactly
//! full; any slack means the two disagreed and the serializer refuses to
//! hand out the buffer.

use bytes::Bytes;
use rand::{Rng, RngCore};
use tracing::error;

use qwire_quic::{varint, DataWriter};

use crate::capsule::Capsule;
use crate::config::EncoderConfig;
use crate::error::{Error, Result};
use crate::frame::{
    AcceptChFrame, FrameType, GoAwayFrame, PrioritizedElementType, PriorityUpdateFrame,
    SettingsFrame,
};

/// `varint(type) || varint(length) || payload` length for a frame.
fn total_frame_len(frame_type: u64, payload_len: u64) -> usize {
    varint::encoded_len(frame_type) + varint::encoded_len(payload_len) + payload_len as usize
}

fn write_frame_header(w: &mut DataWriter, frame_type: u64, payload_len: u64) -> Result<()> {
    w.write_varint(frame_type)?;
    w.write_varint(payload_len)?;
    Ok(())
}

/// Hand out the buffer only if the size query and the writes agreed.
fn finish(w: DataWriter, what: &str) -> Result<Bytes> {
    if w.remaining() != 0 {
        let (written, expected) = (w.len(), w.capacity());
        error!("failed to serialize {what}: wrote {written} of {expected} bytes");
        return Err(Error::LengthMismatch { written, expected });
    }
    Ok(w.finish())
}

/// Length of a DATA frame header for a payload of `payload_length` bytes.
/// The payload itself is owned by the caller.
pub fn data_frame_header_len(payload_length: u64) -> usize {
    debug_assert_ne!(payload_length, 0);
    varint::encoded_len(FrameType::Data.code()) + varint::encoded_len(payload_length)
}

/// Serialize a DATA frame header; the caller appends the payload.
pub fn serialize_data_frame_header(payload_length: u64) -> Result<Bytes> {
    let mut w = DataWriter::with_capacity(data_frame_header_len(payload_length));
    write_frame_header(&mut w, FrameType::Data.code(), payload_length)?;
    finish(w, "data frame header")
}

/// Length of a HEADERS frame header for `payload_length` bytes of encoded
/// field section.
pub fn headers_frame_header_len(payload_length: u64) -> usize {
    debug_assert_ne!(payload_length, 0);
    varint::encoded_len(FrameType::Headers.code()) + varint::encoded_len(payload_length)
}

/// Serialize a HEADERS frame header; the caller appends the payload.
pub fn serialize_headers_frame_header(payload_length: u64) -> Result<Bytes> {
    let mut w = DataWriter::with_capacity(headers_frame_header_len(payload_length));
    write_frame_header(&mut w, FrameType::Headers.code(), payload_length)?;
    finish(w, "headers frame header")
}

fn settings_payload_len(settings: &SettingsFrame) -> u64 {
    settings
        .values
        .iter()
        .map(|(&id, &value)| (varint::encoded_len(id) + varint::encoded_len(value)) as u64)
        .sum()
}

/// Exact on-wire length of a SETTINGS frame.
pub fn settings_frame_len(settings: &SettingsFrame) -> usize {
    total_frame_len(FrameType::Settings.code(), settings_payload_len(settings))
}

/// Serialize a SETTINGS frame. Identifier/value pairs are emitted in
/// ascending identifier order, which keeps encodings deterministic.
pub fn serialize_settings_frame(settings: &SettingsFrame) -> Result<Bytes> {
    let payload_len = settings_payload_len(settings);
    let mut w = DataWriter::with_capacity(total_frame_len(
        FrameType::Settings.code(),
        payload_len,
    ));
    write_frame_header(&mut w, FrameType::Settings.code(), payload_len)?;
    for (&id, &value) in &settings.values {
        w.write_varint(id)?;
        w.write_varint(value)?;
    }
    finish(w, "settings frame")
}

/// Exact on-wire length of a GOAWAY frame.
pub fn goaway_frame_len(goaway: &GoAwayFrame) -> usize {
    total_frame_len(
        FrameType::GoAway.code(),
        varint::encoded_len(goaway.id) as u64,
    )
}

/// Serialize a GOAWAY frame. Any id in the varint range is valid.
pub fn serialize_goaway_frame(goaway: &GoAwayFrame) -> Result<Bytes> {
    let payload_len = varint::encoded_len(goaway.id) as u64;
    let mut w = DataWriter::with_capacity(total_frame_len(FrameType::GoAway.code(), payload_len));
    write_frame_header(&mut w, FrameType::GoAway.code(), payload_len)?;
    w.write_varint(goaway.id)?;
    finish(w, "goaway frame")
}

/// Exact on-wire length of a PRIORITY_UPDATE frame, or 0 for the
/// unimplemented push-stream variant.
pub fn priority_update_frame_len(priority_update: &PriorityUpdateFrame) -> usize {
    if priority_update.prioritized_element_type != PrioritizedElementType::RequestStream {
        return 0;
    }
    let payload_len = varint::encoded_len(priority_update.prioritized_element_id) as u64
        + priority_update.priority_field_value.len() as u64;
    total_frame_len(FrameType::PriorityUpdateRequestStream.code(), payload_len)
}

/// Serialize a PRIORITY_UPDATE frame for a request stream.
pub fn serialize_priority_update_frame(priority_update: &PriorityUpdateFrame) -> Result<Bytes> {
    if priority_update.prioritized_element_type != PrioritizedElementType::RequestStream {
        error!("PRIORITY_UPDATE for push streams not implemented");
        return Err(Error::PushStreamPriorityUpdate);
    }
    let payload_len = varint::encoded_len(priority_update.prioritized_element_id) as u64
        + priority_update.priority_field_value.len() as u64;
    let mut w = DataWriter::with_capacity(total_frame_len(
        FrameType::PriorityUpdateRequestStream.code(),
        payload_len,
    ));
    write_frame_header(
        &mut w,
        FrameType::PriorityUpdateRequestStream.code(),
        payload_len,
    )?;
    w.write_varint(priority_update.prioritized_element_id)?;
    w.write_bytes(priority_update.priority_field_value.as_bytes())?;
    finish(w, "priority update frame")
}

fn accept_ch_payload_len(accept_ch: &AcceptChFrame) -> u64 {
    accept_ch
        .entries
        .iter()
        .map(|entry| {
            (varint::encoded_len(entry.origin.len() as u64)
                + entry.origin.len()
                + varint::encoded_len(entry.value.len() as u64)
                + entry.value.len()) as u64
        })
        .sum()
}

/// Exact on-wire length of an ACCEPT_CH frame.
pub fn accept_ch_frame_len(accept_ch: &AcceptChFrame) -> usize {
    total_frame_len(FrameType::AcceptCh.code(), accept_ch_payload_len(accept_ch))
}

/// Serialize an ACCEPT_CH frame, preserving entry order.
pub fn serialize_accept_ch_frame(accept_ch: &AcceptChFrame) -> Result<Bytes> {
    let payload_len = accept_ch_payload_len(accept_ch);
    let mut w =
        DataWriter::with_capacity(total_frame_len(FrameType::AcceptCh.code(), payload_len));
    write_frame_header(&mut w, FrameType::AcceptCh.code(), payload_len)?;
    for entry in &accept_ch.entries {
        w.write_length_prefixed_varint(entry.origin.as_bytes())?;
        w.write_length_prefixed_varint(entry.value.as_bytes())?;
    }
    finish(w, "accept_ch frame")
}

/// Serialize a GREASE frame to exercise peers' handling of unknown types.
///
/// With randomness disabled the frame is fixed: reserved type 0x40 with the
/// single payload byte `a`. With randomness enabled the type follows the
/// `0x1f * N + 0x21` reserved pattern (kept within the varint range) and
/// the payload is zero to three random bytes.
pub fn serialize_greasing_frame(config: &EncoderConfig) -> Result<Bytes> {
    let (frame_type, payload) = if !config.enable_grease_randomness {
        (0x40u64, Bytes::from_static(b"a"))
    } else {
        let mut rng = rand::thread_rng();
        let draw: u32 = rng.gen();
        let frame_type = (0x1fu64 * u64::from(draw) + 0x21) & varint::MAX;
        let payload_len = (draw % 4) as usize;
        let mut payload = vec![0u8; payload_len];
        rng.fill_bytes(&mut payload);
        (frame_type, Bytes::from(payload))
    };

    let payload_len = payload.len() as u64;
    let mut w = DataWriter::with_capacity(total_frame_len(frame_type, payload_len));
    write_frame_header(&mut w, frame_type, payload_len)?;
    w.write_bytes(&payload)?;
    finish(w, "greasing frame")
}

/// Length of a WEBTRANSPORT_STREAM prefix: `varint(0x41) ||
/// varint(session_id)` with no outer length field.
pub fn webtransport_stream_header_len(session_id: u64) -> usize {
    varint::encoded_len(FrameType::WebTransportStream.code()) + varint::encoded_len(session_id)
}

/// Serialize a WEBTRANSPORT_STREAM prefix. Unlike the other kinds this is
/// a stream prefix, not a length-prefixed frame.
pub fn serialize_webtransport_stream_header(session_id: u64) -> Result<Bytes> {
    let mut w = DataWriter::with_capacity(webtransport_stream_header_len(session_id));
    w.write_varint(FrameType::WebTransportStream.code())?;
    w.write_varint(session_id)?;
    finish(w, "webtransport stream header")
}

/// Exact on-wire length of a CAPSULE frame.
pub fn capsule_frame_len(capsule: &Capsule) -> usize {
    let payload_len =
        (varint::encoded_len(capsule.capsule_type()) + capsule.data_len()) as u64;
    total_frame_len(FrameType::Capsule.code(), payload_len)
}

/// Serialize a CAPSULE frame. The capsule-type varint sits inside the
/// frame's length field, not in addition to it.
pub fn serialize_capsule_frame(capsule: &Capsule) -> Result<Bytes> {
    let payload_len =
        (varint::encoded_len(capsule.capsule_type()) + capsule.data_len()) as u64;
    let mut w =
        DataWriter::with_capacity(total_frame_len(FrameType::Capsule.code(), payload_len));
    write_frame_header(&mut w, FrameType::Capsule.code(), payload_len)?;
    w.write_varint(capsule.capsule_type())?;
    match capsule {
        Capsule::RegisterDatagramContext {
            context_id,
            extensions,
        }
        | Capsule::CloseDatagramContext {
            context_id,
            extensions,
        } => {
            w.write_varint(*context_id)?;
            w.write_bytes(extensions)?;
        }
        Capsule::Datagram {
            context_id,
            payload,
        } => {
            if let Some(context_id) = context_id {
                w.write_varint(*context_id)?;
            }
            w.write_bytes(payload)?;
        }
        Capsule::RegisterDatagramNoContext { extensions } => {
            w.write_bytes(extensions)?;
        }
        Capsule::Unknown { data, .. } => {
            w.write_bytes(data)?;
        }
    }
    finish(w, "capsule frame")
}
