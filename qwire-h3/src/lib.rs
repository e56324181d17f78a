//! # qwire-h3: HTTP/3 frame encoder
//!
//! Serialization for the HTTP/3 frames that ride on QUIC streams
//! (RFC 9114), plus the extension surfaces that share their framing:
//! PRIORITY_UPDATE (RFC 9218), ACCEPT_CH, GREASE frames, HTTP capsules,
//! and the WebTransport stream prefix.
//!
//! Every frame uses variable-length integer framing whose own length
//! depends on the value being encoded, so each frame kind exposes an exact
//! size query next to its serializer. Serializers allocate once, at the
//! queried size, and verify the buffer ends exactly full.
//!
//! ```rust
//! use qwire_h3::{encoder, SettingsFrame};
//!
//! let mut settings = SettingsFrame::default();
//! settings.values.insert(6, 1024); // SETTINGS_MAX_FIELD_SECTION_SIZE
//! settings.values.insert(7, 0); // SETTINGS_QPACK_BLOCKED_STREAMS
//!
//! let frame = encoder::serialize_settings_frame(&settings).unwrap();
//! assert_eq!(frame.len(), encoder::settings_frame_len(&settings));
//! ```

#![forbid(unsafe_code)]

pub mod capsule;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;

/// Variable-length integer codec, re-exported from qwire-quic for
/// consistency.
pub use qwire_quic::varint;

pub use capsule::{Capsule, CapsuleType};
pub use config::EncoderConfig;
pub use error::{Error, Result};
pub use frame::{
    AcceptChEntry, AcceptChFrame, FrameType, GoAwayFrame, PrioritizedElementType,
    PriorityUpdateFrame, SettingsFrame,
};
