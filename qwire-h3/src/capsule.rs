//! HTTP capsules (datagram draft): control messages carried inside a
//! CAPSULE frame's payload as `varint(capsule_type) || capsule_data`.

use bytes::Bytes;

use qwire_quic::varint;

/// Registered capsule type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum CapsuleType {
    RegisterDatagramContext = 0x00,
    RegisterDatagramNoContext = 0x01,
    CloseDatagramContext = 0x02,
    Datagram = 0x03,
}

impl CapsuleType {
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// A typed capsule value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capsule {
    RegisterDatagramContext {
        context_id: u64,
        extensions: Bytes,
    },
    CloseDatagramContext {
        context_id: u64,
        extensions: Bytes,
    },
    Datagram {
        /// Present only when context ids were negotiated for the session;
        /// whether to expect one is carried out-of-band.
        context_id: Option<u64>,
        payload: Bytes,
    },
    RegisterDatagramNoContext {
        extensions: Bytes,
    },
    /// Unknown capsules pass through verbatim.
    Unknown {
        capsule_type: u64,
        data: Bytes,
    },
}

impl Capsule {
    /// The on-wire capsule type code.
    pub fn capsule_type(&self) -> u64 {
        match self {
            Capsule::RegisterDatagramContext { .. } => CapsuleType::RegisterDatagramContext.code(),
            Capsule::CloseDatagramContext { .. } => CapsuleType::CloseDatagramContext.code(),
            Capsule::Datagram { .. } => CapsuleType::Datagram.code(),
            Capsule::RegisterDatagramNoContext { .. } => {
                CapsuleType::RegisterDatagramNoContext.code()
            }
            Capsule::Unknown { capsule_type, .. } => *capsule_type,
        }
    }

    /// Length of the capsule data that follows the capsule-type varint.
    pub fn data_len(&self) -> usize {
        match self {
            Capsule::RegisterDatagramContext {
                context_id,
                extensions,
            }
            | Capsule::CloseDatagramContext {
                context_id,
                extensions,
            } => varint::encoded_len(*context_id) + extensions.len(),
            Capsule::Datagram {
                context_id,
                payload,
            } => {
                let id_len = context_id.map_or(0, varint::encoded_len);
                id_len + payload.len()
            }
            Capsule::RegisterDatagramNoContext { extensions } => extensions.len(),
            Capsule::Unknown { data, .. } => data.len(),
        }
    }
}
