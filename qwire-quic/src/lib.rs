//! # qwire-quic: QUIC wire-format core
//!
//! Building blocks for tooling that speaks the QUIC wire format without
//! running connections: the variable-length integer codec, bounds-checked
//! byte cursors, Initial packet protection, and a TLS ClientHello extractor
//! that reads SNI and ALPN out of a client's first flight.
//!
//! ## Architecture
//!
//! ```text
//! qwire-quic/
//! ├── varint     - Variable-length integers (RFC 9000 Section 16)
//! ├── buf        - DataWriter / DataReader cursors
//! ├── version    - Version registry, salts, handshake protocols
//! ├── packet     - Header types and unauthenticated header parsing
//! ├── protection - Initial key derivation, header protection, AEAD
//! ├── framer     - Packet-to-frames parsing with a visitor interface
//! ├── sequencer  - Crypto stream reassembly
//! ├── tls        - Buffers-only TLS driver interface + ClientHello scanner
//! └── chlo       - The ClientHello extractor state machine
//! ```
//!
//! ## Design principles
//!
//! 1. **Pure state machines**: no I/O, no timers, no async. Bytes go in,
//!    state transitions and extracted fields come out, and every callback
//!    completes before the call that triggered it returns.
//! 2. **Failures are values**: operations return `Result` or report through
//!    an explicit state; bug-class conditions additionally log at error
//!    level.
//! 3. **Exact sizing**: writers are allocated at their final size and must
//!    end exactly full.
//!
//! ## Extracting a ClientHello
//!
//! ```rust
//! use qwire_quic::{ChloExtractor, QuicVersion};
//!
//! let mut extractor = ChloExtractor::new();
//! # let datagrams: Vec<Vec<u8>> = Vec::new();
//! for datagram in &datagrams {
//!     extractor.ingest_packet(QuicVersion::V1, datagram);
//!     if extractor.has_parsed_full_chlo() {
//!         println!("sni: {:?}, alpn: {:?}", extractor.server_name(), extractor.alpns());
//!         break;
//!     }
//! }
//! ```

#![forbid(unsafe_code)]

pub mod buf;
pub mod chlo;
pub mod error;
pub mod framer;
pub mod packet;
pub mod protection;
pub mod sequencer;
pub mod tls;
pub mod varint;
pub mod version;

pub use buf::{DataReader, DataWriter};
pub use chlo::{ChloExtractor, State};
pub use error::{Error, Result};
pub use framer::{FramerVisitor, HeaderDisposition, Perspective, QuicFramer};
pub use packet::{ConnectionId, LongPacketType, PacketForm, PacketHeader};
pub use sequencer::CryptoStreamSequencer;
pub use tls::{
    ChloScanner, ClientHello, EncryptionLevel, SelectCertResult, TlsCallbacks, TlsDriver,
};
pub use version::{HandshakeProtocol, QuicVersion};
