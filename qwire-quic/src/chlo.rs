//! TLS ClientHello extraction from QUIC Initial flights.
//!
//! [`ChloExtractor`] glues three machines together: the packet framer, the
//! crypto stream sequencer, and a TLS driver, all driven synchronously from
//! [`ChloExtractor::ingest_packet`]. The goal is narrow: surface the SNI and
//! the ALPN list the client asked for, then stop. The handshake is aborted
//! at certificate selection on purpose, so the usual "handshake progressed"
//! callbacks are all failure signals here.
//!
//! The extractor survives fragmentation and reordering across any number of
//! Initial packets, distinguishes a ClientHello that fit in one packet from
//! one that needed several, and funnels every non-retryable problem into a
//! terminal failure state with accumulated diagnostics.

use core::fmt;

use tracing::{debug, error};

use crate::buf::DataReader;
use crate::framer::{FramerVisitor, HeaderDisposition, Perspective, QuicFramer};
use crate::packet::{LongPacketType, PacketForm, PacketHeader};
use crate::sequencer::CryptoStreamSequencer;
use crate::tls::{
    alert, ChloScanner, ClientHello, EncryptionLevel, SelectCertResult, TlsCallbacks, TlsDriver,
    EXTENSION_ALPN,
};
use crate::version::{HandshakeProtocol, QuicVersion};

/// Extraction progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No ClientHello bytes parsed yet.
    Initial,
    /// At least one CRYPTO frame ingested, but the ClientHello is not
    /// complete yet.
    ParsedPartialChloFragment,
    /// ClientHello parsed out of the very first ingested packet.
    ParsedFullSinglePacketChlo,
    /// ClientHello reassembled across two or more ingested packets.
    ParsedFullMultiPacketChlo,
    /// A non-retryable error occurred; no more work will be done.
    UnrecoverableFailure,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Initial => "Initial",
            State::ParsedPartialChloFragment => "ParsedPartialChloFragment",
            State::ParsedFullSinglePacketChlo => "ParsedFullSinglePacketChlo",
            State::ParsedFullMultiPacketChlo => "ParsedFullMultiPacketChlo",
            State::UnrecoverableFailure => "UnrecoverableFailure",
        };
        f.write_str(name)
    }
}

/// Extracts SNI and ALPN from the first flight of a QUIC connection.
#[derive(Default)]
pub struct ChloExtractor {
    framer: Option<QuicFramer>,
    inner: Inner,
}

/// Everything the framer visitor needs; split from the extractor so it can
/// be borrowed mutably while the framer is too.
#[derive(Default)]
struct Inner {
    sequencer: CryptoStreamSequencer,
    tls: Option<ChloScanner>,
    capture: Capture,
}

/// Mutable capture state handed to the TLS driver as its callbacks object.
struct Capture {
    state: State,
    parsed_crypto_frame_in_this_packet: bool,
    alpns: Vec<String>,
    server_name: Option<String>,
    error_details: String,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            state: State::Initial,
            parsed_crypto_frame_in_this_packet: false,
            alpns: Vec::new(),
            server_name: None,
            error_details: String::new(),
        }
    }
}

impl ChloExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one received UDP datagram parsed as `version`.
    ///
    /// Unsupported or non-TLS versions, version changes after the first
    /// packet, and undecodable packets are all silently discarded; the
    /// caller may keep ingesting.
    pub fn ingest_packet(&mut self, version: QuicVersion, packet: &[u8]) {
        if self.inner.capture.state == State::UnrecoverableFailure {
            debug!("not ingesting packet after unrecoverable error");
            return;
        }
        if !version.is_supported() {
            debug!(version = version.0, "not ingesting packet with unsupported version");
            return;
        }
        if version.handshake_protocol() != HandshakeProtocol::Tls13 {
            debug!(version = version.0, "not ingesting packet with non-TLS version");
            return;
        }
        match &self.framer {
            Some(framer) => {
                // Not the first packet; the version was locked in earlier.
                if !framer.is_supported_version(version) {
                    debug!(
                        expected = framer.version().0,
                        got = version.0,
                        "not ingesting packet with version mismatch"
                    );
                    return;
                }
            }
            // First accepted packet: set up the parser as a server. The
            // expected connection ID length only matters for short headers,
            // which we drop, so zero is fine.
            None => {
                self.framer = Some(QuicFramer::new(version, Perspective::Server, 0));
            }
        }
        let Some(framer) = self.framer.as_mut() else {
            return;
        };

        self.inner.capture.parsed_crypto_frame_in_this_packet = false;
        let parse_success = framer.process_packet(packet, &mut self.inner);

        let capture = &mut self.inner.capture;
        if capture.state == State::Initial && capture.parsed_crypto_frame_in_this_packet {
            // A CRYPTO frame arrived but TLS did not surface a full
            // ClientHello, so more packets are needed. Recording that here
            // is what distinguishes single-packet from multi-packet CHLOs
            // when the ClientHello eventually completes.
            capture.state = State::ParsedPartialChloFragment;
        }

        if !parse_success {
            // Non-Initial packet, undecryptable payload, and the like.
            debug!("failed to process packet");
        }
    }

    pub fn state(&self) -> State {
        self.inner.capture.state
    }

    /// The SNI, available once a full ClientHello was parsed.
    pub fn server_name(&self) -> Option<&str> {
        self.inner.capture.server_name.as_deref()
    }

    /// ALPN identifiers in the order the client listed them.
    pub fn alpns(&self) -> &[String] {
        &self.inner.capture.alpns
    }

    /// Accumulated diagnostics once the state is `UnrecoverableFailure`.
    pub fn error_details(&self) -> &str {
        &self.inner.capture.error_details
    }

    pub fn has_parsed_full_chlo(&self) -> bool {
        self.inner.capture.has_parsed_full_chlo()
    }
}

impl FramerVisitor for Inner {
    fn on_unauthenticated_public_header(&mut self, header: &PacketHeader) -> HeaderDisposition {
        if header.form != PacketForm::LongHeader {
            debug!("not parsing non-long-header packet");
            return HeaderDisposition::Drop;
        }
        if header.long_packet_type != Some(LongPacketType::Initial) {
            debug!("not parsing non-initial packet");
            return HeaderDisposition::Drop;
        }
        // The framer was constructed without the connection ID, so Initial
        // obfuscators are derived from each accepted header.
        HeaderDisposition::InstallInitialKeys
    }

    fn on_version_mismatch(&mut self, version: QuicVersion) -> bool {
        // IngestPacket already vetted the version argument; the wire can
        // only disagree if the caller mislabeled the packet.
        error!(
            version = version.0,
            "unexpected version mismatch after ingest pre-checks"
        );
        false
    }

    fn on_crypto_frame(&mut self, level: EncryptionLevel, offset: u64, data: &[u8]) -> bool {
        if level != EncryptionLevel::Initial {
            // Non-Initial packets are dropped at the header callback, so no
            // other level can legitimately get here.
            let details = format!("parsed CRYPTO frame at unexpected level {level:?}");
            error!("{details}");
            self.capture.handle_unrecoverable_error(details);
            return false;
        }
        self.capture.parsed_crypto_frame_in_this_packet = true;
        match self.sequencer.insert(offset, data) {
            Ok(true) => self.on_data_available(),
            Ok(false) => {}
            Err(e) => {
                self.capture
                    .handle_unrecoverable_error(format!("crypto stream error: {e}"));
                return false;
            }
        }
        true
    }
}

impl Inner {
    /// Drain newly contiguous crypto stream bytes into the TLS driver and
    /// let it attempt to complete a ClientHello.
    fn on_data_available(&mut self) {
        let tls = self.tls.get_or_insert_with(ChloScanner::new);

        while let Some(region) = self.sequencer.next_region() {
            if let Err(e) = tls.provide_data(EncryptionLevel::Initial, &region, &mut self.capture)
            {
                self.capture
                    .handle_unrecoverable_error(format!("failed to provide crypto data: {e}"));
                return;
            }
            self.sequencer.mark_consumed(region.len());
        }

        // The outcome arrives through the callbacks; certificate selection
        // aborting the handshake is the expected way this ends.
        tls.drive_handshake(&mut self.capture);
    }
}

impl Capture {
    fn has_parsed_full_chlo(&self) -> bool {
        matches!(
            self.state,
            State::ParsedFullSinglePacketChlo | State::ParsedFullMultiPacketChlo
        )
    }

    fn handle_unrecoverable_error(&mut self, details: String) {
        if self.has_parsed_full_chlo() {
            // The caller already has what it wanted.
            debug!("ignoring error: {details}");
            return;
        }
        error!("handling error: {details}");
        self.state = State::UnrecoverableFailure;
        if self.error_details.is_empty() {
            self.error_details = details;
        } else {
            self.error_details = format!("{}; {}", self.error_details, details);
        }
    }

    fn handle_unexpected_callback(&mut self, callback_name: &str) {
        let details = format!("unexpected TLS callback {callback_name}");
        error!("{details}");
        self.handle_unrecoverable_error(details);
    }

    /// Parse the raw ALPN extension payload: a u16-prefixed list of
    /// u8-prefixed protocol names (RFC 7301 Section 3.1).
    fn parse_alpns(&mut self, raw: &[u8]) -> bool {
        let mut r = DataReader::new(raw);
        let Ok(list) = r.read_length_prefixed_u16() else {
            self.handle_unrecoverable_error("failed to read ALPN payload".to_string());
            return false;
        };
        let mut lr = DataReader::new(list);
        while !lr.is_done() {
            let Ok(name) = lr.read_length_prefixed_u8() else {
                self.handle_unrecoverable_error("failed to read ALPN protocol name".to_string());
                return false;
            };
            self.alpns.push(String::from_utf8_lossy(name).into_owned());
        }
        true
    }
}

impl TlsCallbacks for Capture {
    fn on_set_read_secret(&mut self, _level: EncryptionLevel) {
        self.handle_unexpected_callback("set_read_secret");
    }

    fn on_set_write_secret(&mut self, _level: EncryptionLevel) {
        self.handle_unexpected_callback("set_write_secret");
    }

    fn on_write_message(&mut self, _level: EncryptionLevel, _data: &[u8]) {
        self.handle_unexpected_callback("write_message");
    }

    fn on_flush_flight(&mut self) {
        self.handle_unexpected_callback("flush_flight");
    }

    fn on_send_alert(&mut self, _level: EncryptionLevel, alert_value: u8) {
        if alert_value == alert::HANDSHAKE_FAILURE && self.has_parsed_full_chlo() {
            // Aborting certificate selection makes the driver try to tell
            // the client the handshake failed. Expected; drop it.
            return;
        }
        self.handle_unrecoverable_error(format!(
            "TLS driver attempted to send alert {} {}",
            alert_value,
            alert::description(alert_value)
        ));
    }

    fn on_select_certificate(&mut self, client_hello: &ClientHello) -> SelectCertResult {
        if let Some(name) = client_hello.server_name() {
            self.server_name = Some(name.to_string());
        }
        if let Some(raw) = client_hello.extension(EXTENSION_ALPN) {
            if !self.parse_alpns(raw) {
                return SelectCertResult::Abort;
            }
        }

        match self.state {
            State::Initial => self.state = State::ParsedFullSinglePacketChlo,
            State::ParsedPartialChloFragment => self.state = State::ParsedFullMultiPacketChlo,
            _ => error!("unexpected state {} on successful parse", self.state),
        }

        // Never proceed: the ClientHello is all we came for.
        SelectCertResult::Abort
    }
}
