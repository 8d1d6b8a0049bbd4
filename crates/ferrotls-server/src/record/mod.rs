//! Record-layer collaborator seam.
//!
//! The engine performs no I/O and no record protection. Everything below
//! the handshake layer (framing, encryption/MAC, fragmentation, alert
//! transmission) is reached through [`RecordLayer`]. Implementations may
//! suspend by returning [`RecordError::WouldBlock`]; the engine preserves
//! all state and expects re-entry.

use ferrotls_types::RecordError;

use crate::alert::{AlertDescription, AlertLevel};
use crate::crypt::key_schedule::KeyBlock;
use crate::ProtocolVersion;

/// TLS record content types (RFC 5246 §6.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

/// One decoded inbound record.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub content_type: ContentType,
    pub payload: Vec<u8>,
}

/// The record layer as seen by the handshake engine.
pub trait RecordLayer {
    /// Make at least `n` raw inbound bytes available and return them.
    ///
    /// Used only on the initial ClientHello, before record decoding is
    /// possible (the version is unknown and the peer may use SSLv2
    /// framing). Repeated calls with a larger `n` extend the same view.
    fn fetch_input(&mut self, n: usize) -> Result<&[u8], RecordError>;

    /// Discard the raw bytes made available by `fetch_input`.
    fn consume_input(&mut self);

    /// Read and decode the next record.
    fn read_record(&mut self) -> Result<InboundRecord, RecordError>;

    /// Queue one record for transmission. Must buffer without blocking;
    /// the transport is only touched by `flush_output`, which the driver
    /// calls at the start of every step.
    fn write_record(&mut self, content_type: ContentType, payload: &[u8])
        -> Result<(), RecordError>;

    /// Send an alert immediately.
    fn send_alert(
        &mut self,
        level: AlertLevel,
        description: AlertDescription,
    ) -> Result<(), RecordError>;

    /// Flush queued output to the transport.
    fn flush_output(&mut self) -> Result<(), RecordError>;

    /// Hand over the keys derived for this handshake. The transforms
    /// switch on the next ChangeCipherSpec in each direction.
    fn install_keys(&mut self, suite: u16, keys: &KeyBlock) -> Result<(), RecordError>;

    /// Switch the inbound transform (the peer sent ChangeCipherSpec).
    fn change_read_cipher(&mut self) -> Result<(), RecordError>;

    /// Switch the outbound transform (we sent ChangeCipherSpec).
    fn change_write_cipher(&mut self) -> Result<(), RecordError>;

    /// Tell the record layer which protocol version to stamp on records.
    fn set_version(&mut self, version: ProtocolVersion);
}
