//! Session objects and the resumption cache seam.

use std::sync::Arc;

use zeroize::Zeroize;

use crate::config::PeerCertificate;
use crate::ProtocolVersion;

/// Compression methods the engine can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    #[default]
    Null = 0,
    Deflate = 1,
}

/// An established (or negotiating) session.
///
/// The layout is shared with the session cache: a cache hit restores the
/// master secret and negotiated parameters for an abbreviated handshake.
#[derive(Clone)]
pub struct Session {
    pub version: ProtocolVersion,
    /// Session identifier, 0..=32 bytes.
    pub id: Vec<u8>,
    pub ciphersuite: u16,
    pub compression: Compression,
    /// 48-byte master secret; zeroized on drop.
    pub master_secret: Vec<u8>,
    /// The peer's leaf certificate, when one was presented.
    pub peer_cert: Option<Arc<PeerCertificate>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            version: ProtocolVersion::TLS1_0,
            id: Vec::new(),
            ciphersuite: 0,
            compression: Compression::Null,
            master_secret: Vec::new(),
            peer_cert: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("id", &self.id)
            .field("ciphersuite", &format_args!("0x{:04X}", self.ciphersuite))
            .field("compression", &self.compression)
            .field("peer_cert", &self.peer_cert.is_some())
            .finish_non_exhaustive()
    }
}

/// Session cache for resumption.
///
/// Shared across sessions; implementations must be internally
/// synchronized. The engine validates a hit before honoring it (suite,
/// compression and id must match the negotiation in progress).
pub trait SessionCache: Send + Sync {
    /// Retrieve a session by id.
    fn get(&self, id: &[u8]) -> Option<Session>;

    /// Store an established session.
    fn put(&self, session: &Session);
}
