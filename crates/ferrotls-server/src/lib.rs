#![forbid(unsafe_code)]
#![doc = "Server-side SSLv3/TLS 1.0-1.2 handshake engine for ferrotls."]

pub mod alert;
pub mod ciphersuite;
pub mod config;
pub mod crypt;
pub mod handshake;
pub mod record;
pub mod session;

/// An SSL/TLS protocol version as carried on the wire.
///
/// Major version 3 covers the whole family; the minor version selects
/// SSLv3 (0) through TLS 1.2 (3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const SSL3: Self = Self { major: 3, minor: 0 };
    pub const TLS1_0: Self = Self { major: 3, minor: 1 };
    pub const TLS1_1: Self = Self { major: 3, minor: 2 };
    pub const TLS1_2: Self = Self { major: 3, minor: 3 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// True for TLS 1.2, where signatures carry an explicit
    /// SignatureAndHashAlgorithm prefix.
    pub fn has_explicit_sig_alg(&self) -> bool {
        self.minor >= 3
    }

    /// True for TLS 1.0 and later, where the RSA-encrypted premaster is
    /// carried with a 2-byte length prefix.
    pub fn has_length_prefixed_pms(&self) -> bool {
        self.minor > 0
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ProtocolVersion::SSL3 => write!(f, "SSLv3"),
            ProtocolVersion::TLS1_0 => write!(f, "TLSv1.0"),
            ProtocolVersion::TLS1_1 => write!(f, "TLSv1.1"),
            ProtocolVersion::TLS1_2 => write!(f, "TLSv1.2"),
            ProtocolVersion { major, minor } => write!(f, "SSL [{major}:{minor}]"),
        }
    }
}
