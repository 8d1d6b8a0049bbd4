//! Server configuration with builder pattern.
//!
//! Everything the caller supplies, read-only for the engine. Formerly
//! compile-time feature switches (key-exchange families, SSLv2 hello,
//! DEFLATE) are runtime capabilities here: an absent factory, key or PSK
//! makes the corresponding negotiation fail through the normal error path
//! instead of being compiled out.

use std::fmt;
use std::sync::Arc;

use ferrotls_types::CryptoError;

use crate::crypt::{DhEngine, EcdhEngine, RsaPublicKey, RsaServerKey, SecureRandom, SystemRng};
use crate::session::SessionCache;
use crate::ProtocolVersion;

/// Client-certificate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authmode {
    /// Never request a client certificate.
    #[default]
    None,
    /// Request one; an empty response is accepted.
    Optional,
    /// Request one; an empty response aborts the handshake.
    Required,
}

/// Policy towards peers without secure-renegotiation support (RFC 5746 §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyRenegotiation {
    /// Complete the initial handshake, refuse renegotiation.
    #[default]
    NoRenegotiation,
    /// Permit legacy renegotiation.
    AllowLegacy,
    /// Abort even the initial handshake with legacy-only peers.
    BreakHandshake,
}

/// Verdict from the SNI callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniAction {
    Accept,
    /// Reject with a fatal unrecognized_name alert.
    Reject,
}

/// Server-side SNI callback, invoked with the host_name bytes from the
/// server_name extension.
pub type SniCallback = Arc<dyn Fn(&[u8]) -> SniAction + Send + Sync>;

/// Factory for per-handshake ephemeral DH contexts.
pub type DhEngineFactory = Arc<dyn Fn() -> Box<dyn DhEngine> + Send + Sync>;

/// Factory for per-handshake ephemeral ECDH contexts.
pub type EcdhEngineFactory = Arc<dyn Fn() -> Box<dyn EcdhEngine> + Send + Sync>;

/// The peer's certificate as the engine sees it: the raw DER plus the
/// RSA public key the external X.509 layer extracted from it.
pub struct PeerCertificate {
    pub der: Vec<u8>,
    pub public_key: Arc<dyn RsaPublicKey>,
}

impl fmt::Debug for PeerCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerCertificate")
            .field("der_len", &self.der.len())
            .finish_non_exhaustive()
    }
}

/// External X.509 seam: turns a DER certificate into a usable public key.
pub trait PeerCertificateDecoder: Send + Sync {
    fn decode(&self, der: &[u8]) -> Result<PeerCertificate, CryptoError>;
}

/// Server handshake configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Lowest acceptable protocol version.
    pub min_version: ProtocolVersion,
    /// Highest offered protocol version.
    pub max_version: ProtocolVersion,
    /// Ordered ciphersuite preferences, one list per minor version
    /// (index = minor, SSLv3 .. TLS 1.2).
    pub ciphersuite_preferences: [Vec<u16>; 4],
    /// Offer DEFLATE compression when the client proposes it.
    pub deflate_compression: bool,
    /// Accept the legacy SSLv2-compatible ClientHello shape.
    pub allow_sslv2_client_hello: bool,
    /// DH group modulus (big-endian), for DHE families.
    pub dhm_p: Vec<u8>,
    /// DH group generator (big-endian).
    pub dhm_g: Vec<u8>,
    /// Server certificate chain (DER, leaf first).
    pub certificate_chain: Vec<Vec<u8>>,
    /// Subject DNs (raw DER) of the configured CAs, advertised in
    /// CertificateRequest.
    pub ca_subject_dns: Vec<Vec<u8>>,
    /// The server's RSA key, for signing and premaster decryption.
    pub rsa_key: Option<Arc<dyn RsaServerKey>>,
    /// Pre-shared key value (RFC 4279).
    pub psk: Option<Vec<u8>>,
    /// The only PSK identity this server accepts.
    pub psk_identity: Option<Vec<u8>>,
    pub authmode: Authmode,
    pub legacy_renegotiation: LegacyRenegotiation,
    pub sni_callback: Option<SniCallback>,
    pub session_cache: Option<Arc<dyn SessionCache>>,
    pub rng: Arc<dyn SecureRandom>,
    pub dh_factory: Option<DhEngineFactory>,
    pub ecdh_factory: Option<EcdhEngineFactory>,
    pub cert_decoder: Option<Arc<dyn PeerCertificateDecoder>>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("authmode", &self.authmode)
            .field("legacy_renegotiation", &self.legacy_renegotiation)
            .field("deflate_compression", &self.deflate_compression)
            .field("allow_sslv2_client_hello", &self.allow_sslv2_client_hello)
            .field("rsa_key", &self.rsa_key.as_ref().map(|_| "<key>"))
            .field("psk", &self.psk.as_ref().map(|p| format!("[{} bytes]", p.len())))
            .field("psk_identity", &self.psk_identity)
            .field("sni_callback", &self.sni_callback.as_ref().map(|_| "<callback>"))
            .field("session_cache", &self.session_cache.as_ref().map(|_| "<cache>"))
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// The preference list for a negotiated minor version.
    pub fn ciphersuites_for(&self, minor: u8) -> &[u16] {
        self.ciphersuite_preferences
            .get(minor as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Builder for [`ServerConfig`].
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        let default_suites: Vec<u16> = vec![
            0xC028, 0xC027, 0xC014, 0xC013, // ECDHE-RSA
            0x006B, 0x0067, 0x0039, 0x0033, // DHE-RSA
            0x003D, 0x003C, 0x0035, 0x002F, 0x000A, // static RSA
        ];
        Self {
            config: ServerConfig {
                min_version: ProtocolVersion::TLS1_0,
                max_version: ProtocolVersion::TLS1_2,
                ciphersuite_preferences: [
                    default_suites.clone(),
                    default_suites.clone(),
                    default_suites.clone(),
                    default_suites,
                ],
                deflate_compression: false,
                allow_sslv2_client_hello: false,
                dhm_p: Vec::new(),
                dhm_g: Vec::new(),
                certificate_chain: Vec::new(),
                ca_subject_dns: Vec::new(),
                rsa_key: None,
                psk: None,
                psk_identity: None,
                authmode: Authmode::None,
                legacy_renegotiation: LegacyRenegotiation::NoRenegotiation,
                sni_callback: None,
                session_cache: None,
                rng: Arc::new(SystemRng),
                dh_factory: None,
                ecdh_factory: None,
                cert_decoder: None,
            },
        }
    }
}

impl ServerConfigBuilder {
    pub fn min_version(mut self, version: ProtocolVersion) -> Self {
        self.config.min_version = version;
        self
    }

    pub fn max_version(mut self, version: ProtocolVersion) -> Self {
        self.config.max_version = version;
        self
    }

    /// Set the same preference list for every minor version.
    pub fn ciphersuites(mut self, suites: &[u16]) -> Self {
        for list in &mut self.config.ciphersuite_preferences {
            *list = suites.to_vec();
        }
        self
    }

    /// Set the preference list for one minor version.
    pub fn ciphersuites_for_version(mut self, minor: u8, suites: &[u16]) -> Self {
        if let Some(list) = self.config.ciphersuite_preferences.get_mut(minor as usize) {
            *list = suites.to_vec();
        }
        self
    }

    pub fn deflate_compression(mut self, enable: bool) -> Self {
        self.config.deflate_compression = enable;
        self
    }

    pub fn allow_sslv2_client_hello(mut self, enable: bool) -> Self {
        self.config.allow_sslv2_client_hello = enable;
        self
    }

    /// DH group for DHE key exchange (big-endian P and G).
    pub fn dh_group(mut self, p: &[u8], g: &[u8]) -> Self {
        self.config.dhm_p = p.to_vec();
        self.config.dhm_g = g.to_vec();
        self
    }

    pub fn certificate_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.config.certificate_chain = chain;
        self
    }

    pub fn ca_subject_dns(mut self, dns: Vec<Vec<u8>>) -> Self {
        self.config.ca_subject_dns = dns;
        self
    }

    pub fn rsa_key(mut self, key: Arc<dyn RsaServerKey>) -> Self {
        self.config.rsa_key = Some(key);
        self
    }

    pub fn psk(mut self, identity: &[u8], key: &[u8]) -> Self {
        self.config.psk_identity = Some(identity.to_vec());
        self.config.psk = Some(key.to_vec());
        self
    }

    pub fn authmode(mut self, authmode: Authmode) -> Self {
        self.config.authmode = authmode;
        self
    }

    pub fn legacy_renegotiation(mut self, policy: LegacyRenegotiation) -> Self {
        self.config.legacy_renegotiation = policy;
        self
    }

    pub fn sni_callback(mut self, cb: SniCallback) -> Self {
        self.config.sni_callback = Some(cb);
        self
    }

    pub fn session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.config.session_cache = Some(cache);
        self
    }

    pub fn rng(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.config.rng = rng;
        self
    }

    pub fn dh_factory(mut self, factory: DhEngineFactory) -> Self {
        self.config.dh_factory = Some(factory);
        self
    }

    pub fn ecdh_factory(mut self, factory: EcdhEngineFactory) -> Self {
        self.config.ecdh_factory = Some(factory);
        self
    }

    pub fn cert_decoder(mut self, decoder: Arc<dyn PeerCertificateDecoder>) -> Self {
        self.config.cert_decoder = Some(decoder);
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
