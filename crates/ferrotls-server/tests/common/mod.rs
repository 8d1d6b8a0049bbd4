//! Shared test harness: a scripted in-memory record layer, mock crypto
//! collaborators and a minimal client-side mirror for driving full
//! handshakes against the engine.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ferrotls_server::alert::{AlertDescription, AlertLevel};
use ferrotls_server::ciphersuite::{from_id, CipherSuiteInfo};
use ferrotls_server::config::{PeerCertificate, PeerCertificateDecoder, ServerConfig};
use ferrotls_server::crypt::key_schedule::{
    compute_verify_data, derive_master_secret, KeyBlock,
};
use ferrotls_server::crypt::transcript::Transcript;
use ferrotls_server::crypt::{
    DhEngine, EcPointFormat, EcdhEngine, HashAlgorithm, NamedCurve, RsaPublicKey, RsaServerKey,
    SecureRandom,
};
use ferrotls_server::handshake::codec::wrap_handshake;
use ferrotls_server::handshake::server::ServerHandshake;
use ferrotls_server::handshake::HandshakeType;
use ferrotls_server::record::{ContentType, InboundRecord, RecordLayer};
use ferrotls_server::session::{Session, SessionCache};
use ferrotls_server::ProtocolVersion;
use ferrotls_types::{CryptoError, RecordError, TlsError};

pub const MOCK_RSA_LEN: usize = 64;
const RSA_ENC_MARKER: u8 = 0x5A;
const RSA_SIG_MARKER: u8 = 0xA5;

// ---------------------------------------------------------------------------
// Record layer
// ---------------------------------------------------------------------------

/// Scripted record layer: raw bytes for the ClientHello path, a queue of
/// decoded records for everything after, and captured output.
#[derive(Default)]
pub struct MockRecordLayer {
    raw: Vec<u8>,
    pub inbound: VecDeque<InboundRecord>,
    pub outbound: Vec<(ContentType, Vec<u8>)>,
    pub alerts: Vec<(AlertLevel, AlertDescription)>,
    pub installed_suite: Option<u16>,
    pub installed_key_len: Option<usize>,
    pub version: Option<ProtocolVersion>,
    pub read_cipher_changes: usize,
    pub write_cipher_changes: usize,
    pub flushes: usize,
}

impl MockRecordLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage raw inbound bytes (the unparsed ClientHello flight).
    pub fn push_raw(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);
    }

    /// Stage a decoded inbound record.
    pub fn push_record(&mut self, content_type: ContentType, payload: Vec<u8>) {
        self.inbound.push_back(InboundRecord {
            content_type,
            payload,
        });
    }

    pub fn push_handshake(&mut self, msg: Vec<u8>) {
        self.push_record(ContentType::Handshake, msg);
    }

    /// Outbound handshake messages written so far.
    pub fn handshake_messages(&self) -> Vec<Vec<u8>> {
        self.outbound
            .iter()
            .filter(|(t, _)| *t == ContentType::Handshake)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl RecordLayer for MockRecordLayer {
    fn fetch_input(&mut self, n: usize) -> Result<&[u8], RecordError> {
        if self.raw.len() < n {
            return Err(RecordError::WouldBlock);
        }
        Ok(&self.raw[..n])
    }

    fn consume_input(&mut self) {
        self.raw.clear();
    }

    fn read_record(&mut self) -> Result<InboundRecord, RecordError> {
        self.inbound.pop_front().ok_or(RecordError::WouldBlock)
    }

    fn write_record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<(), RecordError> {
        self.outbound.push((content_type, payload.to_vec()));
        Ok(())
    }

    fn send_alert(
        &mut self,
        level: AlertLevel,
        description: AlertDescription,
    ) -> Result<(), RecordError> {
        self.alerts.push((level, description));
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), RecordError> {
        self.flushes += 1;
        Ok(())
    }

    fn install_keys(&mut self, suite: u16, keys: &KeyBlock) -> Result<(), RecordError> {
        self.installed_suite = Some(suite);
        self.installed_key_len = Some(keys.client_write_key.len());
        Ok(())
    }

    fn change_read_cipher(&mut self) -> Result<(), RecordError> {
        self.read_cipher_changes += 1;
        Ok(())
    }

    fn change_write_cipher(&mut self) -> Result<(), RecordError> {
        self.write_cipher_changes += 1;
        Ok(())
    }

    fn set_version(&mut self, version: ProtocolVersion) {
        self.version = Some(version);
    }
}

// ---------------------------------------------------------------------------
// Crypto mocks
// ---------------------------------------------------------------------------

/// Deterministic RNG: fills with a fixed byte.
pub struct FixedRng(pub u8);

impl SecureRandom for FixedRng {
    fn fill(&self, out: &mut [u8]) -> Result<(), CryptoError> {
        out.fill(self.0);
        Ok(())
    }
}

/// Toy RSA: "encryption" prepends a marker, "signatures" embed the
/// digest. Enough structure for the engine's length and content checks.
pub struct MockRsaKey;

pub fn mock_rsa_encrypt(pms: &[u8]) -> Vec<u8> {
    let mut ct = vec![RSA_ENC_MARKER; MOCK_RSA_LEN - pms.len()];
    ct.extend_from_slice(pms);
    ct
}

pub fn mock_rsa_sign(hash_alg: Option<HashAlgorithm>, hash: &[u8]) -> Vec<u8> {
    let mut sig = vec![0u8; MOCK_RSA_LEN];
    sig[0] = RSA_SIG_MARKER;
    sig[1] = hash_alg.map(|a| a as u8).unwrap_or(0);
    let n = hash.len().min(MOCK_RSA_LEN - 2);
    sig[2..2 + n].copy_from_slice(&hash[..n]);
    sig
}

impl RsaServerKey for MockRsaKey {
    fn len(&self) -> usize {
        MOCK_RSA_LEN
    }

    fn sign(&self, hash_alg: Option<HashAlgorithm>, hash: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(mock_rsa_sign(hash_alg, hash))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() != MOCK_RSA_LEN || ciphertext[..16] != [RSA_ENC_MARKER; 16] {
            return Err(CryptoError::DecryptFailed);
        }
        Ok(ciphertext[16..].to_vec())
    }
}

pub struct MockRsaVerifier;

impl RsaPublicKey for MockRsaVerifier {
    fn len(&self) -> usize {
        MOCK_RSA_LEN
    }

    fn verify(
        &self,
        hash_alg: Option<HashAlgorithm>,
        hash: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        if signature == mock_rsa_sign(hash_alg, hash) {
            Ok(())
        } else {
            Err(CryptoError::VerifyFailed)
        }
    }
}

pub struct MockCertDecoder;

impl PeerCertificateDecoder for MockCertDecoder {
    fn decode(&self, der: &[u8]) -> Result<PeerCertificate, CryptoError> {
        if der.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        Ok(PeerCertificate {
            der: der.to_vec(),
            public_key: Arc::new(MockRsaVerifier),
        })
    }
}

/// Symmetric toy agreement: both sides right-align their publics into the
/// shared length and XOR.
pub fn mock_shared_secret(a: &[u8], b: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    for (i, &byte) in a.iter().rev().enumerate().take(len) {
        out[len - 1 - i] ^= byte;
    }
    for (i, &byte) in b.iter().rev().enumerate().take(len) {
        out[len - 1 - i] ^= byte;
    }
    out
}

pub const MOCK_DH_PUBLIC: u8 = 0x33;

#[derive(Default)]
pub struct MockDh {
    modulus_len: usize,
    own_public: Vec<u8>,
    peer_public: Vec<u8>,
}

impl DhEngine for MockDh {
    fn set_group(&mut self, p: &[u8], _g: &[u8]) -> Result<(), CryptoError> {
        if p.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        self.modulus_len = p.len();
        Ok(())
    }

    fn make_public(&mut self, _rng: &dyn SecureRandom) -> Result<Vec<u8>, CryptoError> {
        self.own_public = vec![MOCK_DH_PUBLIC; self.modulus_len];
        Ok(self.own_public.clone())
    }

    fn modulus_len(&self) -> usize {
        self.modulus_len
    }

    fn read_public(&mut self, public: &[u8]) -> Result<(), CryptoError> {
        if public.is_empty() || public.iter().all(|&b| b == 0) {
            return Err(CryptoError::BadPublicValue);
        }
        self.peer_public = public.to_vec();
        Ok(())
    }

    fn compute_secret(&mut self) -> Result<Vec<u8>, CryptoError> {
        if self.peer_public.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        Ok(mock_shared_secret(
            &self.own_public,
            &self.peer_public,
            self.modulus_len,
        ))
    }
}

pub const MOCK_ECDH_PUBLIC: u8 = 0x66;

#[derive(Default)]
pub struct MockEcdh {
    field_len: usize,
    own_public: Vec<u8>,
    peer_public: Vec<u8>,
}

impl EcdhEngine for MockEcdh {
    fn setup(&mut self, curve: NamedCurve) -> Result<(), CryptoError> {
        self.field_len = curve.field_len();
        Ok(())
    }

    fn make_public(
        &mut self,
        _format: EcPointFormat,
        _rng: &dyn SecureRandom,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut point = vec![0x04];
        point.extend_from_slice(&vec![MOCK_ECDH_PUBLIC; 2 * self.field_len]);
        self.own_public = point.clone();
        Ok(point)
    }

    fn field_len(&self) -> usize {
        self.field_len
    }

    fn read_public(&mut self, point: &[u8]) -> Result<(), CryptoError> {
        if point.first() != Some(&0x04) {
            return Err(CryptoError::BadPublicValue);
        }
        self.peer_public = point.to_vec();
        Ok(())
    }

    fn compute_secret(&mut self) -> Result<Vec<u8>, CryptoError> {
        if self.peer_public.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        Ok(mock_shared_secret(
            &self.own_public,
            &self.peer_public,
            self.field_len,
        ))
    }
}

/// In-memory session cache with call counting.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<Vec<Session>>,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
}

impl SessionCache for MemoryCache {
    fn get(&self, id: &[u8]) -> Option<Session> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    fn put(&self, session: &Session) {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().push(session.clone());
    }
}

// ---------------------------------------------------------------------------
// ClientHello construction
// ---------------------------------------------------------------------------

pub struct ClientHelloBuilder {
    pub version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub suites: Vec<u16>,
    pub compressions: Vec<u8>,
    pub extensions: Vec<(u16, Vec<u8>)>,
}

impl ClientHelloBuilder {
    pub fn new() -> Self {
        Self {
            version: ProtocolVersion::TLS1_2,
            random: [0xAA; 32],
            session_id: Vec::new(),
            suites: vec![0x002F],
            compressions: vec![0x00],
            extensions: Vec::new(),
        }
    }

    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn random(mut self, random: [u8; 32]) -> Self {
        self.random = random;
        self
    }

    pub fn session_id(mut self, id: &[u8]) -> Self {
        self.session_id = id.to_vec();
        self
    }

    pub fn suites(mut self, suites: &[u16]) -> Self {
        self.suites = suites.to_vec();
        self
    }

    pub fn compressions(mut self, methods: &[u8]) -> Self {
        self.compressions = methods.to_vec();
        self
    }

    pub fn extension(mut self, id: u16, data: Vec<u8>) -> Self {
        self.extensions.push((id, data));
        self
    }

    pub fn signature_algorithms(self, pairs: &[(u8, u8)]) -> Self {
        let mut data = ((pairs.len() * 2) as u16).to_be_bytes().to_vec();
        for &(hash, sig) in pairs {
            data.push(hash);
            data.push(sig);
        }
        self.extension(13, data)
    }

    pub fn supported_groups(self, curves: &[u16]) -> Self {
        let mut data = ((curves.len() * 2) as u16).to_be_bytes().to_vec();
        for &c in curves {
            data.extend_from_slice(&c.to_be_bytes());
        }
        self.extension(10, data)
    }

    pub fn point_formats(self, formats: &[u8]) -> Self {
        let mut data = vec![formats.len() as u8];
        data.extend_from_slice(formats);
        self.extension(11, data)
    }

    pub fn server_name(self, host: &[u8]) -> Self {
        let mut data = ((host.len() + 3) as u16).to_be_bytes().to_vec();
        data.push(0); // host_name
        data.extend_from_slice(&(host.len() as u16).to_be_bytes());
        data.extend_from_slice(host);
        self.extension(0, data)
    }

    pub fn renegotiation_info(self, connection: &[u8]) -> Self {
        let mut data = vec![connection.len() as u8];
        data.extend_from_slice(connection);
        self.extension(0xFF01, data)
    }

    /// The handshake message (4-byte header included).
    pub fn build_msg(&self) -> Vec<u8> {
        let mut body = vec![self.version.major, self.version.minor];
        body.extend_from_slice(&self.random);
        body.push(self.session_id.len() as u8);
        body.extend_from_slice(&self.session_id);
        body.extend_from_slice(&((self.suites.len() * 2) as u16).to_be_bytes());
        for s in &self.suites {
            body.extend_from_slice(&s.to_be_bytes());
        }
        body.push(self.compressions.len() as u8);
        body.extend_from_slice(&self.compressions);
        if !self.extensions.is_empty() {
            let ext_len: usize = self.extensions.iter().map(|(_, d)| 4 + d.len()).sum();
            body.extend_from_slice(&(ext_len as u16).to_be_bytes());
            for (id, data) in &self.extensions {
                body.extend_from_slice(&id.to_be_bytes());
                body.extend_from_slice(&(data.len() as u16).to_be_bytes());
                body.extend_from_slice(data);
            }
        }
        wrap_handshake(HandshakeType::ClientHello, &body)
    }

    /// The raw record bytes (5-byte record header + message).
    pub fn build_record(&self) -> Vec<u8> {
        let msg = self.build_msg();
        let mut rec = vec![22, 3, self.version.minor];
        rec.extend_from_slice(&(msg.len() as u16).to_be_bytes());
        rec.extend_from_slice(&msg);
        rec
    }
}

/// Build an SSLv2-compatible ClientHello flight: 2-byte record header
/// (high bit set) plus the v2 message.
pub fn build_v2_record(
    minor: u8,
    suites3: &[[u8; 3]],
    session_id: &[u8],
    challenge: &[u8],
) -> Vec<u8> {
    let mut msg = vec![0x01, 0x03, minor];
    msg.extend_from_slice(&((suites3.len() * 3) as u16).to_be_bytes());
    msg.extend_from_slice(&(session_id.len() as u16).to_be_bytes());
    msg.extend_from_slice(&(challenge.len() as u16).to_be_bytes());
    for entry in suites3 {
        msg.extend_from_slice(entry);
    }
    msg.extend_from_slice(session_id);
    msg.extend_from_slice(challenge);

    let mut rec = vec![0x80 | ((msg.len() >> 8) as u8), msg.len() as u8];
    rec.extend_from_slice(&msg);
    rec
}

// ---------------------------------------------------------------------------
// Client-side flight helpers
// ---------------------------------------------------------------------------

pub fn cke_rsa(ciphertext: &[u8]) -> Vec<u8> {
    let mut body = (ciphertext.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(ciphertext);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn cke_dh(public: &[u8]) -> Vec<u8> {
    let mut body = (public.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(public);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn cke_ecdh(point: &[u8]) -> Vec<u8> {
    let mut body = vec![point.len() as u8];
    body.extend_from_slice(point);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn cke_psk(identity: &[u8]) -> Vec<u8> {
    let mut body = (identity.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(identity);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn cke_dhe_psk(identity: &[u8], public: &[u8]) -> Vec<u8> {
    let mut body = (identity.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(identity);
    body.extend_from_slice(&(public.len() as u16).to_be_bytes());
    body.extend_from_slice(public);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn client_certificate(chain: &[&[u8]]) -> Vec<u8> {
    let total: usize = chain.iter().map(|c| 3 + c.len()).sum();
    let mut body = vec![(total >> 16) as u8, (total >> 8) as u8, total as u8];
    for cert in chain {
        let len = cert.len();
        body.push((len >> 16) as u8);
        body.push((len >> 8) as u8);
        body.push(len as u8);
        body.extend_from_slice(cert);
    }
    wrap_handshake(HandshakeType::Certificate, &body)
}

/// Extract the server random from an encoded ServerHello message.
pub fn server_random(server_hello: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&server_hello[6..38]);
    out
}

pub fn server_session_id(server_hello: &[u8]) -> Vec<u8> {
    let len = server_hello[38] as usize;
    server_hello[39..39 + len].to_vec()
}

pub fn server_chosen_suite(server_hello: &[u8]) -> u16 {
    let at = 39 + server_hello[38] as usize;
    u16::from_be_bytes([server_hello[at], server_hello[at + 1]])
}

/// Parse (P, G, Ys) out of a ServerKeyExchange body slice.
pub fn parse_ske_dh_params(mut body: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut fields = Vec::new();
    for _ in 0..3 {
        let len = u16::from_be_bytes([body[0], body[1]]) as usize;
        fields.push(body[2..2 + len].to_vec());
        body = &body[2 + len..];
    }
    let ys = fields.pop().unwrap();
    let g = fields.pop().unwrap();
    let p = fields.pop().unwrap();
    (p, g, ys)
}

/// Parse the server's public point out of an ECDHE ServerKeyExchange body.
pub fn parse_ske_ecdh_point(body: &[u8]) -> Vec<u8> {
    assert_eq!(body[0], 3, "named_curve expected");
    let len = body[3] as usize;
    body[4..4 + len].to_vec()
}

// ---------------------------------------------------------------------------
// Driving
// ---------------------------------------------------------------------------

/// Step the engine until it blocks on input, finishes, or fails.
pub fn drive(hs: &mut ServerHandshake<MockRecordLayer>) -> Result<(), TlsError> {
    use ferrotls_server::handshake::ServerHandshakeState;
    while hs.state() != ServerHandshakeState::HandshakeOver {
        match hs.step() {
            Ok(()) => {}
            Err(e) if e.is_retryable() => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// A client-side mirror that follows the transcript and computes the
/// Finished values with the engine's own key schedule.
pub struct ClientMirror {
    pub version: ProtocolVersion,
    pub suite: &'static CipherSuiteInfo,
    pub transcript: Transcript,
    pub randbytes: [u8; 64],
    pub master: Vec<u8>,
}

impl ClientMirror {
    pub fn new(version: ProtocolVersion, suite_id: u16) -> Self {
        Self {
            version,
            suite: from_id(suite_id).expect("known suite"),
            transcript: Transcript::new(),
            randbytes: [0u8; 64],
            master: Vec::new(),
        }
    }

    pub fn fold(&mut self, msg: &[u8]) {
        self.transcript.update(msg);
    }

    pub fn set_randoms(&mut self, client: &[u8; 32], server: &[u8; 32]) {
        self.randbytes[..32].copy_from_slice(client);
        self.randbytes[32..].copy_from_slice(server);
    }

    pub fn derive_master(&mut self, premaster: &[u8]) {
        self.master =
            derive_master_secret(self.version, self.suite, premaster, &self.randbytes).unwrap();
    }

    pub fn set_master(&mut self, master: &[u8]) {
        self.master = master.to_vec();
    }

    pub fn finished_verify_data(&self, label: &str) -> Vec<u8> {
        let hash = self.transcript.finished_hash(self.version, self.suite.mac);
        compute_verify_data(self.version, self.suite, &self.master, label, &hash).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Configs
// ---------------------------------------------------------------------------

pub fn base_config() -> ServerConfig {
    ServerConfig::builder()
        .rsa_key(Arc::new(MockRsaKey))
        .certificate_chain(vec![vec![0x30, 0x82, 0x01, 0x00]])
        .rng(Arc::new(FixedRng(0x42)))
        .build()
}

pub fn config_builder_with_mocks() -> ferrotls_server::config::ServerConfigBuilder {
    ServerConfig::builder()
        .rsa_key(Arc::new(MockRsaKey))
        .certificate_chain(vec![vec![0x30, 0x82, 0x01, 0x00]])
        .rng(Arc::new(FixedRng(0x42)))
        .dh_group(&[0xD7; 64], &[0x02])
        .dh_factory(Arc::new(|| Box::new(MockDh::default()) as Box<dyn DhEngine>))
        .ecdh_factory(Arc::new(|| {
            Box::new(MockEcdh::default()) as Box<dyn EcdhEngine>
        }))
        .cert_decoder(Arc::new(MockCertDecoder))
}
