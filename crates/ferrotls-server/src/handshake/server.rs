//! Server handshake state machine.
//!
//! A one-step driver advances [`ServerHandshakeState`] through the TLS
//! flight ordering: the caller invokes [`ServerHandshake::step`] until
//! the handshake is over, retrying whenever the record layer reports
//! `WouldBlock`. All I/O, record protection and primitive crypto happen
//! behind the collaborator seams.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ferrotls_types::TlsError;
use log::{debug, trace};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::alert::{AlertDescription, AlertLevel};
use crate::ciphersuite::{self, CipherSuiteInfo, KeyExchange, TLS_EMPTY_RENEGOTIATION_INFO_SCSV};
use crate::config::{Authmode, LegacyRenegotiation, ServerConfig, SniAction};
use crate::crypt::key_schedule::{compute_verify_data, derive_key_block, derive_master_secret};
use crate::crypt::provider::digest_for;
use crate::crypt::transcript::Transcript;
use crate::crypt::{DhEngine, EcPointFormat, EcdhEngine, HashAlgorithm, NamedCurve};
use crate::record::{ContentType, RecordLayer};
use crate::session::{Compression, Session};
use crate::ProtocolVersion;

use super::codec::parse_handshake_header;
use super::codec::Reader;
use super::extensions_codec::{self, ext_id};
use super::messages::{self, ServerHello, SkeSignature};
use super::{HandshakeType, ServerHandshakeState};

/// Whether this negotiation is the connection's first handshake or a
/// renegotiation over an established one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenegotiationPhase {
    Initial,
    InProgress,
}

/// Whether the peer signalled RFC 5746 support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureRenegotiation {
    Legacy,
    Secure,
}

/// Per-negotiation scratch, zeroized when the negotiation ends.
struct HandshakeScratch {
    /// client_random || server_random.
    randbytes: [u8; 64],
    /// Hash for the ServerKeyExchange signature (TLS 1.2). Starts at the
    /// RFC 5246 implied default of SHA-1; the signature_algorithms
    /// extension replaces it, possibly with `None` when the client offers
    /// no usable RSA pair.
    sig_alg: Option<HashAlgorithm>,
    /// Hash requested for CertificateVerify (TLS 1.2).
    verify_sig_alg: HashAlgorithm,
    ec_curve: Option<NamedCurve>,
    ec_point_format: EcPointFormat,
    dh: Option<Box<dyn DhEngine>>,
    ecdh: Option<Box<dyn EcdhEngine>>,
    premaster: Vec<u8>,
    /// The version ceiling the client advertised (checked against the
    /// decrypted RSA premaster).
    peer_max_version: ProtocolVersion,
    transcript: Transcript,
    resume: bool,
    master_secret: Vec<u8>,
}

impl HandshakeScratch {
    fn new() -> Self {
        Self {
            randbytes: [0u8; 64],
            sig_alg: Some(HashAlgorithm::Sha1),
            verify_sig_alg: HashAlgorithm::Sha256,
            ec_curve: None,
            ec_point_format: EcPointFormat::Uncompressed,
            dh: None,
            ecdh: None,
            premaster: Vec::new(),
            peer_max_version: ProtocolVersion::SSL3,
            transcript: Transcript::new(),
            resume: false,
            master_secret: Vec::new(),
        }
    }

    /// Wipe for a new negotiation, reusing the transcript buffer.
    fn reset(&mut self) {
        self.randbytes.zeroize();
        self.sig_alg = Some(HashAlgorithm::Sha1);
        self.verify_sig_alg = HashAlgorithm::Sha256;
        self.ec_curve = None;
        self.ec_point_format = EcPointFormat::Uncompressed;
        self.dh = None;
        self.ecdh = None;
        self.premaster.zeroize();
        self.premaster.clear();
        self.peer_max_version = ProtocolVersion::SSL3;
        self.transcript.reset();
        self.resume = false;
        self.master_secret.zeroize();
        self.master_secret.clear();
    }
}

impl Drop for HandshakeScratch {
    fn drop(&mut self) {
        self.randbytes.zeroize();
        self.premaster.zeroize();
        self.master_secret.zeroize();
    }
}

/// The server handshake engine for one connection.
pub struct ServerHandshake<R: RecordLayer> {
    config: ServerConfig,
    record: R,
    state: ServerHandshakeState,
    version: ProtocolVersion,
    renegotiation: RenegotiationPhase,
    secure_renegotiation: SecureRenegotiation,
    /// Our Finished verify_data from the last completed handshake.
    own_verify_data: Vec<u8>,
    /// The peer's Finished verify_data from the last completed handshake.
    peer_verify_data: Vec<u8>,
    session: Session,
    scratch: HandshakeScratch,
}

impl<R: RecordLayer> ServerHandshake<R> {
    pub fn new(config: ServerConfig, record: R) -> Self {
        let max_version = config.max_version;
        Self {
            config,
            record,
            state: ServerHandshakeState::HelloRequest,
            version: max_version,
            renegotiation: RenegotiationPhase::Initial,
            secure_renegotiation: SecureRenegotiation::Legacy,
            own_verify_data: Vec::new(),
            peer_verify_data: Vec::new(),
            session: Session::new(),
            scratch: HandshakeScratch::new(),
        }
    }

    pub fn state(&self) -> ServerHandshakeState {
        self.state
    }

    /// The negotiated protocol version.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn secure_renegotiation(&self) -> SecureRenegotiation {
        self.secure_renegotiation
    }

    /// The session negotiated by the last completed handshake.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the last handshake resumed a cached session.
    pub fn is_resumed(&self) -> bool {
        self.scratch.resume
    }

    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Run the driver to completion (convenience wrapper over [`step`]).
    ///
    /// [`step`]: Self::step
    pub fn handshake(&mut self) -> Result<(), TlsError> {
        while self.state != ServerHandshakeState::HandshakeOver {
            self.step()?;
        }
        Ok(())
    }

    /// Advance the handshake by one state.
    pub fn step(&mut self) -> Result<(), TlsError> {
        if self.state == ServerHandshakeState::HandshakeOver {
            return Err(TlsError::BadInputData);
        }

        trace!("server state: {:?}", self.state);
        self.record.flush_output()?;

        match self.state {
            ServerHandshakeState::HelloRequest => {
                self.state = ServerHandshakeState::ClientHello;
                Ok(())
            }
            ServerHandshakeState::ClientHello => self.parse_client_hello(),
            ServerHandshakeState::ServerHello => self.write_server_hello(),
            ServerHandshakeState::ServerCertificate => self.write_certificate(),
            ServerHandshakeState::ServerKeyExchange => self.write_server_key_exchange(),
            ServerHandshakeState::CertificateRequest => self.write_certificate_request(),
            ServerHandshakeState::ServerHelloDone => self.write_server_hello_done(),
            ServerHandshakeState::ClientCertificate => self.parse_certificate(),
            ServerHandshakeState::ClientKeyExchange => self.parse_client_key_exchange(),
            ServerHandshakeState::CertificateVerify => self.parse_certificate_verify(),
            ServerHandshakeState::ClientChangeCipherSpec => self.parse_change_cipher_spec(),
            ServerHandshakeState::ClientFinished => self.parse_finished(),
            ServerHandshakeState::ServerChangeCipherSpec => self.write_change_cipher_spec(),
            ServerHandshakeState::ServerFinished => self.write_finished(),
            ServerHandshakeState::FlushBuffers => {
                self.record.flush_output()?;
                self.state = ServerHandshakeState::HandshakeWrapup;
                Ok(())
            }
            ServerHandshakeState::HandshakeWrapup => self.wrapup(),
            ServerHandshakeState::HandshakeOver => Err(TlsError::BadInputData),
        }
    }

    /// Ask the client to renegotiate. HelloRequest is never folded into
    /// the transcript.
    pub fn write_hello_request(&mut self) -> Result<(), TlsError> {
        let msg = messages::encode_hello_request();
        self.record.write_record(ContentType::Handshake, &msg)?;
        self.record.flush_output()?;
        Ok(())
    }

    /// Re-arm the machine for a renegotiation handshake.
    ///
    /// Keeps both Finished verify_data values and the
    /// secure-renegotiation status; resets everything negotiated,
    /// including the transcript.
    pub fn reset_for_renegotiation(&mut self) {
        self.renegotiation = RenegotiationPhase::InProgress;
        self.state = ServerHandshakeState::HelloRequest;
        self.version = self.config.max_version;
        self.session = Session::new();
        self.scratch.reset();
    }

    // -----------------------------------------------------------------------
    // ClientHello
    // -----------------------------------------------------------------------

    fn parse_client_hello(&mut self) -> Result<(), TlsError> {
        debug!("=> parse client hello");

        let msg: Vec<u8>;
        if self.renegotiation == RenegotiationPhase::Initial {
            let hdr = self.record.fetch_input(5)?.to_vec();

            // High bit set on the first byte means SSLv2 framing.
            if hdr[0] & 0x80 != 0 {
                return self.parse_client_hello_v2(&hdr);
            }

            if hdr[0] != ContentType::Handshake as u8 || hdr[1] != 3 {
                return Err(TlsError::BadClientHello);
            }
            let n = u16::from_be_bytes([hdr[3], hdr[4]]) as usize;
            if !(45..=512).contains(&n) {
                return Err(TlsError::BadClientHello);
            }

            msg = self.record.fetch_input(5 + n)?[5..].to_vec();
            self.record.consume_input();
        } else {
            // During renegotiation the ClientHello arrives through the
            // protected record layer.
            let rec = self.record.read_record()?;
            if rec.content_type != ContentType::Handshake {
                return Err(TlsError::BadClientHello);
            }
            msg = rec.payload;
        }

        self.scratch.transcript.update(&msg);
        self.process_client_hello(&msg)
    }

    fn process_client_hello(&mut self, msg: &[u8]) -> Result<(), TlsError> {
        let (hdr, body) = parse_handshake_header(msg).map_err(|_| TlsError::BadClientHello)?;
        if hdr.msg_type != HandshakeType::ClientHello {
            return Err(TlsError::BadClientHello);
        }
        let ch = messages::decode_client_hello(body)?;

        // Version negotiation: min(client max, our max), floor-checked.
        let minor = ch.max_version.minor.min(self.config.max_version.minor);
        if minor < self.config.min_version.minor {
            debug!(
                "client only supports {} below minimum {}",
                ch.max_version, self.config.min_version
            );
            self.record
                .send_alert(AlertLevel::Fatal, AlertDescription::ProtocolVersion)?;
            return Err(TlsError::BadProtocolVersion);
        }
        self.version = ProtocolVersion::new(3, minor);
        self.record.set_version(self.version);
        self.scratch.peer_max_version = ch.max_version;
        debug!("negotiated version: {}", self.version);

        self.scratch.randbytes[..32].copy_from_slice(ch.random);
        self.session.id = ch.session_id.to_vec();

        self.session.compression = Compression::Null;
        if self.config.deflate_compression
            && ch.compressions.contains(&(Compression::Deflate as u8))
        {
            self.session.compression = Compression::Deflate;
        }

        // SCSV scan (RFC 5746 §3.6).
        for pair in ch.ciphersuites.chunks_exact(2) {
            let id = u16::from_be_bytes([pair[0], pair[1]]);
            if id == TLS_EMPTY_RENEGOTIATION_INFO_SCSV {
                debug!("received TLS_EMPTY_RENEGOTIATION_INFO SCSV");
                if self.renegotiation == RenegotiationPhase::InProgress {
                    self.send_fatal_handshake_failure()?;
                    return Err(TlsError::BadClientHello);
                }
                self.secure_renegotiation = SecureRenegotiation::Secure;
                break;
            }
        }

        // Extension walk.
        let mut renegotiation_info_seen = false;
        for &(id, data) in &ch.extensions {
            match id {
                ext_id::SERVER_NAME => {
                    let Some(cb) = self.config.sni_callback.clone() else {
                        continue;
                    };
                    if let Some(name) = extensions_codec::parse_server_name(data)? {
                        if cb(name) == SniAction::Reject {
                            debug!("SNI callback rejected the requested name");
                            self.record.send_alert(
                                AlertLevel::Fatal,
                                AlertDescription::UnrecognizedName,
                            )?;
                            return Err(TlsError::BadClientHello);
                        }
                    }
                }
                ext_id::RENEGOTIATION_INFO => {
                    renegotiation_info_seen = true;
                    self.check_renegotiation_info(data)?;
                }
                ext_id::SIGNATURE_ALGORITHMS => {
                    if self.renegotiation == RenegotiationPhase::InProgress {
                        continue;
                    }
                    self.scratch.sig_alg = extensions_codec::parse_signature_algorithms(data)?;
                }
                ext_id::SUPPORTED_GROUPS => {
                    if let Some(curve) = extensions_codec::parse_supported_groups(data)? {
                        self.scratch.ec_curve = Some(curve);
                    }
                }
                ext_id::EC_POINT_FORMATS => {
                    if let Some(format) = extensions_codec::parse_supported_point_formats(data)? {
                        self.scratch.ec_point_format = format;
                    }
                }
                other => trace!("unknown extension {other} (ignoring)"),
            }
        }

        // Renegotiation policy.
        if renegotiation_policy_violation(
            self.renegotiation,
            self.secure_renegotiation,
            self.config.legacy_renegotiation,
            renegotiation_info_seen,
        ) {
            debug!("renegotiation policy violation, breaking off handshake");
            self.send_fatal_handshake_failure()?;
            return Err(TlsError::BadClientHello);
        }

        // Ciphersuite selection, server preference order. Done last
        // because it needs the EC extension results.
        let info = match negotiate_ciphersuite(
            &self.config,
            self.version,
            ch.ciphersuites,
            self.scratch.ec_curve.is_some(),
            self.scratch.sig_alg.is_some(),
        )? {
            Some(info) => info,
            None => {
                debug!("got no ciphersuites in common");
                self.send_fatal_handshake_failure()?;
                return Err(TlsError::NoCipherChosen);
            }
        };
        self.session.ciphersuite = info.id;
        debug!("chosen ciphersuite: {}", info.name);

        self.state = ServerHandshakeState::ServerHello;
        debug!("<= parse client hello");
        Ok(())
    }

    /// RFC 5746 §3.7: empty on the initial handshake, the peer's previous
    /// verify_data during renegotiation.
    fn check_renegotiation_info(&mut self, data: &[u8]) -> Result<(), TlsError> {
        let connection = extensions_codec::parse_renegotiation_info(data)?;
        match self.renegotiation {
            RenegotiationPhase::Initial => {
                if !connection.is_empty() {
                    debug!("non-zero length renegotiated connection field");
                    self.send_fatal_handshake_failure()?;
                    return Err(TlsError::BadClientHello);
                }
                self.secure_renegotiation = SecureRenegotiation::Secure;
            }
            RenegotiationPhase::InProgress => {
                if connection.len() != self.peer_verify_data.len()
                    || connection.ct_eq(&self.peer_verify_data).unwrap_u8() != 1
                {
                    debug!("non-matching renegotiated connection field");
                    self.send_fatal_handshake_failure()?;
                    return Err(TlsError::BadClientHello);
                }
            }
        }
        Ok(())
    }

    /// The SSLv2-compatible ClientHello shape (RFC 5246 Appendix E.2).
    /// `hdr` holds the first 5 raw bytes already fetched.
    fn parse_client_hello_v2(&mut self, hdr: &[u8]) -> Result<(), TlsError> {
        debug!("=> parse client hello v2");

        if !self.config.allow_sslv2_client_hello {
            return Err(TlsError::FeatureUnavailable);
        }
        if self.renegotiation == RenegotiationPhase::InProgress {
            debug!("client hello v2 illegal for renegotiation");
            self.send_fatal_handshake_failure()?;
            return Err(TlsError::BadClientHello);
        }

        if hdr[2] != HandshakeType::ClientHello as u8 || hdr[3] != 3 {
            return Err(TlsError::BadClientHello);
        }
        let n = (((hdr[0] & 0x7F) as usize) << 8) | hdr[1] as usize;
        if !(17..=512).contains(&n) {
            return Err(TlsError::BadClientHello);
        }

        let minor = hdr[4].min(self.config.max_version.minor);
        if minor < self.config.min_version.minor {
            self.record
                .send_alert(AlertLevel::Fatal, AlertDescription::ProtocolVersion)?;
            return Err(TlsError::BadProtocolVersion);
        }
        self.version = ProtocolVersion::new(3, minor);
        self.record.set_version(self.version);
        self.scratch.peer_max_version = ProtocolVersion::new(hdr[3], hdr[4]);

        let msg = self.record.fetch_input(2 + n)?[2..].to_vec();
        self.record.consume_input();
        self.scratch.transcript.update(&msg);

        let ch = messages::decode_client_hello_v2(&msg)?;

        self.session.id = ch.session_id.to_vec();
        self.session.compression = Compression::Null;

        // The challenge fills client_random right-aligned; the remainder
        // stays zero.
        self.scratch.randbytes = [0u8; 64];
        self.scratch.randbytes[32 - ch.challenge.len()..32].copy_from_slice(ch.challenge);

        // SCSV uses the 3-byte form (0, 0, 0xFF).
        for entry in ch.ciphersuites.chunks_exact(3) {
            if entry == [0x00, 0x00, 0xFF] {
                debug!("received TLS_EMPTY_RENEGOTIATION_INFO SCSV");
                self.secure_renegotiation = SecureRenegotiation::Secure;
                break;
            }
        }

        // Server-preference selection over the non-EC suites only; the v2
        // shape carries no extensions, so no curve can be negotiated.
        let mut chosen = None;
        'outer: for &candidate in self.config.ciphersuites_for(minor) {
            if candidate >> 8 != 0 {
                continue;
            }
            for entry in ch.ciphersuites.chunks_exact(3) {
                if entry[0] == 0 && entry[1] == 0 && entry[2] == candidate as u8 {
                    let info = ciphersuite::from_id(candidate).ok_or(TlsError::BadInputData)?;
                    if !info.usable_at(minor) {
                        continue;
                    }
                    chosen = Some(info);
                    break 'outer;
                }
            }
        }
        let info = match chosen {
            Some(info) => info,
            None => {
                debug!("got no ciphersuites in common");
                return Err(TlsError::NoCipherChosen);
            }
        };
        self.session.ciphersuite = info.id;
        debug!("chosen ciphersuite: {}", info.name);

        if self.secure_renegotiation == SecureRenegotiation::Legacy
            && self.config.legacy_renegotiation == LegacyRenegotiation::BreakHandshake
        {
            debug!("legacy renegotiation, breaking off handshake");
            self.send_fatal_handshake_failure()?;
            return Err(TlsError::BadClientHello);
        }

        self.state = ServerHandshakeState::ServerHello;
        debug!("<= parse client hello v2");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Server flight
    // -----------------------------------------------------------------------

    fn write_server_hello(&mut self) -> Result<(), TlsError> {
        debug!("=> write server hello");

        // server_random = UNIX timestamp || 28 RNG bytes.
        let mut random = [0u8; 32];
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0) as u32;
        random[..4].copy_from_slice(&now.to_be_bytes());
        self.config
            .rng
            .fill(&mut random[4..])
            .map_err(TlsError::Crypto)?;
        self.scratch.randbytes[32..].copy_from_slice(&random);

        // Resumption: only on the initial handshake, only when the cache
        // returns an entry consistent with what we just negotiated.
        let cached = if self.renegotiation == RenegotiationPhase::Initial
            && !self.session.id.is_empty()
        {
            self.config
                .session_cache
                .as_ref()
                .and_then(|cache| cache.get(&self.session.id))
                .filter(|hit| {
                    hit.ciphersuite == self.session.ciphersuite
                        && hit.compression == self.session.compression
                })
        } else {
            None
        };

        if let Some(hit) = cached {
            debug!("session resumed from cache");
            self.scratch.resume = true;
            self.scratch.master_secret = hit.master_secret.clone();
            self.session.peer_cert = hit.peer_cert.clone();
            self.derive_keys()?;
            self.state = ServerHandshakeState::ServerChangeCipherSpec;
        } else {
            self.scratch.resume = false;
            let mut id = vec![0u8; 32];
            self.config.rng.fill(&mut id).map_err(TlsError::Crypto)?;
            self.session.id = id;
            self.state = ServerHandshakeState::ServerCertificate;
        }

        let renegotiation_info = if self.secure_renegotiation == SecureRenegotiation::Secure {
            Some(extensions_codec::build_renegotiation_info(
                &self.peer_verify_data,
                &self.own_verify_data,
            ))
        } else {
            None
        };

        let sh = ServerHello {
            version: self.version,
            random: &random,
            session_id: &self.session.id,
            ciphersuite: self.session.ciphersuite,
            compression: self.session.compression,
            renegotiation_info,
        };
        let msg = messages::encode_server_hello(&sh);
        self.scratch.transcript.update(&msg);
        self.record.write_record(ContentType::Handshake, &msg)?;

        debug!("<= write server hello");
        Ok(())
    }

    fn write_certificate(&mut self) -> Result<(), TlsError> {
        let info = self.current_suite()?;
        if !info.key_exchange.requires_certificate() {
            debug!("<= skip write certificate");
            self.state = self.state.next();
            return Ok(());
        }
        if self.config.certificate_chain.is_empty() {
            debug!("got no certificate to send");
            return Err(TlsError::PrivateKeyRequired);
        }

        debug!("=> write certificate");
        let msg = messages::encode_certificate(&self.config.certificate_chain);
        self.scratch.transcript.update(&msg);
        self.record.write_record(ContentType::Handshake, &msg)?;
        self.state = self.state.next();
        debug!("<= write certificate");
        Ok(())
    }

    fn write_server_key_exchange(&mut self) -> Result<(), TlsError> {
        debug!("=> write server key exchange");
        let info = self.current_suite()?;
        let kx = info.key_exchange;

        let params = match kx {
            KeyExchange::Rsa | KeyExchange::Psk => {
                debug!("<= skip write server key exchange");
                self.state = self.state.next();
                return Ok(());
            }
            KeyExchange::DheRsa | KeyExchange::DhePsk => {
                if self.config.dhm_p.is_empty() || self.config.dhm_g.is_empty() {
                    return Err(TlsError::FeatureUnavailable);
                }
                let factory = self
                    .config
                    .dh_factory
                    .as_ref()
                    .ok_or(TlsError::FeatureUnavailable)?;
                let mut dh = factory();
                dh.set_group(&self.config.dhm_p, &self.config.dhm_g)?;
                let ys = dh.make_public(self.config.rng.as_ref())?;
                let params = messages::build_dh_params(&self.config.dhm_p, &self.config.dhm_g, &ys);
                self.scratch.dh = Some(dh);
                params
            }
            KeyExchange::EcdheRsa => {
                let curve = self.scratch.ec_curve.ok_or(TlsError::FeatureUnavailable)?;
                let factory = self
                    .config
                    .ecdh_factory
                    .as_ref()
                    .ok_or(TlsError::FeatureUnavailable)?;
                let mut ecdh = factory();
                ecdh.setup(curve)?;
                let point =
                    ecdh.make_public(self.scratch.ec_point_format, self.config.rng.as_ref())?;
                let params = messages::build_ecdh_params(curve, &point);
                self.scratch.ecdh = Some(ecdh);
                params
            }
        };

        // DHE-RSA and ECDHE-RSA sign client_random || server_random ||
        // params; DHE-PSK parameters go out unsigned.
        let signature = if kx.is_rsa_signed() {
            let key = self
                .config
                .rsa_key
                .as_ref()
                .ok_or(TlsError::PrivateKeyRequired)?;

            let (sig_alg, digest) = if self.version.has_explicit_sig_alg() {
                let alg = self.scratch.sig_alg.ok_or(TlsError::FeatureUnavailable)?;
                let mut ctx = digest_for(alg);
                ctx.update(&self.scratch.randbytes);
                ctx.update(&params);
                let mut out = vec![0u8; ctx.output_size()];
                ctx.finish(&mut out);
                (Some(alg), out)
            } else {
                // 36-byte MD5 || SHA-1 digest, signed raw.
                let mut out = vec![0u8; 36];
                let mut md5 = digest_for(HashAlgorithm::Md5);
                md5.update(&self.scratch.randbytes);
                md5.update(&params);
                md5.finish(&mut out[..16]);
                let mut sha1 = digest_for(HashAlgorithm::Sha1);
                sha1.update(&self.scratch.randbytes);
                sha1.update(&params);
                sha1.finish(&mut out[16..]);
                (None, out)
            };

            Some((sig_alg, key.sign(sig_alg, &digest)?))
        } else {
            None
        };

        let msg = messages::encode_server_key_exchange(
            kx == KeyExchange::DhePsk,
            &params,
            signature.as_ref().map(|(sig_alg, sig)| SkeSignature {
                sig_alg: *sig_alg,
                signature: sig,
            }),
        );
        self.scratch.transcript.update(&msg);
        self.record.write_record(ContentType::Handshake, &msg)?;
        self.state = self.state.next();
        debug!("<= write server key exchange");
        Ok(())
    }

    fn write_certificate_request(&mut self) -> Result<(), TlsError> {
        let info = self.current_suite()?;
        self.state = self.state.next();

        if info.key_exchange.is_psk() || self.config.authmode == Authmode::None {
            debug!("<= skip write certificate request");
            return Ok(());
        }

        debug!("=> write certificate request");
        let verify_sig_alg = if self.version.has_explicit_sig_alg() {
            // The client must verify with the hash already in use for the
            // suite's MAC family.
            let alg = if info.mac == HashAlgorithm::Sha384 {
                HashAlgorithm::Sha384
            } else {
                HashAlgorithm::Sha256
            };
            self.scratch.verify_sig_alg = alg;
            Some(alg)
        } else {
            None
        };
        let msg = messages::encode_certificate_request(verify_sig_alg, &self.config.ca_subject_dns);
        self.scratch.transcript.update(&msg);
        self.record.write_record(ContentType::Handshake, &msg)?;
        debug!("<= write certificate request");
        Ok(())
    }

    fn write_server_hello_done(&mut self) -> Result<(), TlsError> {
        debug!("=> write server hello done");
        let msg = messages::encode_server_hello_done();
        self.scratch.transcript.update(&msg);
        self.record.write_record(ContentType::Handshake, &msg)?;
        self.state = self.state.next();
        debug!("<= write server hello done");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Client flight
    // -----------------------------------------------------------------------

    fn parse_certificate(&mut self) -> Result<(), TlsError> {
        let info = self.current_suite()?;
        if info.key_exchange.is_psk() || self.config.authmode == Authmode::None {
            debug!("<= skip parse certificate");
            self.state = self.state.next();
            return Ok(());
        }

        debug!("=> parse certificate");
        let rec = self.record.read_record()?;
        if rec.content_type != ContentType::Handshake {
            return Err(TlsError::BadCertificate);
        }
        self.scratch.transcript.update(&rec.payload);

        let (hdr, body) =
            parse_handshake_header(&rec.payload).map_err(|_| TlsError::BadCertificate)?;
        if hdr.msg_type != HandshakeType::Certificate {
            return Err(TlsError::BadCertificate);
        }
        let chain = messages::decode_certificate(body)?;

        if chain.is_empty() {
            if self.config.authmode == Authmode::Required {
                debug!("client certificate required but not provided");
                return Err(TlsError::BadCertificate);
            }
        } else {
            let decoder = self
                .config
                .cert_decoder
                .as_ref()
                .ok_or(TlsError::FeatureUnavailable)?;
            let peer = decoder
                .decode(&chain[0])
                .map_err(|_| TlsError::BadCertificate)?;
            self.session.peer_cert = Some(Arc::new(peer));
        }

        self.state = self.state.next();
        debug!("<= parse certificate");
        Ok(())
    }

    fn parse_client_key_exchange(&mut self) -> Result<(), TlsError> {
        debug!("=> parse client key exchange");

        let rec = self.record.read_record()?;
        if rec.content_type != ContentType::Handshake {
            return Err(TlsError::BadClientKeyExchange);
        }
        self.scratch.transcript.update(&rec.payload);

        let (hdr, body) =
            parse_handshake_header(&rec.payload).map_err(|_| TlsError::BadClientKeyExchange)?;
        if hdr.msg_type != HandshakeType::ClientKeyExchange {
            return Err(TlsError::BadClientKeyExchange);
        }

        let info = self.current_suite()?;
        match info.key_exchange {
            KeyExchange::Rsa => {
                let key = self
                    .config
                    .rsa_key
                    .as_ref()
                    .ok_or(TlsError::PrivateKeyRequired)?;
                let ciphertext =
                    messages::decode_client_key_exchange_rsa(body, self.version, key.len())?;

                // Bleichenbacher countermeasure: prepare a random
                // premaster, keep it on any decrypt or content failure,
                // and let the Finished MAC report the mismatch.
                let mut premaster = vec![0u8; 48];
                self.config
                    .rng
                    .fill(&mut premaster)
                    .map_err(TlsError::Crypto)?;

                if let Ok(plaintext) = key.decrypt(ciphertext) {
                    let max = self.scratch.peer_max_version;
                    let version_ok = plaintext.len() == 48
                        && bool::from(
                            plaintext[0].ct_eq(&max.major) & plaintext[1].ct_eq(&max.minor),
                        );
                    if version_ok {
                        premaster = plaintext;
                    } else {
                        debug!("bad RSA premaster, continuing with random bytes");
                    }
                } else {
                    debug!("bad RSA premaster, continuing with random bytes");
                }
                self.scratch.premaster = premaster;
            }
            KeyExchange::DheRsa => {
                let dh = self.scratch.dh.as_mut().ok_or(TlsError::BadInputData)?;
                let mut r = Reader::new(body);
                let public = messages::decode_client_dh_public(&mut r, dh.modulus_len())?;
                dh.read_public(public)
                    .map_err(|_| TlsError::BadClientKeyExchangeReadPublic)?;
                self.scratch.premaster = dh
                    .compute_secret()
                    .map_err(|_| TlsError::BadClientKeyExchangeComputeSecret)?;
            }
            KeyExchange::EcdheRsa => {
                let ecdh = self.scratch.ecdh.as_mut().ok_or(TlsError::BadInputData)?;
                let point = messages::decode_client_ecdh_public(body, ecdh.field_len())?;
                ecdh.read_public(point)
                    .map_err(|_| TlsError::BadClientKeyExchangeReadPublic)?;
                self.scratch.premaster = ecdh
                    .compute_secret()
                    .map_err(|_| TlsError::BadClientKeyExchangeComputeSecret)?;
            }
            KeyExchange::Psk => {
                let (identity, psk) = self.psk_material()?;
                let mut r = Reader::new(body);
                messages::decode_client_psk_identity(&mut r, &identity)?;
                let other_secret = vec![0u8; psk.len()];
                self.scratch.premaster = messages::build_psk_premaster(&other_secret, &psk);
            }
            KeyExchange::DhePsk => {
                let (identity, psk) = self.psk_material()?;
                let mut r = Reader::new(body);
                messages::decode_client_psk_identity(&mut r, &identity)?;
                let dh = self.scratch.dh.as_mut().ok_or(TlsError::BadInputData)?;
                let public = messages::decode_client_dh_public(&mut r, dh.modulus_len())?;
                dh.read_public(public)
                    .map_err(|_| TlsError::BadClientKeyExchangeReadPublic)?;
                let mut shared = dh
                    .compute_secret()
                    .map_err(|_| TlsError::BadClientKeyExchangeComputeSecret)?;
                self.scratch.premaster = messages::build_psk_premaster(&shared, &psk);
                shared.zeroize();
            }
        }

        self.derive_keys()?;
        self.state = self.state.next();
        debug!("<= parse client key exchange");
        Ok(())
    }

    fn parse_certificate_verify(&mut self) -> Result<(), TlsError> {
        let info = self.current_suite()?;
        let peer = match (info.key_exchange.is_psk(), self.session.peer_cert.clone()) {
            (false, Some(peer)) => peer,
            _ => {
                debug!("<= skip parse certificate verify");
                self.state = self.state.next();
                return Ok(());
            }
        };

        debug!("=> parse certificate verify");

        // The signature covers the transcript up to but excluding this
        // message, so compute the expected digest before folding it.
        let expected = self
            .scratch
            .transcript
            .verify_hash(self.version, self.scratch.verify_sig_alg);

        let rec = self.record.read_record()?;
        if rec.content_type != ContentType::Handshake {
            return Err(TlsError::BadCertificateVerify);
        }
        self.scratch.transcript.update(&rec.payload);

        let (hdr, body) =
            parse_handshake_header(&rec.payload).map_err(|_| TlsError::BadCertificateVerify)?;
        if hdr.msg_type != HandshakeType::CertificateVerify {
            return Err(TlsError::BadCertificateVerify);
        }

        let (hash_alg, signature) = messages::decode_certificate_verify(
            body,
            self.version,
            self.scratch.verify_sig_alg,
            peer.public_key.len(),
        )?;
        peer.public_key
            .verify(hash_alg, &expected, signature)
            .map_err(|_| TlsError::BadCertificateVerify)?;

        self.state = self.state.next();
        debug!("<= parse certificate verify");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // ChangeCipherSpec / Finished
    // -----------------------------------------------------------------------

    fn parse_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        debug!("=> parse change cipher spec");
        let rec = self.record.read_record()?;
        if rec.content_type != ContentType::ChangeCipherSpec || rec.payload != [0x01] {
            return Err(TlsError::BadChangeCipherSpec);
        }
        // CCS is not a handshake message and is never folded into the
        // transcript.
        self.record.change_read_cipher()?;
        self.state = self.state.next();
        debug!("<= parse change cipher spec");
        Ok(())
    }

    fn parse_finished(&mut self) -> Result<(), TlsError> {
        debug!("=> parse finished");
        let info = self.current_suite()?;

        // Expected verify_data excludes the peer's Finished itself.
        let hash = self.scratch.transcript.finished_hash(self.version, info.mac);
        let expected = compute_verify_data(
            self.version,
            info,
            &self.scratch.master_secret,
            "client finished",
            &hash,
        )?;

        let rec = self.record.read_record()?;
        if rec.content_type != ContentType::Handshake {
            return Err(TlsError::BadFinished);
        }
        self.scratch.transcript.update(&rec.payload);

        let (hdr, body) = parse_handshake_header(&rec.payload).map_err(|_| TlsError::BadFinished)?;
        if hdr.msg_type != HandshakeType::Finished {
            return Err(TlsError::BadFinished);
        }
        let verify_data = messages::decode_finished(body)?;
        if verify_data.ct_eq(&expected).unwrap_u8() != 1 {
            debug!("client finished verify_data mismatch");
            return Err(TlsError::BadFinished);
        }

        self.peer_verify_data = expected;
        self.state = if self.scratch.resume {
            // On resumption the server spoke first; the client's Finished
            // ends the exchange.
            ServerHandshakeState::FlushBuffers
        } else {
            self.state.next()
        };
        debug!("<= parse finished");
        Ok(())
    }

    fn write_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        debug!("=> write change cipher spec");
        self.record.write_record(
            ContentType::ChangeCipherSpec,
            &messages::change_cipher_spec_payload(),
        )?;
        self.record.change_write_cipher()?;
        self.state = self.state.next();
        debug!("<= write change cipher spec");
        Ok(())
    }

    fn write_finished(&mut self) -> Result<(), TlsError> {
        debug!("=> write finished");
        let info = self.current_suite()?;

        let hash = self.scratch.transcript.finished_hash(self.version, info.mac);
        let verify_data = compute_verify_data(
            self.version,
            info,
            &self.scratch.master_secret,
            "server finished",
            &hash,
        )?;
        let msg = messages::encode_finished(&verify_data);
        self.scratch.transcript.update(&msg);
        self.own_verify_data = verify_data;
        self.record.write_record(ContentType::Handshake, &msg)?;

        self.state = if self.scratch.resume {
            // Resumption reorders the flights: the client answers with
            // its own CCS + Finished.
            ServerHandshakeState::ClientChangeCipherSpec
        } else {
            self.state.next()
        };
        debug!("<= write finished");
        Ok(())
    }

    fn wrapup(&mut self) -> Result<(), TlsError> {
        debug!("=> handshake wrapup");

        self.session.version = self.version;
        self.session.master_secret = std::mem::take(&mut self.scratch.master_secret);

        if !self.scratch.resume {
            if let Some(cache) = &self.config.session_cache {
                cache.put(&self.session);
            }
        }

        // Wiping the scratch zeroizes the premaster and the randoms and
        // drops the key-exchange contexts. The resume flag survives for
        // the caller to inspect.
        let resume = self.scratch.resume;
        self.scratch.reset();
        self.scratch.resume = resume;

        self.state = ServerHandshakeState::HandshakeOver;
        debug!("<= handshake wrapup");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn current_suite(&self) -> Result<&'static CipherSuiteInfo, TlsError> {
        ciphersuite::from_id(self.session.ciphersuite).ok_or(TlsError::BadInputData)
    }

    fn psk_material(&self) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        match (&self.config.psk_identity, &self.config.psk) {
            (Some(identity), Some(psk)) if !identity.is_empty() && !psk.is_empty() => {
                Ok((identity.clone(), psk.clone()))
            }
            _ => {
                debug!("got no pre-shared key");
                Err(TlsError::PrivateKeyRequired)
            }
        }
    }

    /// Derive the master secret (unless resuming) and the key block, and
    /// hand the keys to the record layer.
    fn derive_keys(&mut self) -> Result<(), TlsError> {
        let info = self.current_suite()?;
        if !self.scratch.resume {
            self.scratch.master_secret = derive_master_secret(
                self.version,
                info,
                &self.scratch.premaster,
                &self.scratch.randbytes,
            )?;
            self.scratch.premaster.zeroize();
            self.scratch.premaster.clear();
        }
        let keys = derive_key_block(
            self.version,
            info,
            &self.scratch.master_secret,
            &self.scratch.randbytes,
        )?;
        self.record.install_keys(info.id, &keys)?;
        Ok(())
    }

    fn send_fatal_handshake_failure(&mut self) -> Result<(), TlsError> {
        self.record
            .send_alert(AlertLevel::Fatal, AlertDescription::HandshakeFailure)?;
        Ok(())
    }
}

/// Server-preference ciphersuite selection.
///
/// A candidate is skipped when the client does not offer it, when it is
/// not defined for the negotiated version, when it is EC-based and no
/// curve was negotiated, or (TLS 1.2) when it needs an RSA signature and
/// the client's signature_algorithms excluded every RSA hash. Returns
/// `Ok(None)` when nothing fits; an unknown suite in the server's own
/// preference list is a configuration error.
pub(crate) fn negotiate_ciphersuite(
    config: &ServerConfig,
    version: ProtocolVersion,
    client_suites: &[u8],
    have_curve: bool,
    have_rsa_sig_hash: bool,
) -> Result<Option<&'static CipherSuiteInfo>, TlsError> {
    for &candidate in config.ciphersuites_for(version.minor) {
        let offered = client_suites
            .chunks_exact(2)
            .any(|pair| pair == candidate.to_be_bytes());
        if !offered {
            continue;
        }
        let info = ciphersuite::from_id(candidate).ok_or(TlsError::BadInputData)?;
        if !info.usable_at(version.minor) {
            continue;
        }
        if info.ec && !have_curve {
            continue;
        }
        if version.has_explicit_sig_alg() && info.key_exchange.is_rsa_signed() && !have_rsa_sig_hash
        {
            continue;
        }
        return Ok(Some(info));
    }
    Ok(None)
}

/// The RFC 5746 policy table: which combinations of phase, signalling
/// status and configured policy abort the handshake.
pub(crate) fn renegotiation_policy_violation(
    renegotiation: RenegotiationPhase,
    secure: SecureRenegotiation,
    policy: LegacyRenegotiation,
    renegotiation_info_seen: bool,
) -> bool {
    use LegacyRenegotiation::*;
    use RenegotiationPhase::*;
    use SecureRenegotiation::*;

    if secure == Legacy && policy == BreakHandshake {
        return true;
    }
    if renegotiation == InProgress && secure == Secure && !renegotiation_info_seen {
        return true;
    }
    if renegotiation == InProgress && secure == Legacy && policy == NoRenegotiation {
        return true;
    }
    if renegotiation == InProgress && secure == Legacy && renegotiation_info_seen {
        return true;
    }
    false
}
