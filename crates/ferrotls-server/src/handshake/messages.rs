//! Handshake message encoding and decoding.
//!
//! Byte layouts follow RFC 2246/4346/5246, RFC 4492 (ECC), RFC 4279 (PSK)
//! and RFC 5246 Appendix E.2 (SSLv2-compatible ClientHello). Builders
//! return complete handshake messages (4-byte header included); decoders
//! take the body after the header unless noted.

use ferrotls_types::TlsError;

use crate::crypt::key_schedule::VERIFY_DATA_LEN;
use crate::crypt::{HashAlgorithm, NamedCurve, SIG_RSA};
use crate::session::Compression;
use crate::ProtocolVersion;

use super::codec::{wrap_handshake, Reader};
use super::extensions_codec::ext_id;
use super::HandshakeType;

/// rsa_sign certificate type for CertificateRequest (RFC 5246 §7.4.4).
const CERT_TYPE_RSA_SIGN: u8 = 1;

/// CertificateRequest stops growing once the DN list would push the body
/// past this many bytes.
const MAX_CERT_REQUEST_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// ClientHello
// ---------------------------------------------------------------------------

/// A decoded modern ClientHello body.
#[derive(Debug)]
pub struct ClientHello<'a> {
    /// The client's maximum supported version.
    pub max_version: ProtocolVersion,
    /// The 32-byte client random.
    pub random: &'a [u8],
    pub session_id: &'a [u8],
    /// Raw ciphersuite list, 2 bytes per entry.
    pub ciphersuites: &'a [u8],
    /// Raw compression method list, 1 byte per entry.
    pub compressions: &'a [u8],
    /// (id, body) pairs in wire order.
    pub extensions: Vec<(u16, &'a [u8])>,
}

/// Decode a ClientHello body (after the 4-byte handshake header).
///
/// Enforces the length-sum law: the session id, ciphersuite, compression
/// and extension vectors must tile the body exactly.
pub fn decode_client_hello(body: &[u8]) -> Result<ClientHello<'_>, TlsError> {
    let bad = |_| TlsError::BadClientHello;
    let mut r = Reader::new(body);

    let major = r.u8().map_err(bad)?;
    let minor = r.u8().map_err(bad)?;
    if major != 3 {
        return Err(TlsError::BadClientHello);
    }

    let random = r.take(32).map_err(bad)?;

    let session_id = r.vec8().map_err(bad)?;
    if session_id.len() > 32 {
        return Err(TlsError::BadClientHello);
    }

    let ciphersuites = r.vec16().map_err(bad)?;
    if ciphersuites.len() < 2 || ciphersuites.len() > 256 || ciphersuites.len() % 2 != 0 {
        return Err(TlsError::BadClientHello);
    }

    let compressions = r.vec8().map_err(bad)?;
    if compressions.is_empty() || compressions.len() > 16 {
        return Err(TlsError::BadClientHello);
    }

    let mut extensions = Vec::new();
    if !r.is_empty() {
        let ext_len = r.u16().map_err(bad)? as usize;
        if ext_len != r.remaining() {
            return Err(TlsError::BadClientHello);
        }
        // Each header is 4 bytes; 1..3 trailing bytes cannot form one.
        while !r.is_empty() {
            let id = r.u16().map_err(bad)?;
            let data = r.vec16().map_err(bad)?;
            extensions.push((id, data));
        }
    }

    Ok(ClientHello {
        max_version: ProtocolVersion::new(major, minor),
        random,
        session_id,
        ciphersuites,
        compressions,
        extensions,
    })
}

/// A decoded SSLv2-compatible ClientHello (RFC 5246 Appendix E.2).
#[derive(Debug)]
pub struct ClientHelloV2<'a> {
    pub max_version: ProtocolVersion,
    /// Raw ciphersuite list, 3 bytes per entry.
    pub ciphersuites: &'a [u8],
    pub session_id: &'a [u8],
    /// 8..=32 challenge bytes.
    pub challenge: &'a [u8],
}

/// Decode an SSLv2-compatible ClientHello.
///
/// `msg` starts at the message-type byte (after the 2-byte record
/// length); the three list lengths must tile the message exactly.
pub fn decode_client_hello_v2(msg: &[u8]) -> Result<ClientHelloV2<'_>, TlsError> {
    let bad = |_| TlsError::BadClientHello;
    let mut r = Reader::new(msg);

    let msg_type = r.u8().map_err(bad)?;
    let major = r.u8().map_err(bad)?;
    let minor = r.u8().map_err(bad)?;
    if msg_type != HandshakeType::ClientHello as u8 || major != 3 {
        return Err(TlsError::BadClientHello);
    }

    let ciph_len = r.u16().map_err(bad)? as usize;
    let sess_len = r.u16().map_err(bad)? as usize;
    let chal_len = r.u16().map_err(bad)? as usize;

    if ciph_len < 3 || ciph_len % 3 != 0 {
        return Err(TlsError::BadClientHello);
    }
    if sess_len > 32 {
        return Err(TlsError::BadClientHello);
    }
    if chal_len < 8 || chal_len > 32 {
        return Err(TlsError::BadClientHello);
    }

    let ciphersuites = r.take(ciph_len).map_err(bad)?;
    let session_id = r.take(sess_len).map_err(bad)?;
    let challenge = r.take(chal_len).map_err(bad)?;
    if !r.is_empty() {
        return Err(TlsError::BadClientHello);
    }

    Ok(ClientHelloV2 {
        max_version: ProtocolVersion::new(major, minor),
        ciphersuites,
        session_id,
        challenge,
    })
}

// ---------------------------------------------------------------------------
// Server flight
// ---------------------------------------------------------------------------

/// ServerHello fields.
pub struct ServerHello<'a> {
    pub version: ProtocolVersion,
    /// The 32-byte server random (timestamp || 28 random bytes).
    pub random: &'a [u8; 32],
    pub session_id: &'a [u8],
    pub ciphersuite: u16,
    pub compression: Compression,
    /// renegotiation_info extension body, present when secure
    /// renegotiation is active.
    pub renegotiation_info: Option<Vec<u8>>,
}

/// Encode a ServerHello as a complete handshake message.
pub fn encode_server_hello(sh: &ServerHello<'_>) -> Vec<u8> {
    let mut body = Vec::with_capacity(40 + sh.session_id.len());
    body.push(sh.version.major);
    body.push(sh.version.minor);
    body.extend_from_slice(sh.random);
    body.push(sh.session_id.len() as u8);
    body.extend_from_slice(sh.session_id);
    body.extend_from_slice(&sh.ciphersuite.to_be_bytes());
    body.push(sh.compression as u8);

    if let Some(ref reneg) = sh.renegotiation_info {
        let ext_len = 4 + reneg.len();
        body.extend_from_slice(&(ext_len as u16).to_be_bytes());
        body.extend_from_slice(&ext_id::RENEGOTIATION_INFO.to_be_bytes());
        body.extend_from_slice(&(reneg.len() as u16).to_be_bytes());
        body.extend_from_slice(reneg);
    }

    wrap_handshake(HandshakeType::ServerHello, &body)
}

/// Encode a Certificate message from a DER chain (leaf first).
pub fn encode_certificate(chain: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = chain.iter().map(|c| 3 + c.len()).sum();
    let mut body = Vec::with_capacity(3 + total);
    body.push((total >> 16) as u8);
    body.push((total >> 8) as u8);
    body.push(total as u8);
    for cert in chain {
        let len = cert.len();
        body.push((len >> 16) as u8);
        body.push((len >> 8) as u8);
        body.push(len as u8);
        body.extend_from_slice(cert);
    }
    wrap_handshake(HandshakeType::Certificate, &body)
}

/// Decode a Certificate body into DER blobs (leaf first).
pub fn decode_certificate(body: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let bad = |_| TlsError::BadCertificate;
    let mut r = Reader::new(body);
    let total = r.u24().map_err(bad)? as usize;
    if total != r.remaining() {
        return Err(TlsError::BadCertificate);
    }
    let mut certs = Vec::new();
    while !r.is_empty() {
        let len = r.u24().map_err(bad)? as usize;
        certs.push(r.take(len).map_err(bad)?.to_vec());
    }
    Ok(certs)
}

/// Ephemeral DH parameters in ServerKeyExchange order:
/// dh_p, dh_g and dh_Ys, each with a 16-bit length (RFC 5246 §7.4.3).
pub fn build_dh_params(p: &[u8], g: &[u8], ys: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + p.len() + g.len() + ys.len());
    for field in [p, g, ys] {
        out.extend_from_slice(&(field.len() as u16).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}

/// Ephemeral ECDH parameters: named-curve ECParameters followed by the
/// server's public point (RFC 4492 §5.4).
pub fn build_ecdh_params(curve: NamedCurve, point: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + point.len());
    out.push(3); // curve_type = named_curve
    out.extend_from_slice(&(curve as u16).to_be_bytes());
    out.push(point.len() as u8);
    out.extend_from_slice(point);
    out
}

/// Signature trailer of an RSA-signed ServerKeyExchange.
pub struct SkeSignature<'a> {
    /// The TLS 1.2 SignatureAndHashAlgorithm prefix; absent for ≤ 1.1.
    pub sig_alg: Option<HashAlgorithm>,
    pub signature: &'a [u8],
}

/// Encode a ServerKeyExchange message.
///
/// PSK families prepend a 2-byte zero-length identity hint; RSA-signed
/// families append the signature trailer.
pub fn encode_server_key_exchange(
    psk_hint: bool,
    params: &[u8],
    signature: Option<SkeSignature<'_>>,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + params.len() + 260);
    if psk_hint {
        body.extend_from_slice(&[0x00, 0x00]);
    }
    body.extend_from_slice(params);
    if let Some(sig) = signature {
        if let Some(alg) = sig.sig_alg {
            body.push(alg as u8);
            body.push(SIG_RSA);
        }
        body.extend_from_slice(&(sig.signature.len() as u16).to_be_bytes());
        body.extend_from_slice(sig.signature);
    }
    wrap_handshake(HandshakeType::ServerKeyExchange, &body)
}

/// Encode a CertificateRequest message.
///
/// `verify_sig_alg` is the single supported-signature pair advertised in
/// TLS 1.2; `ca_subject_dns` supplies the DN list, truncated once the
/// body would exceed 4096 bytes.
pub fn encode_certificate_request(
    verify_sig_alg: Option<HashAlgorithm>,
    ca_subject_dns: &[Vec<u8>],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(8);
    body.push(1); // one certificate type
    body.push(CERT_TYPE_RSA_SIGN);

    if let Some(alg) = verify_sig_alg {
        body.extend_from_slice(&[0x00, 0x02]);
        body.push(alg as u8);
        body.push(SIG_RSA);
    }

    let dn_list_at = body.len();
    body.extend_from_slice(&[0x00, 0x00]);
    let mut total_dn = 0usize;
    for dn in ca_subject_dns {
        if body.len() + 2 + dn.len() > MAX_CERT_REQUEST_LEN {
            break;
        }
        body.extend_from_slice(&(dn.len() as u16).to_be_bytes());
        body.extend_from_slice(dn);
        total_dn += 2 + dn.len();
    }
    body[dn_list_at] = (total_dn >> 8) as u8;
    body[dn_list_at + 1] = total_dn as u8;

    wrap_handshake(HandshakeType::CertificateRequest, &body)
}

/// Encode a ServerHelloDone message (empty body).
pub fn encode_server_hello_done() -> Vec<u8> {
    wrap_handshake(HandshakeType::ServerHelloDone, &[])
}

/// Encode a HelloRequest message (empty body).
pub fn encode_hello_request() -> Vec<u8> {
    wrap_handshake(HandshakeType::HelloRequest, &[])
}

// ---------------------------------------------------------------------------
// Client flight
// ---------------------------------------------------------------------------

/// Decode an RSA ClientKeyExchange body and return the encrypted
/// premaster.
///
/// TLS carries a 16-bit length that must equal the server's modulus
/// size; SSLv3 carries the bare ciphertext.
pub fn decode_client_key_exchange_rsa<'a>(
    body: &'a [u8],
    version: ProtocolVersion,
    rsa_len: usize,
) -> Result<&'a [u8], TlsError> {
    let bad = |_| TlsError::BadClientKeyExchange;
    let mut r = Reader::new(body);
    if version.has_length_prefixed_pms() {
        let len = r.u16().map_err(bad)? as usize;
        if len != rsa_len {
            return Err(TlsError::BadClientKeyExchange);
        }
    }
    let ciphertext = r.take(rsa_len).map_err(bad)?;
    if !r.is_empty() {
        return Err(TlsError::BadClientKeyExchange);
    }
    Ok(ciphertext)
}

/// Read a client DH public value: 16-bit length, 1..=modulus_len bytes.
///
/// Reader-based so DHE-PSK can parse the identity first.
pub fn decode_client_dh_public<'a>(
    r: &mut Reader<'a>,
    modulus_len: usize,
) -> Result<&'a [u8], TlsError> {
    let n = r.u16().map_err(|_| TlsError::BadClientKeyExchange)? as usize;
    if n < 1 || n > modulus_len {
        return Err(TlsError::BadClientKeyExchange);
    }
    r.take(n).map_err(|_| TlsError::BadClientKeyExchange)
}

/// Decode an ECDH ClientKeyExchange body and return the point bytes.
///
/// The body is an 8-bit-length-prefixed ECPoint that must fill the body
/// exactly and fit in `2 * field_len + 2` bytes.
pub fn decode_client_ecdh_public<'a>(
    body: &'a [u8],
    field_len: usize,
) -> Result<&'a [u8], TlsError> {
    if body.is_empty() || body.len() > 2 * field_len + 2 {
        return Err(TlsError::BadClientKeyExchange);
    }
    let point_len = body[0] as usize;
    if point_len == 0 || body.len() != 1 + point_len {
        return Err(TlsError::BadClientKeyExchange);
    }
    Ok(&body[1..])
}

/// Read and check a client PSK identity against the configured one.
pub fn decode_client_psk_identity(r: &mut Reader<'_>, expected: &[u8]) -> Result<(), TlsError> {
    let n = r.u16().map_err(|_| TlsError::BadClientKeyExchange)? as usize;
    if n < 1 {
        return Err(TlsError::BadClientKeyExchange);
    }
    let identity = r.take(n).map_err(|_| TlsError::BadClientKeyExchange)?;
    if identity != expected {
        return Err(TlsError::BadClientKeyExchange);
    }
    Ok(())
}

/// premaster = other_secret_len(2) || other_secret ||
///             psk_len(2) || psk                       (RFC 4279 §2)
///
/// `other_secret` is `psk_len` zero bytes for plain PSK and the DH shared
/// secret Z for DHE-PSK.
pub fn build_psk_premaster(other_secret: &[u8], psk: &[u8]) -> Vec<u8> {
    let mut pms = Vec::with_capacity(4 + other_secret.len() + psk.len());
    pms.extend_from_slice(&(other_secret.len() as u16).to_be_bytes());
    pms.extend_from_slice(other_secret);
    pms.extend_from_slice(&(psk.len() as u16).to_be_bytes());
    pms.extend_from_slice(psk);
    pms
}

/// Decode a CertificateVerify body.
///
/// Returns the hash the signature covers (`None` = the 36-byte MD5+SHA-1
/// pair of TLS ≤ 1.1) and the signature bytes. In TLS 1.2 the leading
/// SignatureAndHashAlgorithm must match what the server requested.
pub fn decode_certificate_verify<'a>(
    body: &'a [u8],
    version: ProtocolVersion,
    requested_sig_alg: HashAlgorithm,
    peer_rsa_len: usize,
) -> Result<(Option<HashAlgorithm>, &'a [u8]), TlsError> {
    let bad = |_| TlsError::BadCertificateVerify;
    let mut r = Reader::new(body);

    let hash_alg = if version.has_explicit_sig_alg() {
        let hash = r.u8().map_err(bad)?;
        let sig = r.u8().map_err(bad)?;
        if hash != requested_sig_alg as u8 || sig != SIG_RSA {
            return Err(TlsError::BadCertificateVerify);
        }
        Some(requested_sig_alg)
    } else {
        None
    };

    let sig_len = r.u16().map_err(bad)? as usize;
    if sig_len != peer_rsa_len {
        return Err(TlsError::BadCertificateVerify);
    }
    let signature = r.take(sig_len).map_err(bad)?;
    if !r.is_empty() {
        return Err(TlsError::BadCertificateVerify);
    }
    Ok((hash_alg, signature))
}

// ---------------------------------------------------------------------------
// Finished / ChangeCipherSpec
// ---------------------------------------------------------------------------

/// Encode a Finished message from verify_data.
pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

/// Decode a Finished body (12-byte verify_data).
pub fn decode_finished(body: &[u8]) -> Result<&[u8], TlsError> {
    if body.len() != VERIFY_DATA_LEN {
        return Err(TlsError::BadFinished);
    }
    Ok(body)
}

/// The one-byte ChangeCipherSpec payload.
pub fn change_cipher_spec_payload() -> Vec<u8> {
    vec![0x01]
}
