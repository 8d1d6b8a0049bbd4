//! Handshake transcript accumulator.
//!
//! Every handshake byte the peer sends and the server sends (HelloRequest
//! excepted) is folded here in exact wire order. Uses a message buffer +
//! replay approach: intermediate hashes are computed by replaying the
//! buffer into a fresh digest, so the accumulator itself is never
//! finalized.

use zeroize::Zeroize;

use super::provider::digest_for;
use super::HashAlgorithm;
use crate::ProtocolVersion;

/// Running transcript over all handshake messages of one negotiation.
pub struct Transcript {
    buffer: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Fold handshake bytes in wire order.
    pub fn update(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Restart the transcript for a new handshake (renegotiation).
    pub fn reset(&mut self) {
        self.buffer.zeroize();
        self.buffer.clear();
    }

    /// Hash the transcript with a single algorithm.
    pub fn hash(&self, alg: HashAlgorithm) -> Vec<u8> {
        let mut ctx = digest_for(alg);
        ctx.update(&self.buffer);
        let mut out = vec![0u8; ctx.output_size()];
        ctx.finish(&mut out);
        out
    }

    /// The 36-byte MD5 || SHA-1 transcript digest used by TLS ≤ 1.1.
    pub fn md5_sha1(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..16].copy_from_slice(&self.hash(HashAlgorithm::Md5));
        out[16..].copy_from_slice(&self.hash(HashAlgorithm::Sha1));
        out
    }

    /// The digest fed to the Finished PRF for the negotiated version.
    ///
    /// `mac` is the suite's MAC hash (selects the TLS 1.2 PRF hash).
    pub fn finished_hash(&self, version: ProtocolVersion, mac: HashAlgorithm) -> Vec<u8> {
        if version.minor >= 3 {
            let prf_hash = if mac == HashAlgorithm::Sha384 {
                HashAlgorithm::Sha384
            } else {
                HashAlgorithm::Sha256
            };
            self.hash(prf_hash)
        } else {
            self.md5_sha1().to_vec()
        }
    }

    /// The digest a CertificateVerify signature covers.
    ///
    /// TLS 1.2 hashes with the algorithm the server requested in
    /// CertificateRequest; earlier versions use the fixed 36-byte pair.
    pub fn verify_hash(&self, version: ProtocolVersion, verify_sig_alg: HashAlgorithm) -> Vec<u8> {
        if version.minor >= 3 {
            self.hash(verify_sig_alg)
        } else {
            self.md5_sha1().to_vec()
        }
    }

    /// Bytes folded so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transcript {
    fn drop(&mut self) {
        self.buffer.zeroize();
    }
}
