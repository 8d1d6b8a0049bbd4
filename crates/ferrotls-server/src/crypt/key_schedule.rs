//! Master secret, key block and Finished verify_data derivation
//! (RFC 2246/4346/5246 §6.3, §7.4.9).

use ferrotls_types::TlsError;
use zeroize::Zeroize;

use super::prf::prf;
use crate::ciphersuite::CipherSuiteInfo;
use crate::ProtocolVersion;

/// Length of the master secret.
pub const MASTER_SECRET_LEN: usize = 48;

/// Length of a TLS Finished verify_data field.
pub const VERIFY_DATA_LEN: usize = 12;

/// The record-protection keys produced by key expansion, in the key-block
/// order of RFC 5246 §6.3.
pub struct KeyBlock {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl Drop for KeyBlock {
    fn drop(&mut self) {
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

/// master_secret = PRF(premaster, "master secret",
///                     client_random || server_random)[0..48]
///
/// `randbytes` is the 64-byte client_random || server_random pair.
pub fn derive_master_secret(
    version: ProtocolVersion,
    suite: &CipherSuiteInfo,
    premaster: &[u8],
    randbytes: &[u8; 64],
) -> Result<Vec<u8>, TlsError> {
    prf(
        version,
        suite.mac,
        premaster,
        "master secret",
        randbytes,
        MASTER_SECRET_LEN,
    )
}

/// key_block = PRF(master_secret, "key expansion",
///                 server_random || client_random)
pub fn derive_key_block(
    version: ProtocolVersion,
    suite: &CipherSuiteInfo,
    master_secret: &[u8],
    randbytes: &[u8; 64],
) -> Result<KeyBlock, TlsError> {
    // Key expansion swaps the randoms relative to master-secret derivation.
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(&randbytes[32..]);
    seed[32..].copy_from_slice(&randbytes[..32]);

    let mac_len = suite.mac_len();
    let total = 2 * mac_len + 2 * suite.key_len + 2 * suite.iv_len;
    let mut block = prf(
        version,
        suite.mac,
        master_secret,
        "key expansion",
        &seed,
        total,
    )?;

    let mut at = 0;
    let mut take = |n: usize| {
        let part = block[at..at + n].to_vec();
        at += n;
        part
    };

    let keys = KeyBlock {
        client_write_mac_key: take(mac_len),
        server_write_mac_key: take(mac_len),
        client_write_key: take(suite.key_len),
        server_write_key: take(suite.key_len),
        client_write_iv: take(suite.iv_len),
        server_write_iv: take(suite.iv_len),
    };
    block.zeroize();
    Ok(keys)
}

/// verify_data = PRF(master_secret, label, handshake_hash)[0..12]
///
/// `handshake_hash` is [`crate::crypt::transcript::Transcript::finished_hash`]
/// for the negotiated version, and `label` is "client finished" or
/// "server finished".
pub fn compute_verify_data(
    version: ProtocolVersion,
    suite: &CipherSuiteInfo,
    master_secret: &[u8],
    label: &str,
    handshake_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    prf(
        version,
        suite.mac,
        master_secret,
        label,
        handshake_hash,
        VERIFY_DATA_LEN,
    )
}
