//! TLS pseudo-random functions.
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                        HMAC_hash(secret, A(2) + seed) || ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```
//!
//! TLS 1.0/1.1 (RFC 2246 §5) split the secret and XOR P_MD5 with P_SHA1;
//! TLS 1.2 (RFC 5246 §5) uses a single P_hash with the ciphersuite's PRF
//! hash (SHA-256 unless the suite's MAC is SHA-384).

use ferrotls_types::TlsError;
use zeroize::Zeroize;

use super::provider::digest_for;
use super::HashAlgorithm;
use crate::ProtocolVersion;

/// HMAC with the given hash over the default digest provider (RFC 2104).
pub fn hmac(alg: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
    let block_len = digest_for(alg).block_size();

    // Keys longer than a block are hashed first.
    let mut key_block = vec![0u8; block_len];
    if key.len() > block_len {
        let mut ctx = digest_for(alg);
        ctx.update(key);
        ctx.finish(&mut key_block[..alg.output_len()]);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut ipad = vec![0u8; block_len];
    let mut opad = vec![0u8; block_len];
    for i in 0..block_len {
        ipad[i] = key_block[i] ^ 0x36;
        opad[i] = key_block[i] ^ 0x5C;
    }

    let mut inner = digest_for(alg);
    inner.update(&ipad);
    inner.update(data);
    let mut inner_out = vec![0u8; alg.output_len()];
    inner.finish(&mut inner_out);

    let mut outer = digest_for(alg);
    outer.update(&opad);
    outer.update(&inner_out);
    let mut out = vec![0u8; alg.output_len()];
    outer.finish(&mut out);

    key_block.zeroize();
    ipad.zeroize();
    opad.zeroize();

    out
}

/// P_hash expansion function.
fn p_hash(alg: HashAlgorithm, secret: &[u8], seed: &[u8], output_len: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(output_len);

    // A(0) = seed
    let mut a = seed.to_vec();

    while result.len() < output_len {
        a = hmac(alg, secret, &a);

        let mut a_seed = Vec::with_capacity(a.len() + seed.len());
        a_seed.extend_from_slice(&a);
        a_seed.extend_from_slice(seed);
        let block = hmac(alg, secret, &a_seed);

        result.extend_from_slice(&block);
    }

    result.truncate(output_len);
    result
}

/// The version-appropriate PRF.
///
/// `mac` is the negotiated suite's MAC hash; it only influences the
/// TLS 1.2 PRF hash choice. SSLv3 key derivation is not implemented.
pub fn prf(
    version: ProtocolVersion,
    mac: HashAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    match version.minor {
        0 => Err(TlsError::FeatureUnavailable),
        1 | 2 => {
            // S1 and S2 each cover half the secret, overlapping by one
            // byte when the length is odd (RFC 2246 §5).
            let half = (secret.len() + 1) / 2;
            let s1 = &secret[..half];
            let s2 = &secret[secret.len() - half..];

            let mut out = p_hash(HashAlgorithm::Md5, s1, &label_seed, output_len);
            let sha = p_hash(HashAlgorithm::Sha1, s2, &label_seed, output_len);
            for (o, s) in out.iter_mut().zip(sha.iter()) {
                *o ^= s;
            }
            Ok(out)
        }
        _ => {
            let prf_hash = if mac == HashAlgorithm::Sha384 {
                HashAlgorithm::Sha384
            } else {
                HashAlgorithm::Sha256
            };
            Ok(p_hash(prf_hash, secret, &label_seed, output_len))
        }
    }
}
