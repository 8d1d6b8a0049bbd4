//! Default digest provider.
//!
//! Wraps the RustCrypto hash implementations behind the engine's
//! [`Digest`] trait so the PRF and transcript code never names a concrete
//! hash crate.

use md5::Md5;
use sha1::Sha1;
use sha2::digest::{Digest as RustCryptoDigest, FixedOutputReset};
use sha2::{Sha224, Sha256, Sha384, Sha512};

use super::{Digest, HashAlgorithm};

struct HashCtx<D> {
    inner: D,
    block_len: usize,
}

impl<D: RustCryptoDigest + FixedOutputReset + Send> Digest for HashCtx<D> {
    fn output_size(&self) -> usize {
        <D as RustCryptoDigest>::output_size()
    }

    fn block_size(&self) -> usize {
        self.block_len
    }

    fn update(&mut self, data: &[u8]) {
        RustCryptoDigest::update(&mut self.inner, data);
    }

    fn finish(&mut self, out: &mut [u8]) {
        let digest = self.inner.finalize_reset();
        out[..digest.len()].copy_from_slice(&digest);
    }
}

/// Create a digest context for the given algorithm.
pub fn digest_for(alg: HashAlgorithm) -> Box<dyn Digest> {
    match alg {
        HashAlgorithm::Md5 => Box::new(HashCtx {
            inner: Md5::new(),
            block_len: 64,
        }),
        HashAlgorithm::Sha1 => Box::new(HashCtx {
            inner: Sha1::new(),
            block_len: 64,
        }),
        HashAlgorithm::Sha224 => Box::new(HashCtx {
            inner: Sha224::new(),
            block_len: 64,
        }),
        HashAlgorithm::Sha256 => Box::new(HashCtx {
            inner: Sha256::new(),
            block_len: 64,
        }),
        HashAlgorithm::Sha384 => Box::new(HashCtx {
            inner: Sha384::new(),
            block_len: 128,
        }),
        HashAlgorithm::Sha512 => Box::new(HashCtx {
            inner: Sha512::new(),
            block_len: 128,
        }),
    }
}

/// One-shot hash.
pub fn hash(alg: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let mut ctx = digest_for(alg);
    ctx.update(data);
    let mut out = vec![0u8; ctx.output_size()];
    ctx.finish(&mut out);
    out
}
