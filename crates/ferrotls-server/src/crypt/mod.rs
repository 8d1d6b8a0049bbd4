//! Cryptographic collaborator seams.
//!
//! The engine never implements primitive crypto. RSA, DH and ECDH are
//! reached through the traits below, mirroring the function-pointer seams
//! of the original implementation; digests come from a pluggable
//! [`Digest`] provider so the PRF and transcript code is
//! implementation-agnostic.

pub mod key_schedule;
pub mod prf;
pub mod provider;
pub mod transcript;

use ferrotls_types::CryptoError;

/// Hash algorithm identifiers, with their TLS 1.2 wire codes
/// (RFC 5246 §7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum HashAlgorithm {
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
}

/// TLS 1.2 signature algorithm code for RSA (RFC 5246 §7.4.1.4.1).
pub const SIG_RSA: u8 = 1;

impl HashAlgorithm {
    /// Digest output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Convert from the wire code.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(HashAlgorithm::Md5),
            2 => Some(HashAlgorithm::Sha1),
            3 => Some(HashAlgorithm::Sha224),
            4 => Some(HashAlgorithm::Sha256),
            5 => Some(HashAlgorithm::Sha384),
            6 => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }
}

/// Named elliptic curves the engine can negotiate (RFC 4492 §5.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NamedCurve {
    Secp192r1 = 19,
    Secp224r1 = 21,
    Secp256r1 = 23,
    Secp384r1 = 24,
    Secp521r1 = 25,
}

impl NamedCurve {
    /// Convert from the wire code.
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            19 => Some(NamedCurve::Secp192r1),
            21 => Some(NamedCurve::Secp224r1),
            23 => Some(NamedCurve::Secp256r1),
            24 => Some(NamedCurve::Secp384r1),
            25 => Some(NamedCurve::Secp521r1),
            _ => None,
        }
    }

    /// Field element length in bytes.
    pub fn field_len(&self) -> usize {
        match self {
            NamedCurve::Secp192r1 => 24,
            NamedCurve::Secp224r1 => 28,
            NamedCurve::Secp256r1 => 32,
            NamedCurve::Secp384r1 => 48,
            NamedCurve::Secp521r1 => 66,
        }
    }
}

/// EC point encodings from the ec_point_formats extension (RFC 4492 §5.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EcPointFormat {
    #[default]
    Uncompressed = 0,
    AnsiX962CompressedPrime = 1,
    AnsiX962CompressedChar2 = 2,
}

impl EcPointFormat {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(EcPointFormat::Uncompressed),
            1 => Some(EcPointFormat::AnsiX962CompressedPrime),
            2 => Some(EcPointFormat::AnsiX962CompressedChar2),
            _ => None,
        }
    }
}

/// A hash / message digest context.
pub trait Digest: Send {
    /// The output size in bytes.
    fn output_size(&self) -> usize;

    /// The internal block size in bytes.
    fn block_size(&self) -> usize;

    /// Feed data into the hash state.
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and write the digest to `out`, which must hold at
    /// least `output_size()` bytes.
    fn finish(&mut self, out: &mut [u8]);
}

/// A source of cryptographically secure random bytes.
///
/// Caller-provided and possibly shared across sessions; implementations
/// must be re-entrant.
pub trait SecureRandom: Send + Sync {
    fn fill(&self, out: &mut [u8]) -> Result<(), CryptoError>;
}

/// Default RNG backed by the operating system.
#[derive(Debug, Default)]
pub struct SystemRng;

impl SecureRandom for SystemRng {
    fn fill(&self, out: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::getrandom(out).map_err(|_| CryptoError::RandomFailed)
    }
}

/// The server's RSA private key handle.
///
/// `sign` receives the already-computed digest: a 36-byte MD5 || SHA-1
/// concatenation signed without a DigestInfo prefix when `hash_alg` is
/// `None` (TLS ≤ 1.1), or a single digest wrapped in the PKCS#1 v1.5
/// DigestInfo for `Some(alg)` (TLS 1.2).
pub trait RsaServerKey: Send + Sync {
    /// Modulus length in bytes.
    fn len(&self) -> usize;

    fn sign(&self, hash_alg: Option<HashAlgorithm>, hash: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// PKCS#1 v1.5 decryption of an encrypted premaster secret.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// An RSA public key recovered from the peer's certificate.
pub trait RsaPublicKey: Send + Sync {
    /// Modulus length in bytes.
    fn len(&self) -> usize;

    /// PKCS#1 v1.5 verification; `hash_alg` as in [`RsaServerKey::sign`].
    fn verify(
        &self,
        hash_alg: Option<HashAlgorithm>,
        hash: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError>;
}

/// Ephemeral finite-field Diffie-Hellman context for one handshake.
pub trait DhEngine: Send {
    /// Load the group parameters (big-endian P and G).
    fn set_group(&mut self, p: &[u8], g: &[u8]) -> Result<(), CryptoError>;

    /// Generate the ephemeral keypair and return the public value Ys.
    fn make_public(&mut self, rng: &dyn SecureRandom) -> Result<Vec<u8>, CryptoError>;

    /// Byte length of the group modulus.
    fn modulus_len(&self) -> usize;

    /// Import the peer's public value Yc.
    fn read_public(&mut self, public: &[u8]) -> Result<(), CryptoError>;

    /// Compute the shared secret from the imported public value.
    fn compute_secret(&mut self) -> Result<Vec<u8>, CryptoError>;
}

/// Ephemeral elliptic-curve Diffie-Hellman context for one handshake.
pub trait EcdhEngine: Send {
    /// Select the curve.
    fn setup(&mut self, curve: NamedCurve) -> Result<(), CryptoError>;

    /// Generate the ephemeral keypair and return the encoded public point.
    fn make_public(
        &mut self,
        format: EcPointFormat,
        rng: &dyn SecureRandom,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Field element length in bytes for the selected curve.
    fn field_len(&self) -> usize;

    /// Import the peer's public point.
    fn read_public(&mut self, point: &[u8]) -> Result<(), CryptoError>;

    /// Compute the shared secret from the imported point.
    fn compute_secret(&mut self) -> Result<Vec<u8>, CryptoError>;
}
