/// Record-layer status codes.
///
/// `WouldBlock` is the retryable status: the transport could not make
/// progress and the caller should re-invoke the handshake driver once the
/// transport is ready again. Every other variant is terminal.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("transport would block, retry")]
    WouldBlock,
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("record layer error: {0}")]
    Io(String),
}

impl RecordError {
    /// Whether the operation can be retried after the transport unblocks.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecordError::WouldBlock)
    }
}

/// Failures reported by the pluggable cryptographic collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid argument")]
    InvalidArg,
    #[error("peer public value rejected")]
    BadPublicValue,
    #[error("signing failed")]
    SignFailed,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("signature verification failed")]
    VerifyFailed,
    #[error("random generation failed")]
    RandomFailed,
    #[error("algorithm not supported")]
    NotSupported,
}

/// Handshake engine errors.
///
/// Every parse/build step returns exactly one of these; the one-step
/// driver propagates them verbatim. `Record(RecordError::WouldBlock)` is
/// the only retryable outcome.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("bad client hello message")]
    BadClientHello,
    #[error("negotiated protocol version below configured minimum")]
    BadProtocolVersion,
    #[error("bad client key exchange message")]
    BadClientKeyExchange,
    #[error("client key exchange: peer public value rejected")]
    BadClientKeyExchangeReadPublic,
    #[error("client key exchange: shared secret computation failed")]
    BadClientKeyExchangeComputeSecret,
    #[error("bad certificate message")]
    BadCertificate,
    #[error("bad certificate verify message")]
    BadCertificateVerify,
    #[error("bad change cipher spec message")]
    BadChangeCipherSpec,
    #[error("bad finished message")]
    BadFinished,
    #[error("no ciphersuite in common")]
    NoCipherChosen,
    #[error("private key or pre-shared key required but not configured")]
    PrivateKeyRequired,
    #[error("negotiated parameters require a disabled feature")]
    FeatureUnavailable,
    #[error("bad input data")]
    BadInputData,
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl TlsError {
    /// Whether the driver may be re-invoked after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TlsError::Record(e) if e.is_retryable())
    }
}
