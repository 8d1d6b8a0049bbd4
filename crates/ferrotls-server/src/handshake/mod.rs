//! Server handshake state machine and message codecs.

pub mod codec;
pub mod extensions_codec;
pub mod messages;
pub mod server;

/// Handshake message types (RFC 5246 §7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(HandshakeType::HelloRequest),
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            11 => Some(HandshakeType::Certificate),
            12 => Some(HandshakeType::ServerKeyExchange),
            13 => Some(HandshakeType::CertificateRequest),
            14 => Some(HandshakeType::ServerHelloDone),
            15 => Some(HandshakeType::CertificateVerify),
            16 => Some(HandshakeType::ClientKeyExchange),
            20 => Some(HandshakeType::Finished),
            _ => None,
        }
    }
}

/// The server's position in the handshake flight ordering.
///
/// States advance monotonically; the only way back to `ClientHello` is a
/// new handshake (renegotiation), which resets the transcript. The
/// resumption shortcut jumps from `ServerHello` directly to
/// `ServerChangeCipherSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerHandshakeState {
    HelloRequest,
    ClientHello,
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    ClientCertificate,
    ClientKeyExchange,
    CertificateVerify,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    FlushBuffers,
    HandshakeWrapup,
    HandshakeOver,
}

impl ServerHandshakeState {
    /// The next state in flight order.
    pub fn next(self) -> Self {
        use ServerHandshakeState::*;
        match self {
            HelloRequest => ClientHello,
            ClientHello => ServerHello,
            ServerHello => ServerCertificate,
            ServerCertificate => ServerKeyExchange,
            ServerKeyExchange => CertificateRequest,
            CertificateRequest => ServerHelloDone,
            ServerHelloDone => ClientCertificate,
            ClientCertificate => ClientKeyExchange,
            ClientKeyExchange => CertificateVerify,
            CertificateVerify => ClientChangeCipherSpec,
            ClientChangeCipherSpec => ClientFinished,
            ClientFinished => ServerChangeCipherSpec,
            ServerChangeCipherSpec => ServerFinished,
            ServerFinished => FlushBuffers,
            FlushBuffers => HandshakeWrapup,
            HandshakeWrapup => HandshakeOver,
            HandshakeOver => HandshakeOver,
        }
    }
}
