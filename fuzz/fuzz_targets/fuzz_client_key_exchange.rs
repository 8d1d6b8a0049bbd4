#![no_main]
use libfuzzer_sys::fuzz_target;

use ferrotls_server::handshake::codec::Reader;
use ferrotls_server::handshake::messages;
use ferrotls_server::ProtocolVersion;

fuzz_target!(|data: &[u8]| {
    let _ = messages::decode_client_key_exchange_rsa(data, ProtocolVersion::TLS1_2, 256);
    let _ = messages::decode_client_key_exchange_rsa(data, ProtocolVersion::SSL3, 256);
    let _ = messages::decode_client_ecdh_public(data, 32);
    let mut r = Reader::new(data);
    let _ = messages::decode_client_dh_public(&mut r, 256);
    let mut r = Reader::new(data);
    let _ = messages::decode_client_psk_identity(&mut r, b"identity");
    let _ = messages::decode_certificate(data);
});
