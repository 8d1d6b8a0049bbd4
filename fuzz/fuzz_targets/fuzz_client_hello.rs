#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Both ClientHello shapes plus the extension-body parsers.
    let _ = ferrotls_server::handshake::messages::decode_client_hello(data);
    let _ = ferrotls_server::handshake::messages::decode_client_hello_v2(data);
    let _ = ferrotls_server::handshake::extensions_codec::parse_server_name(data);
    let _ = ferrotls_server::handshake::extensions_codec::parse_renegotiation_info(data);
    let _ = ferrotls_server::handshake::extensions_codec::parse_signature_algorithms(data);
    let _ = ferrotls_server::handshake::extensions_codec::parse_supported_groups(data);
    let _ = ferrotls_server::handshake::extensions_codec::parse_supported_point_formats(data);
});
