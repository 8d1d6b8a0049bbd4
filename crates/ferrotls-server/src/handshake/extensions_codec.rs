//! ClientHello extension parsers.
//!
//! Each parser operates on one extension body and returns parsed data;
//! policy (SNI verdicts, renegotiation comparisons, curve capability) is
//! applied by the state machine. Every framing violation is
//! `BadClientHello`.

use ferrotls_types::TlsError;

use crate::crypt::{EcPointFormat, HashAlgorithm, NamedCurve, SIG_RSA};

use super::codec::Reader;

/// Extension identifiers (IANA TLS ExtensionType registry).
pub mod ext_id {
    pub const SERVER_NAME: u16 = 0;
    pub const SUPPORTED_GROUPS: u16 = 10;
    pub const EC_POINT_FORMATS: u16 = 11;
    pub const SIGNATURE_ALGORITHMS: u16 = 13;
    pub const RENEGOTIATION_INFO: u16 = 0xFF01;
}

/// server_name name type for DNS hostnames (RFC 6066 §3).
const NAME_TYPE_HOST_NAME: u8 = 0;

/// Parse `server_name` and return the first host_name entry, if any.
///
/// Format: name_list_length(2) || (name_type(1) || name_length(2) || name)*
pub fn parse_server_name(data: &[u8]) -> Result<Option<&[u8]>, TlsError> {
    let mut r = Reader::new(data);
    let list_len = r.u16().map_err(|_| TlsError::BadClientHello)? as usize;
    if list_len != r.remaining() {
        return Err(TlsError::BadClientHello);
    }
    while !r.is_empty() {
        let name_type = r.u8().map_err(|_| TlsError::BadClientHello)?;
        let name = r.vec16().map_err(|_| TlsError::BadClientHello)?;
        if name_type == NAME_TYPE_HOST_NAME {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

/// Parse `renegotiation_info` and return the renegotiated_connection
/// bytes. The state machine decides whether they are acceptable.
///
/// Format: renegotiated_connection_length(1) || renegotiated_connection
pub fn parse_renegotiation_info(data: &[u8]) -> Result<&[u8], TlsError> {
    let mut r = Reader::new(data);
    let connection = r.vec8().map_err(|_| TlsError::BadClientHello)?;
    if !r.is_empty() {
        return Err(TlsError::BadClientHello);
    }
    Ok(connection)
}

/// Build the renegotiation_info extension body for ServerHello:
/// client_verify_data || server_verify_data behind a 1-byte length
/// (RFC 5746 §3.7). Both slices are empty on the initial handshake.
pub fn build_renegotiation_info(
    client_verify_data: &[u8],
    server_verify_data: &[u8],
) -> Vec<u8> {
    let total = client_verify_data.len() + server_verify_data.len();
    let mut data = Vec::with_capacity(1 + total);
    data.push(total as u8);
    data.extend_from_slice(client_verify_data);
    data.extend_from_slice(server_verify_data);
    data
}

/// Parse `signature_algorithms` and choose the hash for ServerKeyExchange
/// signatures: the first pair (client order) with signature = RSA and a
/// hash this engine implements.
///
/// Format: list_length(2) || (hash(1) || signature(1))*
pub fn parse_signature_algorithms(data: &[u8]) -> Result<Option<HashAlgorithm>, TlsError> {
    let mut r = Reader::new(data);
    let list_len = r.u16().map_err(|_| TlsError::BadClientHello)? as usize;
    if list_len != r.remaining() || list_len % 2 != 0 {
        return Err(TlsError::BadClientHello);
    }
    while !r.is_empty() {
        let hash = r.u8().map_err(|_| TlsError::BadClientHello)?;
        let sig = r.u8().map_err(|_| TlsError::BadClientHello)?;
        if sig != SIG_RSA {
            continue;
        }
        if let Some(alg) = HashAlgorithm::from_u8(hash) {
            return Ok(Some(alg));
        }
    }
    Ok(None)
}

/// Parse `supported_groups` (formerly elliptic_curves) and choose the
/// first curve this engine knows, in the client's order.
///
/// Format: list_length(2) || curve(2)*
pub fn parse_supported_groups(data: &[u8]) -> Result<Option<NamedCurve>, TlsError> {
    let mut r = Reader::new(data);
    let list_len = r.u16().map_err(|_| TlsError::BadClientHello)? as usize;
    if list_len != r.remaining() || list_len % 2 != 0 {
        return Err(TlsError::BadClientHello);
    }
    while !r.is_empty() {
        let id = r.u16().map_err(|_| TlsError::BadClientHello)?;
        if let Some(curve) = NamedCurve::from_u16(id) {
            return Ok(Some(curve));
        }
    }
    Ok(None)
}

/// Parse `ec_point_formats` and choose the first format this engine
/// knows. The list starts at offset 1, after the 1-byte length.
///
/// Format: list_length(1) || format(1)*
pub fn parse_supported_point_formats(data: &[u8]) -> Result<Option<EcPointFormat>, TlsError> {
    let mut r = Reader::new(data);
    let list = r.vec8().map_err(|_| TlsError::BadClientHello)?;
    if !r.is_empty() {
        return Err(TlsError::BadClientHello);
    }
    Ok(list.iter().find_map(|&b| EcPointFormat::from_u8(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_name_first_hostname_wins() {
        // list: host_name "a.example", then host_name "b.example"
        let mut data = vec![0x00, 0x18];
        data.extend_from_slice(&[0, 0x00, 0x09]);
        data.extend_from_slice(b"a.example");
        data.extend_from_slice(&[0, 0x00, 0x09]);
        data.extend_from_slice(b"b.example");
        assert_eq!(parse_server_name(&data).unwrap(), Some(&b"a.example"[..]));
    }

    #[test]
    fn test_server_name_skips_unknown_name_types() {
        let mut data = vec![0x00, 0x0A];
        data.extend_from_slice(&[7, 0x00, 0x02, 0xAA, 0xBB]); // unknown type
        data.extend_from_slice(&[0, 0x00, 0x02]);
        data.extend_from_slice(b"hi");
        assert_eq!(parse_server_name(&data).unwrap(), Some(&b"hi"[..]));
    }

    #[test]
    fn test_server_name_list_length_must_match() {
        let data = vec![0x00, 0x09, 0, 0x00, 0x02, b'h', b'i'];
        assert!(matches!(
            parse_server_name(&data),
            Err(TlsError::BadClientHello)
        ));
    }

    #[test]
    fn test_server_name_truncated_entry() {
        let data = vec![0x00, 0x05, 0, 0x00, 0x09, b'h', b'i'];
        assert!(parse_server_name(&data).is_err());
    }

    #[test]
    fn test_renegotiation_info_empty_and_filled() {
        assert_eq!(parse_renegotiation_info(&[0x00]).unwrap(), &[] as &[u8]);
        assert_eq!(
            parse_renegotiation_info(&[0x02, 0xAA, 0xBB]).unwrap(),
            &[0xAA, 0xBB]
        );
    }

    #[test]
    fn test_renegotiation_info_rejects_slack_and_truncation() {
        assert!(parse_renegotiation_info(&[]).is_err());
        assert!(parse_renegotiation_info(&[0x01]).is_err());
        assert!(parse_renegotiation_info(&[0x00, 0xFF]).is_err());
    }

    #[test]
    fn test_build_renegotiation_info_layout() {
        assert_eq!(build_renegotiation_info(&[], &[]), vec![0x00]);
        let data = build_renegotiation_info(&[1; 12], &[2; 12]);
        assert_eq!(data[0], 24);
        assert_eq!(&data[1..13], &[1; 12]);
        assert_eq!(&data[13..25], &[2; 12]);
    }

    #[test]
    fn test_signature_algorithms_first_rsa_pair_wins() {
        // (sha256, ecdsa) skipped; (sha384, rsa) chosen over (sha512, rsa)
        let data = vec![0x00, 0x06, 4, 3, 5, 1, 6, 1];
        assert_eq!(
            parse_signature_algorithms(&data).unwrap(),
            Some(HashAlgorithm::Sha384)
        );
    }

    #[test]
    fn test_signature_algorithms_none_for_rsa() {
        // only ECDSA pairs
        let data = vec![0x00, 0x04, 4, 3, 5, 3];
        assert_eq!(parse_signature_algorithms(&data).unwrap(), None);
    }

    #[test]
    fn test_signature_algorithms_unknown_hash_skipped() {
        let data = vec![0x00, 0x04, 9, 1, 2, 1];
        assert_eq!(
            parse_signature_algorithms(&data).unwrap(),
            Some(HashAlgorithm::Sha1)
        );
    }

    #[test]
    fn test_signature_algorithms_odd_length_rejected() {
        let data = vec![0x00, 0x03, 4, 1, 2];
        assert!(parse_signature_algorithms(&data).is_err());
    }

    #[test]
    fn test_supported_groups_first_known_curve() {
        // x25519 (29) unknown to this engine, then secp384r1
        let data = vec![0x00, 0x04, 0x00, 29, 0x00, 24];
        assert_eq!(
            parse_supported_groups(&data).unwrap(),
            Some(NamedCurve::Secp384r1)
        );
    }

    #[test]
    fn test_supported_groups_none_known() {
        let data = vec![0x00, 0x02, 0x00, 29];
        assert_eq!(parse_supported_groups(&data).unwrap(), None);
    }

    #[test]
    fn test_supported_groups_length_mismatch() {
        let data = vec![0x00, 0x04, 0x00, 23];
        assert!(parse_supported_groups(&data).is_err());
    }

    #[test]
    fn test_point_formats_reads_from_offset_one() {
        // length 2, formats: compressed_prime then uncompressed
        let data = vec![0x02, 0x01, 0x00];
        assert_eq!(
            parse_supported_point_formats(&data).unwrap(),
            Some(EcPointFormat::AnsiX962CompressedPrime)
        );
    }

    #[test]
    fn test_point_formats_skips_unknown() {
        let data = vec![0x02, 0x07, 0x00];
        assert_eq!(
            parse_supported_point_formats(&data).unwrap(),
            Some(EcPointFormat::Uncompressed)
        );
    }

    #[test]
    fn test_point_formats_length_must_match() {
        assert!(parse_supported_point_formats(&[0x02, 0x00]).is_err());
        assert!(parse_supported_point_formats(&[0x01, 0x00, 0x00]).is_err());
    }
}
