use tls_parser::nom::bytes::complete::take;
use tls_parser::nom::multi::length_data;
use tls_parser::nom::number::complete::{be_u16, be_u24, be_u8};
use tls_parser::nom::IResult;
use tls_parser::{TlsExtensionType, TlsHandshakeType, TlsRecordType};

use crate::fingerprint::grease::strip_grease;
use crate::fingerprint::types::{ClientHelloFields, Extension};

/// TLS record header: content type, version, length.
pub const RECORD_HEADER_LEN: usize = 5;
/// Handshake header: message type, 24-bit length.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

const SERVER_NAME: u16 = TlsExtensionType::ServerName.0;
const SUPPORTED_GROUPS: u16 = TlsExtensionType::SupportedGroups.0;
const EC_POINT_FORMATS: u16 = TlsExtensionType::EcPointFormats.0;
const SIGNATURE_ALGORITHMS: u16 = TlsExtensionType::SignatureAlgorithms.0;
const ALPN: u16 = TlsExtensionType::ApplicationLayerProtocolNegotiation.0;
const SUPPORTED_VERSIONS: u16 = TlsExtensionType::SupportedVersions.0;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("not enough data: need at least {0} bytes")]
    NotEnoughData(usize),
    #[error("not a TLS handshake record (content type 0x{0:02x})")]
    NotHandshake(u8),
    #[error("not a ClientHello message (handshake type 0x{0:02x})")]
    NotClientHello(u8),
    #[error("{0} runs past the end of its enclosing data")]
    Truncated(&'static str),
    #[error("{0} has an odd byte length")]
    OddLength(&'static str),
    #[error("{0} stray bytes after the last extension")]
    TrailingExtensionBytes(usize),
}

/// Parse a complete TLS record holding a ClientHello into `ClientHelloFields`.
///
/// The input starts at the TLS record header, exactly as the assembler
/// hands it over. Every length prefix is checked against the bytes that
/// enclose it; the first violation fails the whole parse.
pub fn parse_client_hello(raw: &[u8]) -> Result<ClientHelloFields, ParseError> {
    if raw.len() < RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN {
        return Err(ParseError::NotEnoughData(
            RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN,
        ));
    }
    if raw[0] != TlsRecordType::Handshake.0 {
        return Err(ParseError::NotHandshake(raw[0]));
    }

    let (rest, msg_type) = field(&raw[RECORD_HEADER_LEN..], "handshake type", be_u8)?;
    if msg_type != TlsHandshakeType::ClientHello.0 {
        return Err(ParseError::NotClientHello(msg_type));
    }
    let (rest, msg_len) = field(rest, "handshake length", be_u24)?;
    let (_, body) = field(rest, "handshake message", take(msg_len as usize))?;

    parse_body(body)
}

fn parse_body(body: &[u8]) -> Result<ClientHelloFields, ParseError> {
    let (rest, legacy_version) = field(body, "client version", be_u16)?;
    let (rest, _random) = field(rest, "random", take(32usize))?;
    let (rest, _session_id) = field(rest, "session id", length_data(be_u8))?;
    let (rest, cipher_bytes) = field(rest, "cipher suites", length_data(be_u16))?;
    let (rest, _compression) = field(rest, "compression methods", length_data(be_u8))?;

    let mut fields = ClientHelloFields {
        legacy_version,
        cipher_suites: u16_list(cipher_bytes, "cipher suites")?,
        ..Default::default()
    };

    // Pre-extension clients stop right after the compression methods.
    if rest.is_empty() {
        return Ok(fields);
    }

    let (_, mut block) = field(rest, "extensions", length_data(be_u16))?;
    while !block.is_empty() {
        if block.len() < 4 {
            return Err(ParseError::TrailingExtensionBytes(block.len()));
        }
        let (next, kind) = field(block, "extension type", be_u16)?;
        let (next, payload) = field(next, "extension payload", length_data(be_u16))?;
        block = next;

        apply_extension(&mut fields, kind, payload)?;
        fields.extensions.push(Extension {
            kind,
            payload: payload.to_vec(),
        });
    }

    Ok(fields)
}

/// Pull the semantic values out of the extensions we understand. Anything
/// else only contributes its type code.
fn apply_extension(
    fields: &mut ClientHelloFields,
    kind: u16,
    payload: &[u8],
) -> Result<(), ParseError> {
    match kind {
        SERVER_NAME => {
            fields.sni_present = true;
            fields.server_name = parse_server_name(payload)?;
        }
        ALPN => {
            fields.alpn_protocols = parse_alpn(payload)?;
        }
        SIGNATURE_ALGORITHMS => {
            let (_, list) = field(payload, "signature_algorithms", length_data(be_u16))?;
            fields.signature_algorithms = u16_list(list, "signature_algorithms")?;
        }
        SUPPORTED_VERSIONS => {
            let (_, list) = field(payload, "supported_versions", length_data(be_u8))?;
            fields.supported_versions = strip_grease(&u16_list(list, "supported_versions")?);
        }
        SUPPORTED_GROUPS => {
            let (_, list) = field(payload, "supported_groups", length_data(be_u16))?;
            fields.supported_groups = u16_list(list, "supported_groups")?;
        }
        EC_POINT_FORMATS => {
            let (_, list) = field(payload, "ec_point_formats", length_data(be_u8))?;
            fields.ec_point_formats = list.to_vec();
        }
        _ => {}
    }
    Ok(())
}

/// server_name: only the first entry of the list is read.
fn parse_server_name(payload: &[u8]) -> Result<Option<String>, ParseError> {
    let (_, list) = field(payload, "server_name list", length_data(be_u16))?;
    if list.is_empty() {
        return Ok(None);
    }
    let (rest, _name_type) = field(list, "server_name type", be_u8)?;
    let (_, name) = field(rest, "server_name", length_data(be_u16))?;
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(name).into_owned()))
}

fn parse_alpn(payload: &[u8]) -> Result<Vec<Vec<u8>>, ParseError> {
    let (_, mut list) = field(payload, "ALPN list", length_data(be_u16))?;
    let mut protocols = Vec::new();
    while !list.is_empty() {
        let (rest, name) = field(list, "ALPN protocol", length_data(be_u8))?;
        protocols.push(name.to_vec());
        list = rest;
    }
    Ok(protocols)
}

/// Read a run of big-endian u16 codes that must fill `bytes` exactly.
fn u16_list(bytes: &[u8], what: &'static str) -> Result<Vec<u16>, ParseError> {
    if bytes.len() % 2 != 0 {
        return Err(ParseError::OddLength(what));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Run one nom parser, naming the field in the error if it runs out of input.
fn field<'a, O, P>(
    input: &'a [u8],
    what: &'static str,
    mut parser: P,
) -> Result<(&'a [u8], O), ParseError>
where
    P: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    parser(input).map_err(|_| ParseError::Truncated(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, HelloBuilder};

    fn chrome_like() -> HelloBuilder {
        HelloBuilder::new()
            .ciphers(&[0x5A5A, 0x1301, 0x1302, 0x1303, 0xC02B])
            .extension(0x3A3A, vec![])
            .sni("example.com")
            .extension(0x0017, vec![])
            .supported_groups(&[0x8A8A, 0x001D, 0x0017])
            .extension(0x000B, vec![0x01, 0x00])
            .signature_algorithms(&[0x0403, 0x0804, 0x0401])
            .alpn(&["h2", "http/1.1"])
            .supported_versions(&[0x7A7A, 0x0304, 0x0303])
            .extension(0x4469, vec![0x00, 0x03, 0x02, 0x68, 0x32])
    }

    #[test]
    fn parses_every_field() {
        let fields = parse_client_hello(&chrome_like().build()).unwrap();

        assert_eq!(fields.legacy_version, 0x0303);
        assert_eq!(fields.cipher_suites, vec![0x5A5A, 0x1301, 0x1302, 0x1303, 0xC02B]);
        assert_eq!(
            fields.extension_types(),
            vec![0x3A3A, 0x0000, 0x0017, 0x000A, 0x000B, 0x000D, 0x0010, 0x002B, 0x4469]
        );
        assert!(fields.sni_present);
        assert_eq!(fields.server_name.as_deref(), Some("example.com"));
        assert_eq!(fields.alpn_names(), vec!["h2", "http/1.1"]);
        assert_eq!(fields.signature_algorithms, vec![0x0403, 0x0804, 0x0401]);
        assert_eq!(fields.supported_versions, vec![0x0304, 0x0303]);
        assert_eq!(fields.supported_groups, vec![0x8A8A, 0x001D, 0x0017]);
        assert_eq!(fields.ec_point_formats, vec![0x00]);
    }

    #[test]
    fn unknown_extension_keeps_type_and_payload() {
        let fields = parse_client_hello(&chrome_like().build()).unwrap();
        let last = fields.extensions.last().unwrap();
        assert_eq!(last.kind, 0x4469);
        assert_eq!(last.payload, vec![0x00, 0x03, 0x02, 0x68, 0x32]);
    }

    #[test]
    fn hello_without_extensions_block() {
        let raw = HelloBuilder::new()
            .legacy_version(0x0301)
            .ciphers(&[0x002F])
            .without_extensions()
            .build();
        let fields = parse_client_hello(&raw).unwrap();
        assert_eq!(fields.legacy_version, 0x0301);
        assert_eq!(fields.cipher_suites, vec![0x002F]);
        assert!(fields.extensions.is_empty());
        assert!(!fields.sni_present);
    }

    #[test]
    fn empty_server_name_list_is_present_without_host() {
        let raw = HelloBuilder::new().extension(0x0000, vec![0x00, 0x00]).build();
        let fields = parse_client_hello(&raw).unwrap();
        assert!(fields.sni_present);
        assert!(fields.server_name.is_none());
    }

    #[test]
    fn only_first_server_name_is_read() {
        let mut payload = fixtures::sni_payload("first.test");
        // Second entry appended inside the same list.
        let extra = [0x00, 0x00, 0x0B, b's', b'e', b'c', b'o', b'n', b'd', b'.', b't', b'e', b's', b't'];
        payload.extend_from_slice(&extra);
        let list_len = (payload.len() - 2) as u16;
        payload[..2].copy_from_slice(&list_len.to_be_bytes());

        let raw = HelloBuilder::new().extension(0x0000, payload).build();
        let fields = parse_client_hello(&raw).unwrap();
        assert_eq!(fields.server_name.as_deref(), Some("first.test"));
    }

    #[test]
    fn rejects_non_handshake_record() {
        let mut raw = chrome_like().build();
        raw[0] = 0x17;
        assert_eq!(parse_client_hello(&raw), Err(ParseError::NotHandshake(0x17)));
    }

    #[test]
    fn rejects_server_hello() {
        let mut raw = chrome_like().build();
        raw[5] = 0x02;
        assert_eq!(parse_client_hello(&raw), Err(ParseError::NotClientHello(0x02)));
    }

    #[test]
    fn rejects_short_input() {
        assert_eq!(
            parse_client_hello(&[0x16, 0x03, 0x01]),
            Err(ParseError::NotEnoughData(9))
        );
    }

    #[test]
    fn rejects_message_longer_than_buffer() {
        let raw = chrome_like().build();
        let cut = &raw[..raw.len() - 1];
        assert_eq!(
            parse_client_hello(cut),
            Err(ParseError::Truncated("handshake message"))
        );
    }

    #[test]
    fn rejects_cipher_length_past_end() {
        let mut body = HelloBuilder::new().ciphers(&[0x1301]).handshake_body();
        // client version (2) + random (32) + session id length byte and its 32 bytes
        let cipher_len_at = 2 + 32 + 1 + 32;
        body[cipher_len_at..cipher_len_at + 2].copy_from_slice(&0xFFF0u16.to_be_bytes());
        let raw = fixtures::wrap_record(0x0301, &body);
        assert_eq!(
            parse_client_hello(&raw),
            Err(ParseError::Truncated("cipher suites"))
        );
    }

    #[test]
    fn rejects_odd_cipher_length() {
        let mut body = HelloBuilder::new().without_extensions().handshake_body();
        let cipher_len_at = 2 + 32 + 1 + 32;
        // Replace the cipher block with three bytes and keep compression intact.
        body.truncate(cipher_len_at);
        body.extend_from_slice(&[0x00, 0x03, 0x13, 0x01, 0x13, 0x01, 0x00]);
        let raw = fixtures::wrap_record(0x0301, &body);
        assert_eq!(
            parse_client_hello(&raw),
            Err(ParseError::OddLength("cipher suites"))
        );
    }

    #[test]
    fn rejects_extension_payload_overrun() {
        let mut body = HelloBuilder::new()
            .extension(0x0017, vec![])
            .handshake_body();
        // Claim a 9-byte payload for the empty extension at the very end.
        let len = body.len();
        body[len - 2..].copy_from_slice(&9u16.to_be_bytes());
        let raw = fixtures::wrap_record(0x0301, &body);
        assert_eq!(
            parse_client_hello(&raw),
            Err(ParseError::Truncated("extension payload"))
        );
    }

    #[test]
    fn rejects_inner_list_overrun() {
        // server_name list claims 0x20 bytes inside a 5-byte payload
        let raw = HelloBuilder::new()
            .extension(0x0000, vec![0x00, 0x20, 0x00, 0x00, 0x00])
            .build();
        assert_eq!(
            parse_client_hello(&raw),
            Err(ParseError::Truncated("server_name list"))
        );

        // ALPN entry longer than the list that holds it
        let raw = HelloBuilder::new()
            .extension(0x0010, vec![0x00, 0x02, 0x05, b'h'])
            .build();
        assert_eq!(
            parse_client_hello(&raw),
            Err(ParseError::Truncated("ALPN protocol"))
        );
    }

    #[test]
    fn rejects_stray_extension_bytes() {
        let mut body = HelloBuilder::new().extension(0x0017, vec![]).handshake_body();
        // Grow the extensions block by two bytes that cannot form a header.
        let ext_len_at = body.len() - 6;
        body[ext_len_at..ext_len_at + 2].copy_from_slice(&6u16.to_be_bytes());
        body.extend_from_slice(&[0xAB, 0xCD]);
        let raw = fixtures::wrap_record(0x0301, &body);
        assert_eq!(
            parse_client_hello(&raw),
            Err(ParseError::TrailingExtensionBytes(2))
        );
    }
}
