use std::fmt;

use serde::Serialize;

/// One extension as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Extension type code (GREASE included)
    pub kind: u16,
    /// Extension payload, without the type/length header
    pub payload: Vec<u8>,
}

/// Decoded ClientHello, produced once per connection from the first
/// complete handshake message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHelloFields {
    /// Legacy `client_version` field (e.g., 0x0303)
    pub legacy_version: u16,
    /// Cipher suite codes in wire order, GREASE included
    pub cipher_suites: Vec<u16>,
    /// Extensions in wire order, GREASE included
    pub extensions: Vec<Extension>,
    /// Whether a server_name extension was sent at all
    pub sni_present: bool,
    /// First host name from server_name (0x0000)
    pub server_name: Option<String>,
    /// ALPN protocol names (0x0010), wire order
    pub alpn_protocols: Vec<Vec<u8>>,
    /// supported_versions (0x002b), GREASE removed
    pub supported_versions: Vec<u16>,
    /// signature_algorithms (0x000d), wire order
    pub signature_algorithms: Vec<u16>,
    /// supported_groups (0x000a)
    pub supported_groups: Vec<u16>,
    /// ec_point_formats (0x000b)
    pub ec_point_formats: Vec<u8>,
}

impl ClientHelloFields {
    /// Extension type codes in wire order.
    pub fn extension_types(&self) -> Vec<u16> {
        self.extensions.iter().map(|e| e.kind).collect()
    }

    /// ALPN names for display; invalid UTF-8 is replaced.
    pub fn alpn_names(&self) -> Vec<String> {
        self.alpn_protocols
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }
}

/// A JA4 client fingerprint plus the attributes the request log stores
/// alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    /// `part_a + "_" + part_b + "_" + part_c`
    pub ja4: String,
    pub part_a: String,
    pub part_b: String,
    pub part_c: String,
    /// JA4_r: part A followed by the unhashed inputs of parts B and C
    pub readable: String,
    /// Two-character version code, e.g. "13"
    pub version: &'static str,
    /// 'd' when SNI was sent, 'i' otherwise
    pub sni_flag: char,
    /// GREASE-filtered cipher count (uncapped)
    pub cipher_count: usize,
    /// GREASE-filtered extension count, SNI and ALPN included (uncapped)
    pub extension_count: usize,
    /// Two-character ALPN marker from part A
    pub alpn_marker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ja4)
    }
}
