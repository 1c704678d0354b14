use sha2::{Digest, Sha256};

use crate::fingerprint::grease::strip_grease;
use crate::fingerprint::types::{ClientHelloFields, Fingerprint};

/// Transport tag for TLS over TCP. `q` (QUIC) and `d` (DTLS) are reserved
/// by JA4 and not produced here.
pub const TCP_TRANSPORT: char = 't';

/// Hash sentinel for an empty part B or part C.
pub const EMPTY_HASH: &str = "000000000000";

const SNI_EXT: u16 = 0x0000;
const ALPN_EXT: u16 = 0x0010;

/// GREASE-free view of the lists JA4 counts, sorts and hashes. Built once
/// per fingerprint so every part sees the same filtered values.
struct Filtered<'a> {
    ciphers: Vec<u16>,
    extensions: Vec<u16>,
    supported_versions: Vec<u16>,
    fields: &'a ClientHelloFields,
}

impl<'a> Filtered<'a> {
    fn new(fields: &'a ClientHelloFields) -> Self {
        Self {
            ciphers: strip_grease(&fields.cipher_suites),
            extensions: strip_grease(&fields.extension_types()),
            supported_versions: strip_grease(&fields.supported_versions),
            fields,
        }
    }
}

/// Compute the JA4 fingerprint from a parsed ClientHello.
///
/// JA4 format: `{part_a}_{part_b}_{part_c}`
///
/// Part A: `t{ver}{sni}{cipher_count:02}{ext_count:02}{alpn}`
/// Part B: sorted cipher suites as 4-char hex → SHA256 truncated to 12 chars
/// Part C: sorted extensions (excl. SNI+ALPN) + sig_algs → SHA256 truncated to 12 chars
pub fn compute_ja4(fields: &ClientHelloFields) -> Fingerprint {
    let view = Filtered::new(fields);

    let version = version_code(resolve_version(&view));
    let sni_flag = if fields.sni_present { 'd' } else { 'i' };
    let alpn_marker = alpn_marker(&fields.alpn_protocols);

    let part_a = format!(
        "{}{}{}{:02}{:02}{}",
        TCP_TRANSPORT,
        version,
        sni_flag,
        view.ciphers.len().min(99),
        view.extensions.len().min(99),
        alpn_marker
    );
    let (part_b, raw_b) = compute_part_b(&view);
    let (part_c, raw_c) = compute_part_c(&view);

    Fingerprint {
        ja4: format!("{}_{}_{}", part_a, part_b, part_c),
        readable: format!("{}_{}_{}", part_a, raw_b, raw_c),
        part_a,
        part_b,
        part_c,
        version,
        sni_flag,
        cipher_count: view.ciphers.len(),
        extension_count: view.extensions.len(),
        alpn_marker,
        server_name: fields.server_name.clone(),
        alpn: fields.alpn_names(),
    }
}

/// Part B: sorted cipher suites → SHA256 truncated to 12 chars
///
/// Returns (hash, raw_string)
fn compute_part_b(view: &Filtered<'_>) -> (String, String) {
    let mut ciphers = view.ciphers.clone();
    ciphers.sort_unstable();

    if ciphers.is_empty() {
        return (EMPTY_HASH.to_string(), String::new());
    }

    let raw = hex_list(&ciphers);
    (truncated_sha256(&raw, 12), raw)
}

/// Part C: sorted extensions (excluding SNI and ALPN) + signature
/// algorithms in wire order.
///
/// Returns (hash, raw_string)
fn compute_part_c(view: &Filtered<'_>) -> (String, String) {
    let mut exts: Vec<u16> = view
        .extensions
        .iter()
        .copied()
        .filter(|e| *e != SNI_EXT && *e != ALPN_EXT)
        .collect();
    exts.sort_unstable();

    let sig_algs = &view.fields.signature_algorithms;
    if exts.is_empty() && sig_algs.is_empty() {
        return (EMPTY_HASH.to_string(), String::new());
    }

    let mut raw = hex_list(&exts);
    if !sig_algs.is_empty() {
        raw.push('_');
        raw.push_str(&hex_list(sig_algs));
    }

    (truncated_sha256(&raw, 12), raw)
}

/// Highest non-GREASE supported_versions entry, else the legacy version.
fn resolve_version(view: &Filtered<'_>) -> u16 {
    view.supported_versions
        .iter()
        .copied()
        .max()
        .unwrap_or(view.fields.legacy_version)
}

/// Two-character JA4 version code.
pub fn version_code(version: u16) -> &'static str {
    match version {
        0x0304 => "13",
        0x0303 => "12",
        0x0302 => "11",
        0x0301 => "10",
        0x0300 => "s3",
        0xfeff => "d1",
        0xfefd => "d2",
        0xfefc => "d3",
        _ => "00",
    }
}

/// First and last character of the first ALPN value, "00" when there is
/// none, "99" when either character is not printable ASCII.
fn alpn_marker(protocols: &[Vec<u8>]) -> String {
    let name = match protocols.first() {
        Some(name) if !name.is_empty() => name,
        _ => return "00".to_string(),
    };
    let (first, last) = (name[0], name[name.len() - 1]);
    if first.is_ascii_graphic() && last.is_ascii_graphic() {
        format!("{}{}", first as char, last as char)
    } else {
        "99".to_string()
    }
}

fn hex_list(values: &[u16]) -> String {
    values
        .iter()
        .map(|v| format!("{:04x}", v))
        .collect::<Vec<_>>()
        .join(",")
}

/// SHA256 hash, lowercase hex, truncated to `len` characters.
fn truncated_sha256(input: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let full = hex::encode(hasher.finalize());
    full[..len].to_string()
}
