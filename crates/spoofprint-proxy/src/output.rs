use serde::Serialize;

use spoofprint_core::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable block per connection
    Text,
    /// NDJSON, one object per line
    Json,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    remote: &'a str,
    captured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ja4: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ja4_r: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls_version: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sni: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cipher_suites: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<usize>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    alpn: &'a [String],
}

/// Report the fingerprint the request path found for `remote`, if any.
pub fn print_lookup(
    remote: &str,
    fingerprint: Option<&Fingerprint>,
    format: OutputFormat,
    verbose: bool,
) {
    match format {
        OutputFormat::Text => print_text(remote, fingerprint, verbose),
        OutputFormat::Json => print_json(remote, fingerprint, verbose),
    }
}

fn print_text(remote: &str, fingerprint: Option<&Fingerprint>, verbose: bool) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Remote:     {}", remote);
    match fingerprint {
        Some(fp) => {
            println!(
                "  SNI:        {}",
                fp.server_name.as_deref().unwrap_or("(none)")
            );
            println!("  TLS ver:    {}", fp.version);
            println!("  Ciphers:    {} suites", fp.cipher_count);
            println!("  Extensions: {} types", fp.extension_count);
            if !fp.alpn.is_empty() {
                println!("  ALPN:       {}", fp.alpn.join(", "));
            }
            println!("  ──────────────────────────────────────────────────");
            println!("  JA4:        {}", fp.ja4);
            if verbose {
                println!("  JA4_r:      {}", fp.readable);
            }
        }
        None => println!("  JA4:        (no TLS ClientHello)"),
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
}

fn json_record<'a>(
    remote: &'a str,
    fingerprint: Option<&'a Fingerprint>,
    verbose: bool,
) -> JsonRecord<'a> {
    JsonRecord {
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        remote,
        captured: fingerprint.is_some(),
        ja4: fingerprint.map(|fp| fp.ja4.as_str()),
        ja4_r: fingerprint
            .filter(|_| verbose)
            .map(|fp| fp.readable.as_str()),
        tls_version: fingerprint.map(|fp| fp.version),
        sni: fingerprint.and_then(|fp| fp.server_name.as_deref()),
        cipher_suites: fingerprint.map(|fp| fp.cipher_count),
        extensions: fingerprint.map(|fp| fp.extension_count),
        alpn: fingerprint.map(|fp| fp.alpn.as_slice()).unwrap_or_default(),
    }
}

fn print_json(remote: &str, fingerprint: Option<&Fingerprint>, verbose: bool) {
    match serde_json::to_string(&json_record(remote, fingerprint, verbose)) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to encode record for {}: {}", remote, e),
    }
}
