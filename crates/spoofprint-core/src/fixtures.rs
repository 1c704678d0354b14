//! Byte-level ClientHello builder shared by the unit tests.

/// Builds a single-record ClientHello with full control over cipher and
/// extension wire order.
#[derive(Clone)]
pub(crate) struct HelloBuilder {
    record_version: u16,
    legacy_version: u16,
    ciphers: Vec<u16>,
    extensions: Vec<(u16, Vec<u8>)>,
    with_extensions: bool,
}

impl HelloBuilder {
    pub(crate) fn new() -> Self {
        Self {
            record_version: 0x0301,
            legacy_version: 0x0303,
            ciphers: Vec::new(),
            extensions: Vec::new(),
            with_extensions: true,
        }
    }

    pub(crate) fn legacy_version(mut self, version: u16) -> Self {
        self.legacy_version = version;
        self
    }

    pub(crate) fn ciphers(mut self, ciphers: &[u16]) -> Self {
        self.ciphers = ciphers.to_vec();
        self
    }

    pub(crate) fn extension(mut self, kind: u16, payload: Vec<u8>) -> Self {
        self.extensions.push((kind, payload));
        self
    }

    pub(crate) fn without_extensions(mut self) -> Self {
        self.with_extensions = false;
        self
    }

    pub(crate) fn sni(self, host: &str) -> Self {
        self.extension(0x0000, sni_payload(host))
    }

    pub(crate) fn alpn(self, protocols: &[&str]) -> Self {
        let mut list = Vec::new();
        for p in protocols {
            list.push(p.len() as u8);
            list.extend_from_slice(p.as_bytes());
        }
        self.extension(0x0010, prefixed_u16(&list))
    }

    pub(crate) fn signature_algorithms(self, schemes: &[u16]) -> Self {
        self.extension(0x000D, prefixed_u16(&codes(schemes)))
    }

    pub(crate) fn supported_groups(self, groups: &[u16]) -> Self {
        self.extension(0x000A, prefixed_u16(&codes(groups)))
    }

    pub(crate) fn supported_versions(self, versions: &[u16]) -> Self {
        let list = codes(versions);
        let mut payload = vec![list.len() as u8];
        payload.extend_from_slice(&list);
        self.extension(0x002B, payload)
    }

    /// The ClientHello body, without handshake or record headers.
    pub(crate) fn handshake_body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.legacy_version.to_be_bytes());
        body.extend_from_slice(&[0x11; 32]);
        body.push(32);
        body.extend_from_slice(&[0x22; 32]);
        body.extend_from_slice(&prefixed_u16(&codes(&self.ciphers)));
        body.extend_from_slice(&[0x01, 0x00]);

        if self.with_extensions {
            let mut block = Vec::new();
            for (kind, payload) in &self.extensions {
                block.extend_from_slice(&kind.to_be_bytes());
                block.extend_from_slice(&prefixed_u16(payload));
            }
            body.extend_from_slice(&prefixed_u16(&block));
        }
        body
    }

    /// The full TLS record: record header, handshake header, body.
    pub(crate) fn build(&self) -> Vec<u8> {
        wrap_record(self.record_version, &self.handshake_body())
    }
}

/// Wrap a ClientHello body in its handshake and record headers.
pub(crate) fn wrap_record(record_version: u16, body: &[u8]) -> Vec<u8> {
    let msg_len = body.len() as u32;
    let record_len = (body.len() + 4) as u16;

    let mut raw = vec![0x16];
    raw.extend_from_slice(&record_version.to_be_bytes());
    raw.extend_from_slice(&record_len.to_be_bytes());
    raw.push(0x01);
    raw.extend_from_slice(&msg_len.to_be_bytes()[1..]);
    raw.extend_from_slice(body);
    raw
}

pub(crate) fn sni_payload(host: &str) -> Vec<u8> {
    let mut entry = vec![0x00];
    entry.extend_from_slice(&(host.len() as u16).to_be_bytes());
    entry.extend_from_slice(host.as_bytes());
    prefixed_u16(&entry)
}

fn codes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn prefixed_u16(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}
