use tls_parser::{parse_tls_record_header, TlsHandshakeType, TlsRecordType, TlsVersion};
use tracing::debug;

use crate::fingerprint::clienthello::{HANDSHAKE_HEADER_LEN, RECORD_HEADER_LEN};

/// TLS caps plaintext records at 2^14 bytes.
pub const DEFAULT_MAX_RECORD_LEN: usize = 16 * 1024;

/// Why capture was given up for a connection. None of these touch the
/// bytes the real handshake sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("record type 0x{0:02x} is not a handshake")]
    NotHandshake(u8),
    #[error("unknown TLS record version 0x{0:04x}")]
    UnknownVersion(u16),
    #[error("handshake type 0x{0:02x} is not a ClientHello")]
    NotClientHello(u8),
    #[error("ClientHello of {message} bytes does not fit its {record}-byte record")]
    SpansRecords { message: usize, record: usize },
    #[error("record length {len} exceeds the {max}-byte limit")]
    RecordTooLarge { len: usize, max: usize },
}

/// Outcome of feeding one chunk through the assembler.
#[derive(Debug, PartialEq, Eq)]
pub enum Feed {
    /// The ClientHello record is complete and trimmed to its declared length.
    Complete(Vec<u8>),
    /// Chunk was buffered; message is not yet complete.
    Buffering,
    /// Capture already finished or was aborted; chunk ignored.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Collecting,
    Done,
    Aborted,
}

/// Accumulates one connection's first bytes until a complete ClientHello
/// is available for parsing.
#[derive(Debug)]
pub struct HandshakeAssembler {
    /// Accumulated bytes, starting at the record header.
    data: Vec<u8>,
    /// Record length from the record header, once seen.
    record_len: Option<usize>,
    /// Total bytes needed: both headers + ClientHello length.
    expected_len: Option<usize>,
    state: State,
    max_record_len: usize,
}

impl Default for HandshakeAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_LEN)
    }
}

impl HandshakeAssembler {
    pub fn new(max_record_len: usize) -> Self {
        Self {
            data: Vec::new(),
            record_len: None,
            expected_len: None,
            state: State::Collecting,
            max_record_len,
        }
    }

    /// Append the next chunk read from the connection.
    ///
    /// Returns `Feed::Complete(data)` exactly once, when the full ClientHello
    /// has arrived. Surplus bytes from the same chunk belong to whatever
    /// follows the handshake and are never part of `data`. A header that
    /// fails validation aborts capture for good.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Feed, AbortReason> {
        if self.state != State::Collecting {
            return Ok(Feed::Skipped);
        }

        match self.expected_len {
            Some(expected) => {
                let wanted = (expected - self.data.len()).min(chunk.len());
                self.data.extend_from_slice(&chunk[..wanted]);
            }
            None => self.data.extend_from_slice(chunk),
        }

        if self.expected_len.is_none() {
            if let Err(reason) = self.read_headers() {
                self.state = State::Aborted;
                self.data = Vec::new();
                return Err(reason);
            }
        }

        match self.expected_len {
            Some(expected) if self.data.len() >= expected => {
                if self.data.len() > expected {
                    debug!(
                        "Trimming buffered handshake from {} to {} bytes",
                        self.data.len(),
                        expected
                    );
                    self.data.truncate(expected);
                }
                self.state = State::Done;
                Ok(Feed::Complete(std::mem::take(&mut self.data)))
            }
            expected => {
                debug!(
                    "Buffering ClientHello: {}/{} bytes",
                    self.data.len(),
                    expected.map_or_else(|| "?".to_string(), |n| n.to_string())
                );
                Ok(Feed::Buffering)
            }
        }
    }

    /// Validate whichever headers are fully buffered and derive the
    /// expected message length once both are known.
    fn read_headers(&mut self) -> Result<(), AbortReason> {
        if self.record_len.is_none() && self.data.len() >= RECORD_HEADER_LEN {
            let hdr = match parse_tls_record_header(&self.data) {
                Ok((_, hdr)) => hdr,
                Err(_) => return Ok(()),
            };
            if hdr.record_type != TlsRecordType::Handshake {
                return Err(AbortReason::NotHandshake(hdr.record_type.0));
            }
            if !(TlsVersion::Ssl30.0..=TlsVersion::Tls13.0).contains(&hdr.version.0) {
                return Err(AbortReason::UnknownVersion(hdr.version.0));
            }
            let len = hdr.len as usize;
            if len > self.max_record_len {
                return Err(AbortReason::RecordTooLarge {
                    len,
                    max: self.max_record_len,
                });
            }
            self.record_len = Some(len);
        }

        let record = match self.record_len {
            Some(record) => record,
            None => return Ok(()),
        };
        if self.data.len() < RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN {
            return Ok(());
        }

        let msg_type = self.data[RECORD_HEADER_LEN];
        if msg_type != TlsHandshakeType::ClientHello.0 {
            return Err(AbortReason::NotClientHello(msg_type));
        }
        let message = u32::from_be_bytes([0, self.data[6], self.data[7], self.data[8]]) as usize;
        if HANDSHAKE_HEADER_LEN + message > record {
            return Err(AbortReason::SpansRecords { message, record });
        }
        self.expected_len = Some(RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN + message);
        Ok(())
    }

    /// Bytes buffered so far (empty once complete or aborted).
    pub fn buffered(&self) -> usize {
        self.data.len()
    }

    pub fn expected_len(&self) -> Option<usize> {
        self.expected_len
    }

    pub fn is_collecting(&self) -> bool {
        self.state == State::Collecting
    }

    pub fn is_aborted(&self) -> bool {
        self.state == State::Aborted
    }
}
