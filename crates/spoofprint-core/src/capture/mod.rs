//! Passive ClientHello capture on a connection's read path.

pub mod assembler;
pub mod stream;

use std::sync::Arc;

use thiserror::Error;

use crate::fingerprint::{compute_ja4, parse_client_hello, Fingerprint, ParseError};

pub use assembler::{AbortReason, Feed, HandshakeAssembler};
pub use stream::ClientHelloCapture;

/// The two ways capture fails for a connection. Both are reported to the
/// operator log only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture aborted: {0}")]
    Transport(#[from] AbortReason),
    #[error("ClientHello parse failed: {0}")]
    Parse(#[from] ParseError),
}

pub type CaptureResult = Result<Arc<Fingerprint>, CaptureError>;

/// Assembler → parser → JA4, evaluated at most once per connection.
#[derive(Debug, Default)]
pub struct ClientHelloProbe {
    assembler: HandshakeAssembler,
    outcome: Option<CaptureResult>,
}

impl ClientHelloProbe {
    pub fn new(max_record_len: usize) -> Self {
        Self {
            assembler: HandshakeAssembler::new(max_record_len),
            outcome: None,
        }
    }

    /// Feed bytes the connection just read. Returns the outcome on the
    /// call that settles it, `None` before and after.
    pub fn observe(&mut self, chunk: &[u8]) -> Option<&CaptureResult> {
        if self.outcome.is_some() {
            return None;
        }

        let outcome = match self.assembler.feed(chunk) {
            Ok(Feed::Complete(message)) => parse_client_hello(&message)
                .map(|fields| Arc::new(compute_ja4(&fields)))
                .map_err(CaptureError::from),
            Ok(Feed::Buffering | Feed::Skipped) => return None,
            Err(reason) => Err(reason.into()),
        };
        self.outcome = Some(outcome);
        self.outcome.as_ref()
    }

    pub fn outcome(&self) -> Option<&CaptureResult> {
        self.outcome.as_ref()
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn fingerprint(&self) -> Option<&Arc<Fingerprint>> {
        self.outcome.as_ref().and_then(|o| o.as_ref().ok())
    }
}
