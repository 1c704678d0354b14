use std::time::Duration;

use thiserror::Error;

use crate::capture::assembler::DEFAULT_MAX_RECORD_LEN;
use crate::fingerprint::clienthello::HANDSHAKE_HEADER_LEN;

/// How long a captured fingerprint stays available to the request path.
pub const DEFAULT_FINGERPRINT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("fingerprint TTL must be greater than zero")]
    ZeroTtl,
    #[error("max record length {0} is outside {min}..={max}", min = HANDSHAKE_HEADER_LEN, max = u16::MAX)]
    RecordLimit(usize),
}

/// Tunables for ClientHello capture and fingerprint correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Lifetime of a correlation entry; the sweeper runs every half of it.
    pub fingerprint_ttl: Duration,
    /// Largest TLS record length the assembler agrees to buffer.
    pub max_record_len: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fingerprint_ttl: DEFAULT_FINGERPRINT_TTL,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fingerprint_ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if !(HANDSHAKE_HEADER_LEN..=u16::MAX as usize).contains(&self.max_record_len) {
            return Err(ConfigError::RecordLimit(self.max_record_len));
        }
        Ok(())
    }
}
