//! Passive TLS ClientHello capture and JA4 fingerprinting for honeypot
//! listeners, with a short-lived store that hands each connection's
//! fingerprint to the request logging path.

pub mod capture;
pub mod config;
pub mod fingerprint;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use capture::{CaptureError, ClientHelloCapture, ClientHelloProbe};
pub use config::CaptureConfig;
pub use fingerprint::{compute_ja4, parse_client_hello, ClientHelloFields, Fingerprint};
pub use store::{remote_key, FingerprintStore, StoreStats, Sweeper};
