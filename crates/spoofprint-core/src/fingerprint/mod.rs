//! ClientHello decoding and JA4 fingerprint generation.

pub mod clienthello;
pub mod grease;
pub mod ja4;
pub mod types;

pub use clienthello::{parse_client_hello, ParseError};
pub use ja4::compute_ja4;
pub use types::{ClientHelloFields, Extension, Fingerprint};
