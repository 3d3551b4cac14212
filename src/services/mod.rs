//! Service layer module root.
//! Contains the cryptographic validators the pipelines orchestrate.

pub mod archive_chain;
pub mod cert_path;
pub mod content_checks;
pub mod timestamp_token;

pub use archive_chain::ArchiveTimestampChainValidator;
pub use cert_path::{CertPathError, CertificatePathValidator, PathCheck, PathPolicy};
pub use timestamp_token::{TimestampTokenValidator, TokenFinding, TokenItem, TokenValidation};
