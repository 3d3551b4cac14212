//! Verification engine for electronically signed medical documents.
//!
//! Prescriptions and dispensing records carry XAdES-profile XML signatures;
//! this crate takes the evidence an XML layer has already extracted (raw
//! certificates, timestamp tokens, precomputed digests) and verifies it:
//! reference digests, signature values, signing certificates with full path
//! validation, RFC 3161 signature timestamps and archive timestamp chains.
//!
//! Outcomes are values, never panics or errors: every check contributes
//! [`VerificationResultItem`]s with a status of VALID, INDETERMINATE or
//! INVALID, and aggregation always takes the worst status.
//!
//! ```no_run
//! use medsig_verify::{DocumentVerifier, VerifierConfig};
//! # fn load_document() -> medsig_verify::domain::DocumentData { unimplemented!() }
//!
//! let config = VerifierConfig::default();
//! let document = load_document();
//! let result = DocumentVerifier::new(&config).verify(&document);
//! for finding in result.failures() {
//!     eprintln!("{finding}");
//! }
//! ```

pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use domain::report::{VerificationResult, VerificationResultItem};
pub use domain::status::VerificationStatus;
pub use domain::types::{CheckKind, DocumentType, EsLevel, SignatureSourceType};
pub use infra::config::VerifierConfig;
pub use infra::error::{VerifyError, VerifyResult};
pub use infra::observer::{LogObserver, NullObserver, VerificationObserver};
pub use pipelines::document::DocumentVerifier;
pub use pipelines::signature::SignatureVerificationPipeline;
pub use services::cert_path::{CertPathError, CertificatePathValidator, PathPolicy};
pub use services::timestamp_token::TimestampTokenValidator;
