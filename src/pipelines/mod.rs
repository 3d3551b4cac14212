//! Workflow pipelines orchestrating stateless services.

pub mod document;
pub mod signature;

pub use document::DocumentVerifier;
pub use signature::{SignatureOutcome, SignatureVerificationPipeline};
