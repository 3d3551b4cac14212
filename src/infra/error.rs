//! Error types for the verification engine.
//!
//! `VerifyError` covers the non-recoverable class: malformed input the caller
//! handed us, broken configuration, ASN.1 material that cannot even be walked.
//! Per-check outcomes are never errors; they travel as result items.

use thiserror::Error;

/// Result type for engine operations
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Non-recoverable error types for verification operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum VerifyError {
    #[error("Structure error: {0}")]
    StructureError(String),

    #[error("ASN.1 encoding/decoding error: {0}")]
    Asn1Error(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<der::Error> for VerifyError {
    fn from(error: der::Error) -> Self {
        VerifyError::Asn1Error(error.to_string())
    }
}

impl From<x509_parser::nom::Err<x509_parser::error::X509Error>> for VerifyError {
    fn from(error: x509_parser::nom::Err<x509_parser::error::X509Error>) -> Self {
        VerifyError::CertificateError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = VerifyError::StructureError("truncated signature element".to_string());
        assert_eq!(
            error.to_string(),
            "Structure error: truncated signature element"
        );

        let error = VerifyError::UnsupportedAlgorithm("1.3.14.3.2.26".to_string());
        assert_eq!(error.to_string(), "Unsupported algorithm: 1.3.14.3.2.26");
    }

    #[test]
    fn test_der_error_conversion() {
        use der::Decode;
        let der_err = der::asn1::ObjectIdentifier::from_der(&[0x02, 0x01]).unwrap_err();
        let err: VerifyError = der_err.into();
        assert!(matches!(err, VerifyError::Asn1Error(_)));
    }
}
