//! Domain layer: status algebra, core enumerations, evidence records and
//! result types. No I/O and no crypto here.

pub mod report;
pub mod status;
pub mod types;
pub mod validation_data;

pub use report::{VerificationResult, VerificationResultItem};
pub use status::VerificationStatus;
pub use types::{CheckKind, DocumentType, EsLevel, SignatureSourceType};
pub use validation_data::{
    ArchiveTimeStampValidationData, CertificateData, CertificateDigestRef,
    CertificatePathValidationData, DocumentData, IssuerSerialRef, ReferenceValidationData,
    SignatureData, SignatureValueValidationData, SigningCertificateValidationData, TimeStampData,
    TimeStampValidationData,
};
