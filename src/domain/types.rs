//! Core enumerations shared across the verification engine.

use std::fmt;

/// Signature advancement level (XAdES "ES level") of a signature.
///
/// The level gates which checks apply: `Bes` covers references, signature
/// value and signer certificate; `T` adds the signature timestamp; `Xl`
/// requires path validation with full revocation material; `A` adds the
/// archive timestamp chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EsLevel {
    None,
    Bes,
    T,
    Xl,
    A,
}

impl EsLevel {
    /// Whether a signature at this level is subject to a check requiring
    /// at least `minimum`.
    #[must_use]
    pub fn meets(self, minimum: EsLevel) -> bool {
        self >= minimum
    }
}

impl fmt::Display for EsLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EsLevel::None => "NONE",
            EsLevel::Bes => "BES",
            EsLevel::T => "T",
            EsLevel::Xl => "XL",
            EsLevel::A => "A",
        };
        f.write_str(s)
    }
}

/// The logical role a signature plays inside a document.
///
/// Drives cross-signature basis-time rules (see the document pipeline), not
/// the verification logic itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureSourceType {
    /// Prescription signature in a prescription document.
    Prescription,
    /// Dispensing signature in a dispensing document.
    Dispensing,
    /// The prescription signature embedded inside a dispensing record.
    DispPrescription,
    Unknown,
    None,
}

impl fmt::Display for SignatureSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignatureSourceType::Prescription => "Prescription",
            SignatureSourceType::Dispensing => "Dispensing",
            SignatureSourceType::DispPrescription => "DispPrescription",
            SignatureSourceType::Unknown => "Unknown",
            SignatureSourceType::None => "None",
        };
        f.write_str(s)
    }
}

/// Kind of document under verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Prescription,
    Dispensing,
}

/// Identifies which check produced a result item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Structure,
    Reference,
    SignatureValue,
    SigningCertificate,
    SignatureTimeStamp,
    ArchiveTimeStamp,
    Document,
}

impl CheckKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::Structure => "Structure",
            CheckKind::Reference => "Reference",
            CheckKind::SignatureValue => "SignatureValue",
            CheckKind::SigningCertificate => "SigningCertificate",
            CheckKind::SignatureTimeStamp => "SignatureTimeStamp",
            CheckKind::ArchiveTimeStamp => "ArchiveTimeStamp",
            CheckKind::Document => "Document",
        }
    }

    /// Minimum ES level at which this check applies.
    #[must_use]
    pub fn minimum_level(self) -> EsLevel {
        match self {
            CheckKind::Structure | CheckKind::Document => EsLevel::None,
            CheckKind::Reference | CheckKind::SignatureValue | CheckKind::SigningCertificate => {
                EsLevel::Bes
            }
            CheckKind::SignatureTimeStamp => EsLevel::T,
            CheckKind::ArchiveTimeStamp => EsLevel::A,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
