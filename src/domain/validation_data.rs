//! Validation-data records supplied by the XML-extraction collaborator.
//!
//! These are plain evidence carriers: raw DER bytes, expected/recomputed
//! digests, and any conversion errors the extraction layer hit while pulling
//! them out of the signature XML. The engine reads them and never mutates
//! them; the only write is the one-shot [`TimeStampData`] fact snapshot
//! recorded on a timestamp record for downstream reporting.

use chrono::{DateTime, Utc};
use std::sync::OnceLock;

use crate::domain::types::{DocumentType, EsLevel, SignatureSourceType};

/// A certificate extracted from the signature XML.
#[derive(Debug, Clone)]
pub struct CertificateData {
    /// Locator of the XML element the certificate came from.
    pub source: String,
    /// Reference id attribute, when the element carried one.
    pub reference_id: Option<String>,
    /// Raw DER bytes.
    pub der: Vec<u8>,
}

impl CertificateData {
    #[must_use]
    pub fn new(source: impl Into<String>, reference_id: Option<String>, der: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            reference_id,
            der,
        }
    }
}

/// Unordered evidence sets for certificate-path validation.
///
/// This is a bag of material, not a built path: intermediates and anchors are
/// mixed in `certificates`, and revocation evidence sits alongside.
#[derive(Debug, Clone, Default)]
pub struct CertificatePathValidationData {
    pub source: String,
    /// DER certificates (intermediates and candidate trust anchors).
    pub certificates: Vec<Vec<u8>>,
    /// DER certificate revocation lists.
    pub crls: Vec<Vec<u8>>,
    /// DER OCSP responses, when the signature embedded any.
    pub ocsp_responses: Vec<Vec<u8>>,
}

/// Issuer/serial reference stored next to the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerSerialRef {
    /// Issuer distinguished name as rendered by the extraction layer.
    pub issuer: String,
    /// Serial number, decimal string.
    pub serial: String,
}

/// Certificate-digest reference (XAdES `CertDigest`).
#[derive(Debug, Clone)]
pub struct CertificateDigestRef {
    /// Digest algorithm URI or OID string.
    pub algorithm: String,
    pub digest: Vec<u8>,
}

/// Evidence for the signing-certificate check.
#[derive(Debug, Clone)]
pub struct SigningCertificateValidationData {
    pub certificate: Option<CertificateData>,
    pub issuer_serial_ref: Option<IssuerSerialRef>,
    pub digest_ref: Option<CertificateDigestRef>,
    pub path_data: CertificatePathValidationData,
}

/// Facts computed while validating one timestamp token.
///
/// Written once per validation run, read by the reporting layer; never used
/// for control flow.
#[derive(Debug, Clone, Default)]
pub struct TimeStampData {
    /// OID of the MessageImprint hash algorithm, dotted form.
    pub imprint_algorithm: Option<String>,
    /// Hash embedded in the token's MessageImprint.
    pub embedded_imprint: Option<Vec<u8>>,
    /// Hash recomputed over the timestamped target bytes.
    pub computed_imprint: Option<Vec<u8>>,
    /// messageDigest attribute value from the signed attributes.
    pub message_digest: Option<Vec<u8>>,
    /// Digest recomputed over the encapsulated TSTInfo content.
    pub computed_message_digest: Option<Vec<u8>>,
    /// Certificate hash from the signing-certificate attribute.
    pub certificate_digest: Option<Vec<u8>>,
    /// Hash recomputed over the TSA certificate.
    pub computed_certificate_digest: Option<Vec<u8>>,
    /// Whether the TSA signature over the token content verified.
    pub signature_verified: Option<bool>,
    /// genTime extracted from the TSTInfo.
    pub generation_time: Option<DateTime<Utc>>,
}

/// A signature or archive timestamp awaiting validation.
#[derive(Debug)]
pub struct TimeStampValidationData {
    pub id: String,
    /// Raw timestamp token (ContentInfo DER). Empty when extraction failed.
    pub token: Vec<u8>,
    /// Canonicalization method URI applied to produce the target bytes.
    pub c14n_method: Option<String>,
    /// The bytes the token is expected to timestamp.
    pub target: Vec<u8>,
    /// TSA certificate, when extracted separately from the token.
    pub tsa_certificate: Option<CertificateData>,
    pub path_data: CertificatePathValidationData,
    /// Errors the extraction layer hit while producing this record.
    pub conversion_errors: Vec<String>,
    computed: OnceLock<TimeStampData>,
}

impl TimeStampValidationData {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        token: Vec<u8>,
        c14n_method: Option<String>,
        target: Vec<u8>,
        tsa_certificate: Option<CertificateData>,
        path_data: CertificatePathValidationData,
        conversion_errors: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            token,
            c14n_method,
            target,
            tsa_certificate,
            path_data,
            conversion_errors,
            computed: OnceLock::new(),
        }
    }

    /// Record the computed-fact snapshot for this validation run.
    ///
    /// The first attachment wins; subsequent calls are no-ops so the snapshot
    /// stays consistent with the run that produced the result items.
    pub fn attach_computed_facts(&self, facts: TimeStampData) {
        let _ = self.computed.set(facts);
    }

    /// Snapshot recorded by the validator, if validation has run.
    #[must_use]
    pub fn computed_facts(&self) -> Option<&TimeStampData> {
        self.computed.get()
    }
}

/// One element of an archive-timestamp chain.
///
/// `chain_index` is zero-based with index 0 the oldest element; the index
/// defines evaluation order and basis-time chaining.
#[derive(Debug)]
pub struct ArchiveTimeStampValidationData {
    pub id: String,
    pub chain_index: usize,
    pub timestamp: TimeStampValidationData,
    /// Set when the extraction layer failed to decode this element.
    pub conversion_error: Option<String>,
}

/// Input to a single reference-digest check.
#[derive(Debug, Clone)]
pub struct ReferenceValidationData {
    pub id: String,
    pub uri: Option<String>,
    pub digest_algorithm: String,
    /// Digest stored in the signature.
    pub expected_digest: Vec<u8>,
    /// Digest recomputed by the extraction layer over the referenced content.
    pub computed_digest: Option<Vec<u8>>,
    pub conversion_error: Option<String>,
}

/// Input to the signature-value check.
#[derive(Debug, Clone)]
pub struct SignatureValueValidationData {
    pub id: String,
    pub signature_algorithm: String,
    /// SignatureValue bytes stored in the signature.
    pub expected: Vec<u8>,
    /// Value recomputed/verified by the extraction layer.
    pub computed: Option<Vec<u8>>,
    pub conversion_error: Option<String>,
}

/// Everything extracted for one signature in the document.
#[derive(Debug)]
pub struct SignatureData {
    pub name: String,
    pub es_level: EsLevel,
    pub source_type: SignatureSourceType,
    /// Structural extraction failure; set when the signature XML itself was
    /// malformed. Halts the whole document when present.
    pub structure_error: Option<String>,
    pub references: Vec<ReferenceValidationData>,
    pub signature_value: Option<SignatureValueValidationData>,
    pub signing_certificate: Option<SigningCertificateValidationData>,
    pub signature_timestamp: Option<TimeStampValidationData>,
    pub archive_timestamps: Vec<ArchiveTimeStampValidationData>,
    /// genTime of the signature timestamp, pre-extracted where available.
    pub signature_timestamp_generation_time: Option<DateTime<Utc>>,
    /// genTime of the oldest archive timestamp, pre-extracted where available.
    pub oldest_archive_timestamp_generation_time: Option<DateTime<Utc>>,
}

/// A whole document: an ordered list of signatures and the document kind.
#[derive(Debug)]
pub struct DocumentData {
    pub document_type: DocumentType,
    pub signatures: Vec<SignatureData>,
}
