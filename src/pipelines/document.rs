//! Whole-document verification.
//!
//! Runs the signature pipeline over every signature in the document and
//! merges the outcomes. The only cross-signature rule lives here: in a
//! dispensing record, the embedded prescription signature is judged at the
//! dispensing signature's timestamp generation time, because the dispensing
//! act is the proof that the prescription signature existed.

use chrono::{DateTime, Utc};

use crate::domain::report::{VerificationResult, VerificationResultItem};
use crate::domain::status::VerificationStatus;
use crate::domain::types::{CheckKind, DocumentType, SignatureSourceType};
use crate::domain::validation_data::DocumentData;
use crate::infra::config::VerifierConfig;
use crate::infra::observer::{NullObserver, VerificationObserver};
use crate::pipelines::signature::SignatureVerificationPipeline;

/// Verifier over a whole document
pub struct DocumentVerifier<'a> {
    config: &'a VerifierConfig,
    observer: &'a dyn VerificationObserver,
}

impl<'a> DocumentVerifier<'a> {
    pub fn new(config: &'a VerifierConfig) -> Self {
        Self {
            config,
            observer: &NullObserver,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn VerificationObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Verify `document` as of now.
    pub fn verify(&self, document: &DocumentData) -> VerificationResult {
        self.verify_at(document, Utc::now())
    }

    /// Verify `document` at an explicit verification instant.
    pub fn verify_at(
        &self,
        document: &DocumentData,
        verification_time: DateTime<Utc>,
    ) -> VerificationResult {
        let mut items = Vec::new();

        if document.signatures.is_empty() {
            let item = VerificationResultItem::failed(
                VerificationStatus::Invalid,
                SignatureSourceType::None,
                CheckKind::Document,
                "Document",
                "no signature found in document",
            );
            self.observer.on_finding(&item);
            items.push(item);
            return VerificationResult::from_items(items, VerificationStatus::Invalid);
        }

        let dispensing_basis = Self::dispensing_basis_time(document);
        let pipeline = SignatureVerificationPipeline::new(self.config, self.observer);

        for signature in &document.signatures {
            let document_basis_time = match (document.document_type, signature.source_type) {
                (DocumentType::Dispensing, SignatureSourceType::DispPrescription) => {
                    dispensing_basis
                }
                _ => None,
            };

            let outcome = pipeline.verify(signature, verification_time, document_basis_time);
            let halted = outcome.structure_failed;
            items.extend(outcome.items);
            if halted {
                log::warn!(
                    "structure check failed for signature {}, halting document",
                    signature.name
                );
                break;
            }
        }

        VerificationResult::from_items(items, VerificationStatus::Valid)
    }

    /// genTime of the dispensing signature's own timestamp, when present.
    fn dispensing_basis_time(document: &DocumentData) -> Option<DateTime<Utc>> {
        document
            .signatures
            .iter()
            .find(|s| s.source_type == SignatureSourceType::Dispensing)
            .and_then(|s| s.signature_timestamp_generation_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EsLevel;
    use crate::domain::validation_data::SignatureData;

    fn signature(source: SignatureSourceType, level: EsLevel) -> SignatureData {
        SignatureData {
            name: format!("{source}"),
            es_level: level,
            source_type: source,
            structure_error: None,
            references: Vec::new(),
            signature_value: None,
            signing_certificate: None,
            signature_timestamp: None,
            archive_timestamps: Vec::new(),
            signature_timestamp_generation_time: None,
            oldest_archive_timestamp_generation_time: None,
        }
    }

    #[test]
    fn empty_document_is_invalid() {
        let config = VerifierConfig::default();
        let document = DocumentData {
            document_type: DocumentType::Prescription,
            signatures: Vec::new(),
        };
        let result = DocumentVerifier::new(&config).verify(&document);
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].message, "no signature found in document");
    }

    #[test]
    fn structure_failure_halts_following_signatures() {
        let config = VerifierConfig::default();
        let mut first = signature(SignatureSourceType::Dispensing, EsLevel::Bes);
        first.structure_error = Some("bad".to_string());
        let second = signature(SignatureSourceType::DispPrescription, EsLevel::Bes);

        let document = DocumentData {
            document_type: DocumentType::Dispensing,
            signatures: vec![first, second],
        };
        let result = DocumentVerifier::new(&config).verify(&document);
        // only the structure item; the second signature never ran
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].check, CheckKind::Structure);
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn sibling_failures_accumulate() {
        let config = VerifierConfig::default();
        let document = DocumentData {
            document_type: DocumentType::Dispensing,
            signatures: vec![
                signature(SignatureSourceType::Dispensing, EsLevel::Bes),
                signature(SignatureSourceType::DispPrescription, EsLevel::Bes),
            ],
        };
        let result = DocumentVerifier::new(&config).verify(&document);
        // both signatures contribute their own findings
        let dispensing = result
            .items
            .iter()
            .filter(|i| i.source_type == SignatureSourceType::Dispensing)
            .count();
        let embedded = result
            .items
            .iter()
            .filter(|i| i.source_type == SignatureSourceType::DispPrescription)
            .count();
        assert!(dispensing > 0);
        assert!(embedded > 0);
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn level_none_signatures_leave_document_valid() {
        let config = VerifierConfig::default();
        let document = DocumentData {
            document_type: DocumentType::Prescription,
            signatures: vec![signature(SignatureSourceType::Prescription, EsLevel::None)],
        };
        let result = DocumentVerifier::new(&config).verify(&document);
        assert!(result.items.is_empty());
        assert_eq!(result.status, VerificationStatus::Valid);
    }
}
