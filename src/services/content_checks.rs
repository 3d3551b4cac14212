//! Reference digest and signature-value checks.
//!
//! The XML layer has already canonicalized and digested the referenced
//! content; these checks compare what the signature stores against what was
//! recomputed, and turn conversion failures reported upstream into findings.

use crate::domain::report::VerificationResultItem;
use crate::domain::status::VerificationStatus;
use crate::domain::types::{CheckKind, SignatureSourceType};
use crate::domain::validation_data::{ReferenceValidationData, SignatureValueValidationData};

/// Check every reference of a signature. One item per reference.
pub fn check_references(
    references: &[ReferenceValidationData],
    source_type: SignatureSourceType,
) -> Vec<VerificationResultItem> {
    references
        .iter()
        .map(|reference| {
            let item = match evaluate_reference(reference) {
                Ok(()) => VerificationResultItem::valid(
                    source_type,
                    CheckKind::Reference,
                    reference.id.clone(),
                ),
                Err(message) => VerificationResultItem::failed(
                    VerificationStatus::Invalid,
                    source_type,
                    CheckKind::Reference,
                    reference.id.clone(),
                    message,
                ),
            };
            item.with_mapped_id(reference.id.clone())
        })
        .collect()
}

fn evaluate_reference(reference: &ReferenceValidationData) -> Result<(), String> {
    if let Some(error) = &reference.conversion_error {
        return Err(error.clone());
    }
    let Some(computed) = &reference.computed_digest else {
        return Err("referenced content digest could not be computed".to_string());
    };
    if computed != &reference.expected_digest {
        return Err(format!(
            "digest mismatch ({}): expected {}, computed {}",
            reference.digest_algorithm,
            hex::encode(&reference.expected_digest),
            hex::encode(computed),
        ));
    }
    Ok(())
}

/// Check the signature value of a signature.
pub fn check_signature_value(
    value: Option<&SignatureValueValidationData>,
    source_type: SignatureSourceType,
) -> VerificationResultItem {
    let Some(value) = value else {
        return VerificationResultItem::failed(
            VerificationStatus::Invalid,
            source_type,
            CheckKind::SignatureValue,
            "SignatureValue",
            "signature value not found",
        );
    };

    let item = match evaluate_signature_value(value) {
        Ok(()) => {
            VerificationResultItem::valid(source_type, CheckKind::SignatureValue, "SignatureValue")
        }
        Err(message) => VerificationResultItem::failed(
            VerificationStatus::Invalid,
            source_type,
            CheckKind::SignatureValue,
            "SignatureValue",
            message,
        ),
    };
    item.with_mapped_id(value.id.clone())
}

fn evaluate_signature_value(value: &SignatureValueValidationData) -> Result<(), String> {
    if let Some(error) = &value.conversion_error {
        return Err(error.clone());
    }
    let Some(computed) = &value.computed else {
        return Err("signature value could not be recomputed".to_string());
    };
    if computed != &value.expected {
        return Err(format!(
            "signature value mismatch ({})",
            value.signature_algorithm
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(computed: Option<Vec<u8>>, error: Option<&str>) -> ReferenceValidationData {
        ReferenceValidationData {
            id: "ref-1".to_string(),
            uri: Some("#content".to_string()),
            digest_algorithm: "sha256".to_string(),
            expected_digest: vec![1, 2, 3],
            computed_digest: computed,
            conversion_error: error.map(str::to_string),
        }
    }

    #[test]
    fn matching_reference_is_valid() {
        let items = check_references(
            &[reference(Some(vec![1, 2, 3]), None)],
            SignatureSourceType::Prescription,
        );
        assert_eq!(items.len(), 1);
        assert!(items[0].status.is_valid());
        assert_eq!(items[0].mapped_id.as_deref(), Some("ref-1"));
    }

    #[test]
    fn mismatching_reference_reports_both_digests() {
        let items = check_references(
            &[reference(Some(vec![9, 9, 9]), None)],
            SignatureSourceType::Prescription,
        );
        assert_eq!(items[0].status, VerificationStatus::Invalid);
        assert!(items[0].message.contains("010203"));
        assert!(items[0].message.contains("090909"));
    }

    #[test]
    fn conversion_error_wins_over_comparison() {
        let items = check_references(
            &[reference(Some(vec![1, 2, 3]), Some("bad c14n"))],
            SignatureSourceType::Prescription,
        );
        assert_eq!(items[0].status, VerificationStatus::Invalid);
        assert_eq!(items[0].message, "bad c14n");
    }

    #[test]
    fn each_reference_gets_its_own_item() {
        let items = check_references(
            &[
                reference(Some(vec![1, 2, 3]), None),
                reference(Some(vec![4]), None),
            ],
            SignatureSourceType::Dispensing,
        );
        assert_eq!(items.len(), 2);
        assert!(items[0].status.is_valid());
        assert_eq!(items[1].status, VerificationStatus::Invalid);
    }

    #[test]
    fn missing_signature_value_is_invalid() {
        let item = check_signature_value(None, SignatureSourceType::Prescription);
        assert_eq!(item.status, VerificationStatus::Invalid);
        assert_eq!(item.message, "signature value not found");
    }

    #[test]
    fn signature_value_match() {
        let value = SignatureValueValidationData {
            id: "sig-1".to_string(),
            signature_algorithm: "rsa-sha256".to_string(),
            expected: vec![7, 7],
            computed: Some(vec![7, 7]),
            conversion_error: None,
        };
        let item = check_signature_value(Some(&value), SignatureSourceType::Prescription);
        assert!(item.status.is_valid());
    }
}
