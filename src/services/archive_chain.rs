//! Archive timestamp chain validation.
//!
//! The chain is ordered oldest first (chain index 0). Each element must have
//! existed before the next one was produced, so element *i* is evaluated at
//! element *i+1*'s generation time; only the newest element is evaluated at
//! the caller's verification time. A broken link (the next element failed
//! conversion or its generation time cannot be extracted) invalidates the
//! element below it without stopping the walk.

use chrono::{DateTime, Utc};

use crate::domain::report::VerificationResultItem;
use crate::domain::status::VerificationStatus;
use crate::domain::types::{CheckKind, SignatureSourceType};
use crate::domain::validation_data::ArchiveTimeStampValidationData;
use crate::services::cert_path::PathPolicy;
use crate::services::timestamp_token::{TimestampTokenValidator, TokenItem};

/// Stateless archive chain validator
pub struct ArchiveTimestampChainValidator;

impl ArchiveTimestampChainValidator {
    /// Validate a whole chain; every returned item is tagged with the
    /// element's chain index and id. An empty chain yields no items; the
    /// caller decides whether that is acceptable for the signature's level.
    pub fn validate(
        verification_time: DateTime<Utc>,
        chain: &[ArchiveTimeStampValidationData],
        source_type: SignatureSourceType,
        policy: &PathPolicy,
    ) -> Vec<VerificationResultItem> {
        let mut items = Vec::new();

        for (pos, element) in chain.iter().enumerate() {
            // The element's own upstream failure outranks everything else;
            // a missing basis time must not mask it.
            if let Some(error) = &element.conversion_error {
                items.push(Self::element_item(
                    element,
                    source_type,
                    VerificationStatus::Invalid,
                    "Token",
                    error.clone(),
                ));
                continue;
            }

            let next = chain.get(pos + 1);
            let basis_time = match next {
                None => Some(verification_time),
                Some(next) if next.conversion_error.is_some() => None,
                Some(next) => {
                    TimestampTokenValidator::generation_time(&next.timestamp.token).ok()
                }
            };

            let Some(basis_time) = basis_time else {
                items.push(Self::element_item(
                    element,
                    source_type,
                    VerificationStatus::Invalid,
                    "Token",
                    "basis time of the following archive timestamp is not available",
                ));
                continue;
            };

            let outcome =
                TimestampTokenValidator::validate(basis_time, &element.timestamp, policy);
            let mut token_clean = true;
            let mut imprint_clean = true;
            for finding in &outcome.findings {
                match finding.item {
                    TokenItem::Token | TokenItem::TsaCert | TokenItem::TsaSignature => {
                        token_clean = false;
                    }
                    TokenItem::MessageImprint => imprint_clean = false,
                }
                items.push(Self::element_item(
                    element,
                    source_type,
                    finding.status,
                    finding.item.as_str(),
                    finding.message.clone(),
                ));
            }

            // An aborted run never vouches for anything.
            if !outcome.completed {
                continue;
            }

            if token_clean {
                items.push(
                    VerificationResultItem::valid(source_type, CheckKind::ArchiveTimeStamp, "Token")
                        .with_chain_index(element.chain_index)
                        .with_mapped_id(element.id.clone()),
                );
            }
            if imprint_clean {
                items.push(
                    VerificationResultItem::valid(
                        source_type,
                        CheckKind::ArchiveTimeStamp,
                        "MessageImprint",
                    )
                    .with_chain_index(element.chain_index)
                    .with_mapped_id(element.id.clone()),
                );
            }
        }

        items
    }

    /// Generation time of the oldest element whose token is decodable.
    pub fn oldest_generation_time(
        chain: &[ArchiveTimeStampValidationData],
    ) -> Option<DateTime<Utc>> {
        chain
            .iter()
            .filter(|e| e.conversion_error.is_none())
            .filter_map(|e| TimestampTokenValidator::generation_time(&e.timestamp.token).ok())
            .min()
    }

    fn element_item(
        element: &ArchiveTimeStampValidationData,
        source_type: SignatureSourceType,
        status: VerificationStatus,
        item_name: &str,
        message: impl Into<String>,
    ) -> VerificationResultItem {
        VerificationResultItem::failed(
            status,
            source_type,
            CheckKind::ArchiveTimeStamp,
            item_name,
            message,
        )
        .with_chain_index(element.chain_index)
        .with_mapped_id(element.id.clone())
    }
}
