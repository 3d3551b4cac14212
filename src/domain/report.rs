//! Verification result items and their aggregation.

use crate::domain::status::VerificationStatus;
use crate::domain::types::{CheckKind, SignatureSourceType};
use std::fmt;

/// One atomic verification finding.
///
/// Items are append-only facts: a check emits zero or more of them and the
/// surrounding pipeline never rewrites an item after emission.
#[derive(Debug, Clone)]
pub struct VerificationResultItem {
    pub status: VerificationStatus,
    /// Which signature within the document the item belongs to.
    pub source_type: SignatureSourceType,
    /// The check that produced the item.
    pub check: CheckKind,
    /// Zero-based archive-chain index, for archive-timestamp items.
    pub chain_index: Option<usize>,
    /// Short name of the verified thing ("Token", "MessageImprint", a
    /// reference id, ...).
    pub item_name: String,
    /// Id of the XML element the finding maps back to, when one exists.
    pub mapped_id: Option<String>,
    /// Human-readable detail. Empty for plain VALID facts.
    pub message: String,
}

impl VerificationResultItem {
    #[must_use]
    pub fn valid(
        source_type: SignatureSourceType,
        check: CheckKind,
        item_name: impl Into<String>,
    ) -> Self {
        Self {
            status: VerificationStatus::Valid,
            source_type,
            check,
            chain_index: None,
            item_name: item_name.into(),
            mapped_id: None,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn failed(
        status: VerificationStatus,
        source_type: SignatureSourceType,
        check: CheckKind,
        item_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            source_type,
            check,
            chain_index: None,
            item_name: item_name.into(),
            mapped_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_chain_index(mut self, index: usize) -> Self {
        self.chain_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_mapped_id(mut self, id: impl Into<String>) -> Self {
        self.mapped_id = Some(id.into());
        self
    }
}

impl fmt::Display for VerificationResultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{} {}",
            self.status, self.source_type, self.check, self.item_name
        )?;
        if let Some(idx) = self.chain_index {
            write!(f, "#{idx}")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Aggregated outcome of a verification run.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub items: Vec<VerificationResultItem>,
}

impl VerificationResult {
    /// Aggregate a set of items; an empty set yields `default`.
    #[must_use]
    pub fn from_items(items: Vec<VerificationResultItem>, default: VerificationStatus) -> Self {
        let status = VerificationStatus::reduce(items.iter().map(|i| i.status), default);
        Self { status, items }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Items that did not come out VALID.
    pub fn failures(&self) -> impl Iterator<Item = &VerificationResultItem> {
        self.items.iter().filter(|i| !i.status.is_valid())
    }
}
