//! Verification status values and the single severity-combination rule.
//!
//! Every aggregation point in the engine (per check, per signature, per
//! document) merges outcomes through [`VerificationStatus::reduce`]; no other
//! combination policy exists.

use std::fmt;

/// Outcome of a verification check.
///
/// Ordered so that merging many outcomes is a `max` operation:
/// `Invalid > Indeterminate > Valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerificationStatus {
    /// The checked material is valid.
    Valid,
    /// Validity could not be determined (e.g. trust could not be established).
    Indeterminate,
    /// The checked material is invalid.
    Invalid,
}

impl VerificationStatus {
    /// Merge a sequence of statuses into one.
    ///
    /// Returns `default` for an empty sequence; otherwise `Invalid` if any
    /// element is `Invalid`, else `Indeterminate` if any element is
    /// `Indeterminate`, else `Valid`.
    pub fn reduce<I>(statuses: I, default: VerificationStatus) -> VerificationStatus
    where
        I: IntoIterator<Item = VerificationStatus>,
    {
        statuses.into_iter().max().unwrap_or(default)
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self == VerificationStatus::Valid
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Valid => "VALID",
            VerificationStatus::Indeterminate => "INDETERMINATE",
            VerificationStatus::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
