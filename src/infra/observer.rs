//! Observer side channel for verification findings.
//!
//! Every result item that is not VALID is forwarded to the observer
//! synchronously, at the moment it is produced. The observer never influences
//! control flow; it exists so host applications can surface findings live
//! instead of waiting for the aggregated result.

use crate::domain::report::VerificationResultItem;

/// Sink for non-VALID verification findings
pub trait VerificationObserver: Send + Sync {
    /// Called once per non-VALID result item, in emission order
    fn on_finding(&self, item: &VerificationResultItem);
}

/// Observer that forwards findings to the `log` facade
pub struct LogObserver;

impl VerificationObserver for LogObserver {
    fn on_finding(&self, item: &VerificationResultItem) {
        log::warn!("verification finding: {item}");
    }
}

/// Null observer for silent operation
pub struct NullObserver;

impl VerificationObserver for NullObserver {
    fn on_finding(&self, _item: &VerificationResultItem) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::VerificationStatus;
    use crate::domain::types::{CheckKind, SignatureSourceType};
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl VerificationObserver for Recording {
        fn on_finding(&self, item: &VerificationResultItem) {
            self.seen.lock().unwrap().push(item.item_name.clone());
        }
    }

    #[test]
    fn recording_observer_captures_items() {
        let observer = Recording {
            seen: Mutex::new(Vec::new()),
        };
        let item = VerificationResultItem::failed(
            VerificationStatus::Invalid,
            SignatureSourceType::Prescription,
            CheckKind::Reference,
            "ref-1",
            "digest mismatch",
        );
        observer.on_finding(&item);
        assert_eq!(observer.seen.lock().unwrap().as_slice(), ["ref-1"]);
    }
}
