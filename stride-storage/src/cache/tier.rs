//! Storage tier port.
//!
//! Every tier of the client cache is an adapter behind [`CacheTier`]. Each
//! operation returns a `Result` so the manager can capture failures per
//! tier. A failing tier never fails the whole operation.

use async_trait::async_trait;
use stride_core::{CachedDocument, TierError, TierKind};

/// One storage backend in the client cache hierarchy.
///
/// Implementations must tolerate concurrent use from multiple tasks. Reads
/// return `Ok(None)` for a missing key and `Err` only for a genuine backend
/// failure (quota, unsupported API, corrupt entry).
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Which tier this adapter implements.
    fn kind(&self) -> TierKind;

    /// Read the document stored under `key`.
    async fn read(&self, key: &str) -> Result<Option<CachedDocument>, TierError>;

    /// Store `doc` under `key`, replacing any previous document.
    async fn write(&self, key: &str, doc: &CachedDocument) -> Result<(), TierError>;

    /// Remove the document stored under `key`. Clearing a missing key succeeds.
    async fn clear(&self, key: &str) -> Result<(), TierError>;
}

/// Per-tier outcome of a multi-tier write or clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierReport {
    /// Tiers that applied the operation.
    pub succeeded: Vec<TierKind>,
    /// Tiers that failed, with the captured error.
    pub failed: Vec<(TierKind, TierError)>,
}

impl TierReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: TierKind, result: Result<(), TierError>) {
        match result {
            Ok(()) => self.succeeded.push(kind),
            Err(e) => self.failed.push((kind, e)),
        }
    }

    /// True when every attempted tier succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_tiers(&self) -> Vec<TierKind> {
        self.failed.iter().map(|(kind, _)| *kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_outcomes() {
        let mut report = TierReport::new();
        report.record(TierKind::Memory, Ok(()));
        report.record(
            TierKind::Session,
            Err(TierError::QuotaExceeded {
                tier: TierKind::Session,
                needed: 10,
                available: 1,
            }),
        );

        assert!(!report.is_complete());
        assert_eq!(report.succeeded, vec![TierKind::Memory]);
        assert_eq!(report.failed_tiers(), vec![TierKind::Session]);
    }

    #[test]
    fn test_empty_report_is_complete() {
        assert!(TierReport::new().is_complete());
    }
}
