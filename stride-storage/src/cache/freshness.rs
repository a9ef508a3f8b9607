//! Freshness classification for cache reads.
//!
//! A read from the manager is classified once against the staleness policy
//! so callers can implement stale-while-revalidate without recomputing the
//! predicates.

use stride_core::{CachedDocument, StalenessPolicy, TimestampMs};

/// Result of a cache lookup, carrying how usable the document is.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Young enough to serve without refreshing.
    Fresh(CachedDocument),
    /// Serve immediately, but refresh in the background.
    Stale(CachedDocument),
    /// Too old to serve; a synchronous refetch is required.
    Expired(CachedDocument),
    /// Nothing cached.
    Missing,
}

impl CacheLookup {
    /// Classify `doc` at `now` under `policy`.
    pub fn classify(
        doc: Option<CachedDocument>,
        policy: &StalenessPolicy,
        now: TimestampMs,
    ) -> Self {
        match doc {
            None => CacheLookup::Missing,
            Some(doc) if policy.is_expired(Some(&doc), now) => CacheLookup::Expired(doc),
            Some(doc) if policy.is_stale(Some(&doc), now) => CacheLookup::Stale(doc),
            Some(doc) => CacheLookup::Fresh(doc),
        }
    }

    /// Document that may be served right now (fresh or stale).
    pub fn usable(&self) -> Option<&CachedDocument> {
        match self {
            CacheLookup::Fresh(doc) | CacheLookup::Stale(doc) => Some(doc),
            CacheLookup::Expired(_) | CacheLookup::Missing => None,
        }
    }

    /// Whether a refresh should be started.
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, CacheLookup::Fresh(_))
    }

    /// Whether the caller must wait for a refetch before it has anything to serve.
    pub fn must_refetch(&self) -> bool {
        matches!(self, CacheLookup::Expired(_) | CacheLookup::Missing)
    }

    /// Consume the lookup and return the document regardless of freshness.
    pub fn into_document(self) -> Option<CachedDocument> {
        match self {
            CacheLookup::Fresh(doc) | CacheLookup::Stale(doc) | CacheLookup::Expired(doc) => {
                Some(doc)
            }
            CacheLookup::Missing => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stride_core::ANONYMOUS_OWNER;

    fn doc() -> CachedDocument {
        CachedDocument::new(json!({}), "v1", ANONYMOUS_OWNER, 0)
    }

    #[test]
    fn test_classification_windows() {
        let policy = StalenessPolicy::default();

        let fresh = CacheLookup::classify(Some(doc()), &policy, 30_000);
        assert!(matches!(fresh, CacheLookup::Fresh(_)));
        assert!(!fresh.needs_refresh());
        assert!(fresh.usable().is_some());

        let stale = CacheLookup::classify(Some(doc()), &policy, 90_000);
        assert!(matches!(stale, CacheLookup::Stale(_)));
        assert!(stale.needs_refresh());
        assert!(!stale.must_refetch());
        assert!(stale.usable().is_some());

        let expired = CacheLookup::classify(Some(doc()), &policy, 310_000);
        assert!(matches!(expired, CacheLookup::Expired(_)));
        assert!(expired.must_refetch());
        assert!(expired.usable().is_none());
        assert!(expired.into_document().is_some());
    }

    #[test]
    fn test_missing() {
        let lookup = CacheLookup::classify(None, &StalenessPolicy::default(), 0);
        assert_eq!(lookup, CacheLookup::Missing);
        assert!(lookup.must_refetch());
        assert!(lookup.into_document().is_none());
    }
}
