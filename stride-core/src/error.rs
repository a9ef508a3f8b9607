//! Error types for Stride cache operations

use std::time::Duration;
use thiserror::Error;

/// Which storage tier an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// In-memory variable scoped to the current execution context.
    Memory,
    /// Tab/session-scoped string storage.
    Session,
    /// Durable per-origin structured storage.
    Durable,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Memory => "memory",
            TierKind::Session => "session",
            TierKind::Durable => "durable",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage tier errors.
///
/// These never reach callers of the cache manager; every tier failure is
/// downgraded to a miss (reads) or a logged skip (writes).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("{tier} tier unavailable: {reason}")]
    Unavailable { tier: TierKind, reason: String },

    #[error("{tier} tier quota exceeded: needed {needed} bytes, {available} available")]
    QuotaExceeded {
        tier: TierKind,
        needed: usize,
        available: usize,
    },

    #[error("{tier} tier holds a corrupt entry for {key}: {reason}")]
    Corrupt {
        tier: TierKind,
        key: String,
        reason: String,
    },

    #[error("{tier} tier backend error: {reason}")]
    Backend { tier: TierKind, reason: String },

    #[error("{tier} tier lock poisoned")]
    LockPoisoned { tier: TierKind },
}

impl TierError {
    /// The tier this error belongs to.
    pub fn tier(&self) -> TierKind {
        match self {
            TierError::Unavailable { tier, .. }
            | TierError::QuotaExceeded { tier, .. }
            | TierError::Corrupt { tier, .. }
            | TierError::Backend { tier, .. }
            | TierError::LockPoisoned { tier } => *tier,
        }
    }
}

/// Cross-tab broadcast errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Failed to encode broadcast message: {reason}")]
    Serialization { reason: String },
}

/// Upstream fetch failures observed by the server cache wrapper.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Upstream fetch for {tag} failed: {message}")]
    Upstream { tag: String, message: String },

    #[error("Upstream fetch for {tag} timed out after {timeout:?}")]
    Timeout { tag: String, timeout: Duration },

    #[error("Circuit open for {tag} after {failures} consecutive failures")]
    CircuitOpen { tag: String, failures: u32 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Stride errors.
#[derive(Debug, Clone, Error)]
pub enum StrideError {
    #[error("Tier error: {0}")]
    Tier(#[from] TierError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Stride operations.
pub type StrideResult<T> = Result<T, StrideError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_error_display_quota() {
        let err = TierError::QuotaExceeded {
            tier: TierKind::Session,
            needed: 6000,
            available: 5000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("session"));
        assert!(msg.contains("6000"));
        assert!(msg.contains("5000"));
        assert_eq!(err.tier(), TierKind::Session);
    }

    #[test]
    fn test_tier_error_display_corrupt() {
        let err = TierError::Corrupt {
            tier: TierKind::Durable,
            key: "menu-cache".to_string(),
            reason: "expected value at line 1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("durable"));
        assert!(msg.contains("menu-cache"));
    }

    #[test]
    fn test_fetch_error_display_timeout() {
        let err = FetchError::Timeout {
            tag: "menus".to_string(),
            timeout: Duration::from_millis(3000),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("menus"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_stride_error_from_variants() {
        let tier = StrideError::from(TierError::LockPoisoned {
            tier: TierKind::Memory,
        });
        assert!(matches!(tier, StrideError::Tier(_)));

        let broadcast = StrideError::from(BroadcastError::Serialization {
            reason: "key must be a string".to_string(),
        });
        assert!(matches!(broadcast, StrideError::Broadcast(_)));

        let fetch = StrideError::from(FetchError::CircuitOpen {
            tag: "menus".to_string(),
            failures: 5,
        });
        assert!(matches!(fetch, StrideError::Fetch(_)));

        let config = StrideError::from(ConfigError::InvalidValue {
            field: "timeout_ms".to_string(),
            value: "abc".to_string(),
            reason: "not a number".to_string(),
        });
        assert!(matches!(config, StrideError::Config(_)));
    }

    #[test]
    fn test_tier_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TierKind::Durable).unwrap();
        assert_eq!(json, "\"durable\"");
    }
}
