//! Cached menu document and cross-tab message types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::TimestampMs;

/// Shape version of [`CachedDocument`] itself (not of its payload).
///
/// Bump whenever the serialized layout of `CachedDocument` changes so that
/// entries written by an older build are discarded instead of misread.
pub const DOCUMENT_SCHEMA_VERSION: &str = "menu-cache/v3";

/// Owner marker used for signed-out visitors.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// One cached copy of the menu configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDocument {
    /// Opaque configuration (menus plus auxiliary lookup structures).
    pub payload: Value,
    /// Version reported by the server for `payload`.
    pub server_version: String,
    /// When the writing tier stored this document.
    pub written_at: TimestampMs,
    pub schema_version: String,
    /// Principal this view belongs to.
    pub owner_id: String,
}

impl CachedDocument {
    /// Build a document stamped with `written_at` and the current schema.
    pub fn new(
        payload: Value,
        server_version: impl Into<String>,
        owner_id: impl Into<String>,
        written_at: TimestampMs,
    ) -> Self {
        Self {
            payload,
            server_version: server_version.into(),
            written_at,
            schema_version: DOCUMENT_SCHEMA_VERSION.to_string(),
            owner_id: owner_id.into(),
        }
    }

    /// Age of the document at `now`, clamped at zero for clock skew.
    pub fn age_ms(&self, now: TimestampMs) -> i64 {
        now.saturating_sub(self.written_at).max(0)
    }

    pub fn has_schema(&self, expected: &str) -> bool {
        self.schema_version == expected
    }

    pub fn belongs_to(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Menu payload together with the version the server computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSnapshot {
    pub payload: Value,
    pub server_version: String,
}

impl MenuSnapshot {
    /// Snapshot whose version is derived from the payload contents.
    pub fn from_payload(payload: Value) -> Self {
        let server_version = compute_server_version(&payload);
        Self {
            payload,
            server_version,
        }
    }
}

/// Body of `GET /api/menus/version`, used for the client version handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuVersionResponse {
    pub server_version: String,
}

/// Hex-encoded SHA-256 of the payload's JSON encoding.
///
/// `serde_json` keeps object keys sorted unless `preserve_order` is
/// enabled, so equal payloads hash to equal versions.
pub fn compute_server_version(payload: &Value) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Message carried on the cross-tab broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CacheMessage {
    /// Another tab wrote a new document; replace the local tier-1 copy.
    CacheUpdated { document: CachedDocument },
    /// Another tab cleared every tier; drop the local tier-1 copy.
    CacheInvalidated,
}

impl CacheMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            CacheMessage::CacheUpdated { .. } => "cache-updated",
            CacheMessage::CacheInvalidated => "cache-invalidated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = CachedDocument::new(json!({"menus": []}), "v1", "user-1", 42);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["serverVersion"], "v1");
        assert_eq!(value["writtenAt"], 42);
        assert_eq!(value["schemaVersion"], DOCUMENT_SCHEMA_VERSION);
        assert_eq!(value["ownerId"], "user-1");
    }

    #[test]
    fn test_age_clamps_future_writes() {
        let doc = CachedDocument::new(json!(null), "v1", ANONYMOUS_OWNER, 10_000);
        assert_eq!(doc.age_ms(9_000), 0);
        assert_eq!(doc.age_ms(12_500), 2_500);
    }

    #[test]
    fn test_server_version_is_stable_for_equal_payloads() {
        let a = json!({"b": 1, "a": [1, 2, 3]});
        let b = json!({"a": [1, 2, 3], "b": 1});
        assert_eq!(compute_server_version(&a), compute_server_version(&b));
        assert_ne!(
            compute_server_version(&a),
            compute_server_version(&json!({"a": []}))
        );
        assert_eq!(compute_server_version(&a).len(), 64);
    }

    #[test]
    fn test_message_wire_format() {
        let invalidated = serde_json::to_value(CacheMessage::CacheInvalidated).unwrap();
        assert_eq!(invalidated, json!({"type": "cache-invalidated"}));

        let doc = CachedDocument::new(json!({"menus": ["home"]}), "v2", "u", 1);
        let updated = serde_json::to_value(CacheMessage::CacheUpdated {
            document: doc.clone(),
        })
        .unwrap();
        assert_eq!(updated["type"], "cache-updated");
        assert_eq!(updated["document"]["serverVersion"], "v2");

        let decoded: CacheMessage = serde_json::from_value(updated).unwrap();
        assert_eq!(decoded, CacheMessage::CacheUpdated { document: doc });
    }
}
