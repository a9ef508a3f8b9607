//! Identity and time types for Stride

use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Identifier of one open tab (browsing context) taking part in cross-tab sync.
/// UUIDv7 keeps ids sortable by creation time, which makes sync logs easier to read.
pub type TabId = Uuid;

/// Generate a new UUIDv7 tab id.
pub fn new_tab_id() -> TabId {
    Uuid::now_v7()
}
