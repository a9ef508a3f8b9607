//! Constants for Stride API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER CACHE
// ============================================================================

/// Default fetcher timeout in milliseconds
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 3000;

/// Default revalidation window in seconds (1 hour)
pub const DEFAULT_CACHE_REVALIDATE_SECS: u64 = 3600;

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

/// Consecutive failures before the circuit opens
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit skips the fetcher, in milliseconds
pub const DEFAULT_CIRCUIT_COOLDOWN_MS: u64 = 30_000;

// ============================================================================
// CACHE TAGS
// ============================================================================

/// Tag for the navigation menu document
pub const MENUS_TAG: &str = "menus";

/// Tag for site-wide settings
pub const SETTINGS_TAG: &str = "settings";

// ============================================================================
// HTTP
// ============================================================================

/// Response header carrying the menu server version
pub const MENU_VERSION_HEADER: &str = "x-menu-version";

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:3000";
