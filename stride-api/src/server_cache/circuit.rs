//! Per-fetcher circuit breaker.
//!
//! Counts consecutive upstream failures and short-circuits calls while the
//! threshold is reached and the last failure is inside the cooldown window.
//! Once the cooldown has elapsed the counter is reset and the next call is a
//! trial against the real fetcher.
//!
//! Successful calls do not reset the counter. Only an elapsed cooldown does,
//! so intermittent failures (4 failures, 1 success, 1 failure) still open the
//! circuit.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stride_core::{Clock, TimestampMs};
use tracing::{debug, info};

use crate::constants::{DEFAULT_CIRCUIT_COOLDOWN_MS, DEFAULT_CIRCUIT_FAILURE_THRESHOLD};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CircuitState {
    /// Calls reach the fetcher.
    Closed,
    /// Calls get the fallback without touching the fetcher.
    Open,
    /// Cooldown elapsed; the next call is a trial.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "halfOpen",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            cooldown: Duration::from_millis(DEFAULT_CIRCUIT_COOLDOWN_MS),
        }
    }
}

/// Circuit breaker for one cached fetcher.
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    last_failure_at: RwLock<Option<TimestampMs>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            last_failure_at: RwLock::new(None),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn last_failure_at(&self) -> Option<TimestampMs> {
        match self.last_failure_at.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn cooldown_ms(&self) -> i64 {
        i64::try_from(self.config.cooldown.as_millis()).unwrap_or(i64::MAX)
    }

    fn cooldown_elapsed(&self, now: TimestampMs) -> bool {
        match self.last_failure_at() {
            Some(last) => now.saturating_sub(last) >= self.cooldown_ms(),
            None => true,
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.failure_count() < self.config.failure_threshold {
            return CircuitState::Closed;
        }
        if self.cooldown_elapsed(self.clock.now_ms()) {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Decide whether this call may reach the fetcher.
    ///
    /// Returns `false` while open. When the cooldown has elapsed since the
    /// last failure, the failure count is reset before admitting the call.
    /// Successful calls never reset the count.
    pub fn is_allowed(&self) -> bool {
        let failures = self.failure_count();
        if failures == 0 {
            return true;
        }

        if self.cooldown_elapsed(self.clock.now_ms()) {
            self.failure_count.store(0, Ordering::SeqCst);
            if failures >= self.config.failure_threshold {
                info!(failures, "Circuit cooldown elapsed; allowing trial call");
            } else {
                debug!(failures, "Failure count reset after cooldown");
            }
            return true;
        }

        failures < self.config.failure_threshold
    }

    /// Record a failed or timed-out call. Returns the new consecutive count.
    pub fn record_failure(&self) -> u32 {
        let now = self.clock.now_ms();
        match self.last_failure_at.write() {
            Ok(mut guard) => *guard = Some(now),
            Err(poisoned) => *poisoned.into_inner() = Some(now),
        }
        self.failure_count.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .field("last_failure_at", &self.last_failure_at())
            .finish()
    }
}
