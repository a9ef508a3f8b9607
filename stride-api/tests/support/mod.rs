//! Shared helpers for stride-api integration tests.

use std::sync::{Arc, Mutex};

use stride_api::{ErrorReport, ErrorReporter, ServerCache, ServerCacheConfig};
use stride_test_utils::ManualClock;

/// Reporter that keeps every report for later inspection.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ErrorReport>>,
}

impl RecordingReporter {
    pub fn codes(&self) -> Vec<&'static str> {
        self.reports.lock().unwrap().iter().map(|r| r.code).collect()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, report: ErrorReport) {
        self.reports.lock().unwrap().push(report);
    }
}

/// Reporter that always panics.
pub struct PanickingReporter;

impl ErrorReporter for PanickingReporter {
    fn report(&self, _report: ErrorReport) {
        panic!("reporting backend is down");
    }
}

/// A server cache driven by a manual clock, with its reporter and clock.
pub fn test_cache() -> (ServerCache, Arc<RecordingReporter>, Arc<ManualClock>) {
    let reporter = Arc::new(RecordingReporter::default());
    let clock = Arc::new(ManualClock::new(0));
    let cache = ServerCache::new(ServerCacheConfig::default(), reporter.clone(), clock.clone());
    (cache, reporter, clock)
}
