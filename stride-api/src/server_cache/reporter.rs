//! Error-reporting side channel.
//!
//! Upstream trouble never reaches the HTTP response, so it is reported here
//! instead. Reporting is fire-and-forget: a reporter that panics is caught
//! and logged, never propagated into the request.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

/// Report severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A structured report sent to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub context: Value,
}

impl ErrorReport {
    pub fn warning(code: &'static str, message: impl Into<String>, context: Value) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, context: Value) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            context,
        }
    }
}

/// External error-reporting sink.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: ErrorReport);
}

/// Reporter that writes to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, report: ErrorReport) {
        match report.severity {
            Severity::Warning => warn!(
                code = report.code,
                context = %report.context,
                "{}", report.message
            ),
            Severity::Error => error!(
                code = report.code,
                context = %report.context,
                "{}", report.message
            ),
        }
    }
}

/// Hand `report` to `reporter`, swallowing any panic.
pub fn report_quietly(reporter: &dyn ErrorReporter, report: ErrorReport) {
    let code = report.code;
    if catch_unwind(AssertUnwindSafe(|| reporter.report(report))).is_err() {
        warn!(code, "Error reporter panicked; report dropped");
    }
}
