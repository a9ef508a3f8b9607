//! Stride Telemetry - Logging Infrastructure
//!
//! Structured logging through `tracing`, configured from the environment.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
