//! Telemetry for the sink binaries and tests.

pub mod tracing;
