//! Tracing/logging setup shared by binaries and test harnesses.

/// Logging configuration (format selection from the environment).
pub mod config;

/// Tracing subscriber installation.
pub mod tracing;

pub use config::{LogConfig, LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&LogConfig::from_env());
}
