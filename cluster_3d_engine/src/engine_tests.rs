//! Unit tests for the Engine logging entry point
//!
//! IMPORTANT: the logger is a process-wide slot shared across all tests.
//! All tests are marked with #[serial] to avoid interleaving.

use crate::cluster3d::Engine;
use crate::cluster3d::log::{Logger, LogEntry, LogSeverity};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Source prefix owned by these tests (other tests may log concurrently)
const SOURCE: &str = "cluster3d::engine_test";

/// Test logger that captures this module's log entries for verification
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.source.starts_with(SOURCE) {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

fn install_capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: Arc::clone(&entries) });
    entries
}

// ============================================================================
// LOGGER SLOT TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_receives_macro_output() {
    let entries = install_capture();

    crate::engine_info!(SOURCE, "uploaded {} bytes", 36);

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].source, SOURCE);
    assert_eq!(captured[0].message, "uploaded 36 bytes");
    assert!(captured[0].file.is_none());
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_error_carries_location() {
    let entries = install_capture();

    crate::engine_error!(SOURCE, "device lost");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert!(captured[0].file.unwrap().ends_with("engine_tests.rs"));
    assert!(captured[0].line.is_some());
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let entries = install_capture();
    Engine::set_min_severity(LogSeverity::Warn);

    crate::engine_debug!(SOURCE, "dropped");
    crate::engine_info!(SOURCE, "dropped too");
    crate::engine_warn!(SOURCE, "kept");
    crate::engine_error!(SOURCE, "kept as well");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].message, "kept");
    drop(captured);

    Engine::reset_logger();
    assert_eq!(Engine::min_severity(), LogSeverity::Trace);
}

#[test]
#[serial]
fn test_reset_logger_detaches_capture() {
    let entries = install_capture();
    Engine::reset_logger();

    crate::engine_info!(SOURCE, "goes to the console");

    assert!(entries.lock().unwrap().is_empty());
}

#[test]
#[serial]
fn test_engine_err_logs_and_returns() {
    let entries = install_capture();

    let err = crate::engine_err!("cluster3d::engine_test::vulkan", "Failed to reset fence: {}", "ERROR_DEVICE_LOST");

    assert!(format!("{}", err).contains("ERROR_DEVICE_LOST"));
    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].source, "cluster3d::engine_test::vulkan");
    drop(captured);

    Engine::reset_logger();
}
