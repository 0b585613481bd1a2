//! Logger collaborator.
//!
//! Dispatch outcomes, registration changes and verification failures are
//! reported through a [`MockLogger`]. The default forwards to `tracing`.

use std::error::Error;

pub trait MockLogger: Send + Sync {
    fn log(&self, message: &str);

    fn error(&self, message: &str, cause: Option<&(dyn Error + 'static)>);
}

/// Forwards to `tracing` under the `rift_mock` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl MockLogger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "rift_mock", "{}", message);
    }

    fn error(&self, message: &str, cause: Option<&(dyn Error + 'static)>) {
        match cause {
            Some(cause) => tracing::error!(target: "rift_mock", "{}: {}", message, cause),
            None => tracing::error!(target: "rift_mock", "{}", message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl MockLogger for NoopLogger {
    fn log(&self, _message: &str) {}

    fn error(&self, _message: &str, _cause: Option<&(dyn Error + 'static)>) {}
}

/// Keeps every message in memory so unit tests can assert on them.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingLogger {
    messages: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingLogger {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.contains(needle))
    }
}

#[cfg(test)]
impl MockLogger for RecordingLogger {
    fn log(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }

    fn error(&self, message: &str, cause: Option<&(dyn Error + 'static)>) {
        let line = match cause {
            Some(cause) => format!("ERROR {}: {}", message, cause),
            None => format!("ERROR {}", message),
        };
        self.messages.lock().push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_tracing_logger_forwards_messages() {
        let logger = TracingLogger;
        logger.log("-> Request: GET /sample HTTP/1.1");
        let cause = std::io::Error::other("disk on fire");
        logger.error("mock file unreadable", Some(&cause));

        assert!(logs_contain("-> Request: GET /sample HTTP/1.1"));
        assert!(logs_contain("mock file unreadable: disk on fire"));
    }

    #[test]
    fn test_recording_logger_marks_errors() {
        let logger = RecordingLogger::default();
        logger.log("plain");
        logger.error("broken", Some(&std::io::Error::other("cause")));
        assert_eq!(logger.messages(), ["plain", "ERROR broken: cause"]);
    }

    #[test]
    fn test_noop_logger() {
        NoopLogger.log("ignored");
        NoopLogger.error("ignored", None);
    }
}
