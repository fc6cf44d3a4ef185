//! Exception context attached to failing responses.
//!
//! Handlers (or the debug page) attach an [`ExceptionRecord`] to the request
//! or response extensions; the error renderer reads it from there to build
//! the completion prompt.

use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::panic::Location;
use std::path::Path;

use crate::stack_trace::frames_from_backtrace;

/// The exception that produced a 500 response
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ExceptionRecord {
    /// Error type or exception class (e.g. `DatabaseError`, `panic`)
    pub kind: Option<String>,

    /// Human readable error message
    pub message: String,

    /// Frames, most recent first, each encoded as `path:line[...]`
    pub backtrace: Vec<String>,
}

impl ExceptionRecord {
    /// Create a record with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Capture a record at the caller's location.
    ///
    /// The first frame is always the call site; the remaining frames come
    /// from a forced backtrace with toolchain and dependency frames removed.
    #[track_caller]
    pub fn capture(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let caller = Location::caller();
        let mut backtrace = vec![format!(
            "{}:{}:{}",
            caller.file(),
            caller.line(),
            caller.column()
        )];
        backtrace.extend(frames_from_backtrace(&Backtrace::force_capture().to_string()));

        Self {
            kind: Some(kind.into()),
            message: message.into(),
            backtrace,
        }
    }

    /// Builder: set kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Builder: append a frame
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.backtrace.push(frame.into());
        self
    }

    /// Builder: replace the backtrace
    pub fn with_backtrace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backtrace = frames.into_iter().map(Into::into).collect();
        self
    }

    /// The innermost frame, if any
    pub fn first_frame(&self) -> Option<&str> {
        self.backtrace.first().map(String::as_str)
    }

    /// One-line description of the error
    pub fn summary(&self) -> String {
        error_summary(self.kind.as_deref(), &self.message)
    }
}

/// `An error occurred: {kind} - {message}`, or without the kind when absent
pub fn error_summary(kind: Option<&str>, message: &str) -> String {
    match kind {
        Some(kind) if !kind.is_empty() => format!("An error occurred: {} - {}", kind, message),
        _ => format!("An error occurred: {}", message),
    }
}

/// Format the user prompt sent to the completion provider
pub fn format_for_prompt(error_message: &str, file_path: Option<&Path>, source: &str) -> String {
    let file = file_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Error message: {}\nFile: {}\n\nSource code:\n{}\n\nExplain what caused this error and how to fix it.",
        error_message,
        file,
        source.trim_end()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_new() {
        let record = ExceptionRecord::new("boom");
        assert_eq!(record.message, "boom");
        assert!(record.kind.is_none());
        assert!(record.first_frame().is_none());
    }

    #[test]
    fn test_record_builder() {
        let record = ExceptionRecord::new("undefined method 'name' for nil")
            .with_kind("NoMethodError")
            .with_frame("/app/models/user.rb:42:in 'save'")
            .with_frame("/app/controllers/users_controller.rb:10:in 'create'");

        assert_eq!(record.kind.as_deref(), Some("NoMethodError"));
        assert_eq!(record.backtrace.len(), 2);
        assert_eq!(record.first_frame(), Some("/app/models/user.rb:42:in 'save'"));
    }

    #[test]
    fn test_record_with_backtrace_replaces() {
        let record = ExceptionRecord::new("x")
            .with_frame("old.rb:1")
            .with_backtrace(["a.rb:1", "b.rb:2"]);
        assert_eq!(record.backtrace, vec!["a.rb:1", "b.rb:2"]);
    }

    #[test]
    fn test_capture_starts_at_call_site() {
        let line = line!() + 1;
        let record = ExceptionRecord::capture("TestError", "captured");

        let first = record.first_frame().unwrap();
        assert!(first.starts_with(&format!("{}:{}:", file!(), line)));
        assert_eq!(record.kind.as_deref(), Some("TestError"));
    }

    #[test]
    fn test_summary() {
        let record = ExceptionRecord::new("connection refused").with_kind("DatabaseError");
        assert_eq!(
            record.summary(),
            "An error occurred: DatabaseError - connection refused"
        );
        assert_eq!(
            ExceptionRecord::new("oops").summary(),
            "An error occurred: oops"
        );
        assert_eq!(
            ExceptionRecord::new("oops").with_kind("").summary(),
            "An error occurred: oops"
        );
    }

    #[test]
    fn test_format_for_prompt() {
        let prompt = format_for_prompt(
            "undefined method 'name'",
            Some(Path::new("app/models/user.rb")),
            "def save\n  name.upcase\nend\n",
        );
        assert!(prompt.contains("Error message: undefined method 'name'"));
        assert!(prompt.contains("File: app/models/user.rb"));
        assert!(prompt.contains("name.upcase"));
    }

    #[test]
    fn test_format_for_prompt_without_file() {
        let prompt = format_for_prompt("boom", None, "Source code not available");
        assert!(prompt.contains("File: unknown"));
    }

    #[test]
    fn test_record_serialization() {
        let record = ExceptionRecord::new("boom").with_frame("a.rb:1");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"message\":\"boom\""));
        assert!(json.contains("a.rb:1"));
    }
}
