//! Backtrace frame parsing and source context extraction.
//!
//! This module turns a single backtrace frame (`path:line`, optionally
//! followed by more text) into a source location, and reads a fixed window
//! of lines around that location so the completion prompt can show the code
//! that failed. Nothing here returns an error: unparseable frames degrade to
//! an unknown location and unreadable files degrade to a fixed message.

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Returned when the frame has no usable path or the file does not exist
pub const SOURCE_UNAVAILABLE: &str = "Source code not available";

/// Returned when the file exists but could not be read
pub const SOURCE_UNREADABLE: &str = "Unable to fetch source code";

/// `path:line` followed by end of input, another `:` (column, Ruby's `:in`)
/// or whitespace. The path is matched lazily so `file.rs:12:5` keeps `12`.
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+)(?:[:\s]|$)").expect("location pattern is valid")
});

// ============================================================================
// Source Location
// ============================================================================

/// File and line a backtrace frame points at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path as written in the frame
    pub file: Option<PathBuf>,
    /// 1-based line number
    pub line: Option<u32>,
}

impl SourceLocation {
    /// A location with neither file nor line
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Create a location from a path and line
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
        }
    }

    /// Whether both file and line are present
    pub fn is_known(&self) -> bool {
        self.file.is_some() && self.line.is_some()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}", file.display(), line),
            (Some(file), None) => write!(f, "{}", file.display()),
            _ => write!(f, "<unknown>"),
        }
    }
}

/// Parse a backtrace frame of the form `<path>:<line>[...]`.
///
/// Any other shape yields [`SourceLocation::unknown`].
pub fn parse_location(frame: &str) -> SourceLocation {
    let Some(caps) = LOCATION_RE.captures(frame.trim()) else {
        return SourceLocation::unknown();
    };

    match caps[2].parse::<u32>() {
        Ok(line) => SourceLocation::new(&caps[1], line),
        Err(_) => SourceLocation::unknown(),
    }
}

// ============================================================================
// Source Window
// ============================================================================

/// Read the lines surrounding `line` from `path`.
///
/// The window covers 0-based indices `[line - context - 1, line + context - 1]`
/// clamped to the file, and the lines are returned concatenated with their
/// original terminators.
pub fn read_window(path: Option<&Path>, line: Option<u32>, context: usize) -> String {
    let (Some(path), Some(line)) = (path, line) else {
        return SOURCE_UNAVAILABLE.to_string();
    };
    if !path.exists() {
        return SOURCE_UNAVAILABLE.to_string();
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return SOURCE_UNREADABLE.to_string(),
    };
    let contents = String::from_utf8_lossy(&bytes);

    let lines: Vec<&str> = contents.split_inclusive('\n').collect();
    if lines.is_empty() {
        return String::new();
    }

    let line = line as usize;
    let last = lines.len() - 1;
    let start = line.saturating_sub(context.saturating_add(1)).min(last);
    let end = line.saturating_add(context).saturating_sub(1).min(last);

    lines[start..=end].concat()
}

/// Configuration for source context extraction
#[derive(Debug, Clone)]
pub struct SourceContextConfig {
    /// Number of lines to show before and after the error line
    pub context_lines: usize,
    /// Root path for resolving relative file paths
    pub context_root: Option<PathBuf>,
}

impl Default for SourceContextConfig {
    fn default() -> Self {
        Self {
            context_lines: 5,
            context_root: None,
        }
    }
}

/// A located frame together with the source text around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWindow {
    pub location: SourceLocation,
    pub source: String,
}

/// Locate a frame and read its surrounding source
pub fn extract_frame_context(frame: &str, config: &SourceContextConfig) -> SourceWindow {
    let location = parse_location(frame);
    let resolved = location
        .file
        .as_deref()
        .and_then(|file| resolve_source_path(file, &config.context_root));

    let source = read_window(resolved.as_deref(), location.line, config.context_lines);

    SourceWindow { location, source }
}

/// Resolve a source file path, optionally prepending context_root
pub fn resolve_source_path(path: &Path, context_root: &Option<PathBuf>) -> Option<PathBuf> {
    if path.is_absolute() {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        // Container images commonly mount the project at /app
        if let Ok(stripped) = path.strip_prefix("/app") {
            let resolved = match context_root {
                Some(root) => root.join(stripped),
                None => PathBuf::from(".").join(stripped),
            };
            if resolved.exists() {
                return Some(resolved);
            }
        }
        return None;
    }

    let resolved = match context_root {
        Some(root) => root.join(path),
        None => PathBuf::from(".").join(path),
    };

    resolved.exists().then_some(resolved)
}

// ============================================================================
// Backtrace Frames
// ============================================================================

/// Extract `path:line:col` frames from a rendered `std::backtrace::Backtrace`.
///
/// Toolchain and dependency frames are dropped so the first entry is the
/// innermost frame of application code.
pub fn frames_from_backtrace(rendered: &str) -> Vec<String> {
    rendered
        .lines()
        .filter_map(|line| line.trim().strip_prefix("at "))
        .map(str::trim)
        .filter(|loc| !is_framework_path(loc))
        .map(String::from)
        .collect()
}

fn is_framework_path(path: &str) -> bool {
    path.contains(".cargo")
        || path.contains("/rustc/")
        || path.contains("/library/std/")
        || path.contains("/library/core/")
        || path.contains("/library/alloc/")
}

// ============================================================================
// Tests
// ============================================================================
