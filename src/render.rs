//! AI help fragment rendering and injection.

use std::path::{Path, PathBuf};

/// Placeholder replaced with the (escaped) explanation text
pub const PLACEHOLDER: &str = "{{ ai_help }}";

/// Text rendered when the response carries no exception record
pub const NO_EXCEPTION_INFO: &str = "No exception info available.";

const BODY_TAG: &[u8] = b"<body>";

const EMBEDDED_TEMPLATE: &str = include_str!("../templates/ai_help.html");

/// Error types for template operations
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to read template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template {0} does not contain the {{{{ ai_help }}}} placeholder")]
    MissingPlaceholder(String),
}

/// HTML fragment template with a single interpolated value
#[derive(Debug, Clone)]
pub struct AiHelpTemplate {
    name: String,
    source: String,
}

impl AiHelpTemplate {
    /// The template bundled with the crate
    pub fn embedded() -> Self {
        Self::from_source("ai_help.html", EMBEDDED_TEMPLATE)
    }

    /// Build a template from an in-memory string
    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Read a template from disk
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let source = std::fs::read_to_string(path).map_err(|source| RenderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_source(path.display().to_string(), source))
    }

    /// Render the fragment with `text` interpolated
    pub fn render(&self, text: &str) -> Result<String, RenderError> {
        if !self.source.contains(PLACEHOLDER) {
            return Err(RenderError::MissingPlaceholder(self.name.clone()));
        }
        Ok(self.source.replace(PLACEHOLDER, &escape_html(text)))
    }
}

impl Default for AiHelpTemplate {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Escape text for inclusion in HTML element content or attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Insert `fragment` right after the first literal `<body>` tag.
///
/// Returns `None` when the body has no `<body>` tag.
pub fn inject_fragment(body: &[u8], fragment: &str) -> Option<Vec<u8>> {
    let pos = body
        .windows(BODY_TAG.len())
        .position(|window| window == BODY_TAG)?;
    let split = pos + BODY_TAG.len();

    let mut out = Vec::with_capacity(body.len() + fragment.len());
    out.extend_from_slice(&body[..split]);
    out.extend_from_slice(fragment.as_bytes());
    out.extend_from_slice(&body[split..]);
    Some(out)
}
