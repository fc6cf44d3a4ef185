//! ErrorGenie - inline AI help for development error pages
//!
//! This library provides a tower middleware that intercepts `500` HTML
//! responses in development mode, reads the source around the failing frame,
//! asks a chat-completion API what went wrong and injects the answer at the
//! top of the error page.

pub mod cli;
pub mod config;
pub mod context;
pub mod debug_page;
pub mod install;
pub mod middleware;
pub mod providers;
pub mod render;
pub mod stack_trace;

// Re-export commonly used types
pub use cli::Cli;
pub use config::{Config, Environment};
pub use context::ExceptionRecord;
pub use install::install;
pub use middleware::ErrorRendererLayer;
pub use providers::{Assistant, Provider, ProviderType};
pub use stack_trace::{parse_location, read_window, SourceLocation};
