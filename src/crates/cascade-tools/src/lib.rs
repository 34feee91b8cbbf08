//! Built-in tools for the cascade workflow engine.
//!
//! Each module contributes one or two registry entries implementing the
//! `Tool` trait from `cascade-core`. All built-ins register as factories:
//! the engine constructs them per dispatch from the step's `config` input
//! merged with the engine's auth configuration.
//!
//! # Tools
//!
//! | Name | Purpose |
//! |------|---------|
//! | `http_request` | Send an HTTP request, capture status/headers/body |
//! | `file_read` / `file_write` | Text file I/O, confined to a configured root |
//! | `issue_tracker` | Create issues and comments (Jira-style REST) |
//! | `chat_message` | Post to a chat webhook |
//! | `run_command` | Run a local process, capture exit/stdout/stderr |
//!
//! # Example Usage
//!
//! ```rust
//! use cascade_core::ToolRegistry;
//!
//! let mut registry = ToolRegistry::new();
//! cascade_tools::register_builtins(&mut registry);
//!
//! assert!(registry.has_tool("http_request"));
//! assert!(registry.has_tool("issue_tracker"));
//! ```

pub mod chat;
pub mod fs;
pub mod http;
pub mod issues;
pub mod process;

mod config;

pub use config::AuthConfig;

use cascade_core::ToolRegistry;

/// Register every built-in tool.
///
/// Registration overwrites entries with the same names, so callers can
/// re-register a built-in with a custom replacement afterwards.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(http::entry());
    registry.register(fs::read_entry());
    registry.register(fs::write_entry());
    registry.register(issues::entry());
    registry.register(chat::entry());
    registry.register(process::entry());
}
