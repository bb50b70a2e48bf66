//! Generic utility primitives with zero domain knowledge.
//!
//! - `base_path` - Remote path joining utilities
//! - `io` - Local file I/O with consistent error handling
//! - `shell` - Shell escaping and quoting
//! - `template` - String template rendering

pub mod base_path;
pub mod io;
pub mod shell;
pub(crate) mod template;
