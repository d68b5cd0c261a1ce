//! Output handling
//!
//! Every command prints through a [`Formatter`], which decides between
//! human-readable text and JSON.

pub mod formatter;

pub use formatter::Formatter;

/// Output switches taken from the global flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Print JSON instead of text
    pub json: bool,
    /// Disable ANSI styling
    pub no_color: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}
