//! Human and JSON output
//!
//! JSON goes to stdout as a single pretty-printed document per command;
//! errors go to stderr in both modes.

use comfy_table::presets::{NOTHING, UTF8_FULL_CONDENSED};
use comfy_table::{ContentArrangement, Table};
use console::Style;
use serde::Serialize;

use super::OutputConfig;

/// Styles for the pieces of human output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Folder records in listings
    pub folder: Style,
    pub size: Style,
    pub date: Style,
    pub key: Style,
    pub url: Style,
    /// Account and bucket names
    pub name: Style,
    /// Hide markers and other non-file records
    pub muted: Style,
    pub success: Style,
    pub error: Style,
    pub warning: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            folder: Style::new().blue().bold(),
            size: Style::new().green(),
            date: Style::new().dim(),
            key: Style::new().cyan(),
            url: Style::new().cyan().underlined(),
            name: Style::new().bold(),
            muted: Style::new().dim().italic(),
            success: Style::new().green(),
            error: Style::new().red(),
            warning: Style::new().yellow(),
        }
    }
}

impl Theme {
    /// No styling at all
    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            folder: none.clone(),
            size: none.clone(),
            date: none.clone(),
            key: none.clone(),
            url: none.clone(),
            name: none.clone(),
            muted: none.clone(),
            success: none.clone(),
            error: none.clone(),
            warning: none,
        }
    }
}

/// Prints command output according to an [`OutputConfig`]
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    theme: Theme,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let theme = if config.no_color || config.json {
            Theme::plain()
        } else {
            Theme::default()
        };
        Self { config, theme }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Progress bars only make sense for an interactive human reader
    pub fn show_progress(&self) -> bool {
        !self.config.quiet && !self.config.json && console::Term::stderr().is_term()
    }

    pub fn style_folder(&self, text: &str) -> String {
        self.theme.folder.apply_to(text).to_string()
    }

    pub fn style_size(&self, text: &str) -> String {
        self.theme.size.apply_to(text).to_string()
    }

    pub fn style_date(&self, text: &str) -> String {
        self.theme.date.apply_to(text).to_string()
    }

    pub fn style_key(&self, text: &str) -> String {
        self.theme.key.apply_to(text).to_string()
    }

    pub fn style_url(&self, text: &str) -> String {
        self.theme.url.apply_to(text).to_string()
    }

    pub fn style_name(&self, text: &str) -> String {
        self.theme.name.apply_to(text).to_string()
    }

    pub fn style_muted(&self, text: &str) -> String {
        self.theme.muted.apply_to(text).to_string()
    }

    /// Confirmation line; JSON mode reports success through the exit code
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", self.theme.success.apply_to("✓"));
    }

    /// Print an error. Never suppressed, not even by `--quiet`.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let body = serde_json::json!({ "error": message });
            match serde_json::to_string_pretty(&body) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{message}"),
            }
        } else {
            eprintln!("{} {message}", self.theme.error.apply_to("✗"));
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("{} {message}", self.theme.warning.apply_to("!"));
    }

    /// Print `value` as the command's JSON document
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    /// A table with the given header, bordered only when styling is on
    pub fn table(&self, header: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(if self.colors_enabled() {
                UTF8_FULL_CONDENSED
            } else {
                NOTHING
            })
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header.iter().copied());
        table
    }

    pub fn print_table(&self, table: &Table) {
        self.println(&table.to_string());
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

/// Size in binary units, e.g. `1.50 KiB`
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Upload time in UTC with second precision
pub fn format_timestamp(ts: jiff::Timestamp) -> String {
    ts.strftime("%Y-%m-%d %H:%M:%S UTC").to_string()
}
