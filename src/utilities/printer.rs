//! Console printer with ANSI color support for the CLI.

use serde::{Deserialize, Serialize};

/// Available colors for printed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterColor {
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
    Dim,
    BoldRed,
    BoldGreen,
    BoldYellow,
    BoldCyan,
    BoldWhite,
}

impl PrinterColor {
    fn ansi_code(&self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Blue => "\x1b[34m",
            Self::Cyan => "\x1b[36m",
            Self::Dim => "\x1b[2m",
            Self::BoldRed => "\x1b[1;31m",
            Self::BoldGreen => "\x1b[1;32m",
            Self::BoldYellow => "\x1b[1;33m",
            Self::BoldCyan => "\x1b[1;36m",
            Self::BoldWhite => "\x1b[1;37m",
        }
    }

    /// Map a score-band name ("green", "yellow", "red") to a bold color.
    pub fn for_band(band: &str) -> Self {
        match band {
            "green" => Self::BoldGreen,
            "yellow" => Self::BoldYellow,
            _ => Self::BoldRed,
        }
    }
}

const RESET: &str = "\x1b[0m";

/// A piece of colored text.
pub struct ColoredText {
    pub text: String,
    pub color: PrinterColor,
}

impl ColoredText {
    pub fn new(text: impl Into<String>, color: PrinterColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Printer for console output.
///
/// Color codes are dropped when `plain` is set (e.g. `NO_COLOR`).
#[derive(Debug, Clone, Default)]
pub struct Printer {
    plain: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            plain: std::env::var_os("NO_COLOR").is_some(),
        }
    }

    pub fn plain() -> Self {
        Self { plain: true }
    }

    /// Render a message in the given color without printing it.
    pub fn paint(&self, content: &str, color: PrinterColor) -> String {
        if self.plain {
            content.to_string()
        } else {
            format!("{}{}{}", color.ansi_code(), content, RESET)
        }
    }

    pub fn print(&self, content: &str, color: PrinterColor) {
        println!("{}", self.paint(content, color));
    }

    /// Print multiple colored segments on a single line.
    pub fn print_colored(&self, segments: &[ColoredText]) {
        let line: String = segments
            .iter()
            .map(|s| self.paint(&s.text, s.color))
            .collect();
        println!("{}", line);
    }

    /// Print a boxed section title.
    pub fn heading(&self, title: &str) {
        let rule = "=".repeat(title.chars().count().max(40));
        self.print(&rule, PrinterColor::Cyan);
        self.print(title, PrinterColor::BoldCyan);
        self.print(&rule, PrinterColor::Cyan);
    }

    pub fn success(&self, message: &str) {
        self.print(&format!("✓ {}", message), PrinterColor::BoldGreen);
    }

    pub fn warning(&self, message: &str) {
        self.print(&format!("⚠ {}", message), PrinterColor::BoldYellow);
    }

    /// Errors go to stderr.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.paint(&format!("✗ {}", message), PrinterColor::BoldRed));
    }

    pub fn info(&self, message: &str) {
        self.print(message, PrinterColor::Dim);
    }

    /// Print a `label: value` line with the label highlighted.
    pub fn field(&self, label: &str, value: &str) {
        self.print_colored(&[
            ColoredText::new(format!("{}: ", label), PrinterColor::BoldWhite),
            ColoredText::new(value, PrinterColor::Blue),
        ]);
    }
}
