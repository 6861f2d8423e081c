//! Process-wide diagnostics and output formatting.
//!
//! Diagnostics go to stderr and honour the configured [`Verbosity`]; command outcomes are
//! rendered by callers (usually as label/value blocks) and printed on stdout.

use std::io::IsTerminal;
use std::sync::RwLock;

use colored::Colorize;
use flow_kernel::ports::EventSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Info,
    Debug,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn threshold(self) -> Verbosity {
        match self {
            LogLevel::Error => Verbosity::Quiet,
            LogLevel::Warn => Verbosity::Normal,
            LogLevel::Info => Verbosity::Info,
            LogLevel::Debug => Verbosity::Debug,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    pub verbosity: Verbosity,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            stdout_is_tty: std::io::stdout().is_terminal(),
            stderr_is_tty: std::io::stderr().is_terminal(),
        }
    }
}

lazy_static::lazy_static! {
    static ref DISPLAY_CONFIG: RwLock<DisplayConfig> = RwLock::new(DisplayConfig::default());
}

pub fn set_display_config(config: DisplayConfig) {
    if let Ok(mut guard) = DISPLAY_CONFIG.write() {
        *guard = config;
    }
    colored::control::set_override(config.stderr_is_tty && config.stdout_is_tty);
}

pub fn get_display_config() -> DisplayConfig {
    DISPLAY_CONFIG
        .read()
        .map(|guard| *guard)
        .unwrap_or_default()
}

/// Whether a message at `level` is shown under `verbosity`.
pub fn should_emit(level: LogLevel, verbosity: Verbosity) -> bool {
    verbosity >= level.threshold()
}

fn render(level: LogLevel, message: &str) -> String {
    let prefix = format!("{}:", level.label());
    let prefix = match level {
        LogLevel::Error => prefix.red().bold(),
        LogLevel::Warn => prefix.yellow().bold(),
        LogLevel::Info => prefix.blue(),
        LogLevel::Debug => prefix.dimmed(),
    };
    format!("{prefix} {message}")
}

pub fn emit(level: LogLevel, message: impl AsRef<str>) {
    let config = get_display_config();
    if should_emit(level, config.verbosity) {
        eprintln!("{}", render(level, message.as_ref()));
    }
}

pub fn error(message: impl AsRef<str>) {
    emit(LogLevel::Error, message);
}

pub fn warn(message: impl AsRef<str>) {
    emit(LogLevel::Warn, message);
}

pub fn info(message: impl AsRef<str>) {
    emit(LogLevel::Info, message);
}

pub fn debug(message: impl AsRef<str>) {
    emit(LogLevel::Debug, message);
}

/// Plain stderr line shown at normal verbosity; used for progress the user expects to see.
pub fn note(message: impl AsRef<str>) {
    if get_display_config().verbosity >= Verbosity::Normal {
        eprintln!("{}", message.as_ref());
    }
}

/// Align `label: value` rows under a common label width.
pub fn format_label_value_block(rows: &[(String, String)], indent: usize) -> String {
    let width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let pad = " ".repeat(indent);

    rows.iter()
        .map(|(label, value)| {
            let label = format!("{label}:");
            format!("{pad}{label:<width$} {value}", width = width + 1)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_number(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Routes engine events into the display.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplaySink;

impl EventSink for DisplaySink {
    fn info(&self, message: &str) {
        note(message);
    }

    fn warn(&self, message: &str) {
        warn(message);
    }

    fn progress(&self, message: &str) {
        info(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_gates_levels() {
        assert!(should_emit(LogLevel::Error, Verbosity::Quiet));
        assert!(!should_emit(LogLevel::Warn, Verbosity::Quiet));
        assert!(should_emit(LogLevel::Warn, Verbosity::Normal));
        assert!(!should_emit(LogLevel::Info, Verbosity::Normal));
        assert!(should_emit(LogLevel::Info, Verbosity::Info));
        assert!(should_emit(LogLevel::Debug, Verbosity::Debug));
    }

    #[test]
    fn label_value_block_aligns_values() {
        let rows = vec![
            ("Branch".to_string(), "feature/login".to_string()),
            ("Merged into".to_string(), "develop".to_string()),
        ];
        let block = format_label_value_block(&rows, 2);
        let lines: Vec<_> = block.lines().collect();
        assert_eq!(lines[0], "  Branch:      feature/login");
        assert_eq!(lines[1], "  Merged into: develop");
    }

    #[test]
    fn numbers_group_thousands() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
