// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Human-readable lines or one JSON object per line for scripting.

use serde::Serialize;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Plain text for people
    Normal,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Print a text line (suppressed in json mode).
    pub fn line(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a record (json mode only).
    pub fn record<T: Serialize>(&self, value: &T) {
        if self.mode == OutputMode::Json {
            if let Ok(json) = serde_json::to_string(value) {
                println!("{json}");
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = ErrorEvent {
                    event: "error",
                    message,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorEvent<'a> {
    event: &'a str,
    message: &'a str,
}
