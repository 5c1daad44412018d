// ABOUTME: User-facing progress and result lines, separate from tracing diagnostics.
// ABOUTME: Normal, quiet and JSON-lines modes; every line can be attributed to a service key.

use serde::Serialize;
use std::time::Instant;

use crate::process;

/// How much the CLI tells the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress lines, tool output streamed to the terminal.
    Normal,
    /// Results and errors only.
    Quiet,
    /// One JSON object per line.
    Json,
}

/// Output context handed down to the pipeline instead of global verbosity state.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    service: Option<String>,
    started: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            service: None,
            started: None,
        }
    }

    /// Attribute events to a service key.
    pub fn for_service(mut self, key: impl Into<String>) -> Self {
        self.service = Some(key.into());
        self
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// How build and transfer tools should treat their own output.
    ///
    /// Only normal mode lets them write to the terminal; otherwise it is captured
    /// and surfaces only in error details.
    pub fn tool_output(&self) -> process::OutputMode {
        match self.mode {
            OutputMode::Normal => process::OutputMode::Inherit,
            OutputMode::Quiet | OutputMode::Json => process::OutputMode::Piped,
        }
    }

    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Seconds since `start_timer`, zero if it was never called.
    pub fn elapsed_secs(&self) -> f64 {
        self.started
            .map_or(0.0, |started| started.elapsed().as_secs_f64())
    }

    /// Normal mode only.
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    pub fn success(&self, message: &str) {
        match (self.mode, self.started) {
            (OutputMode::Json, _) => println!("{}", self.json_event("success", message)),
            (OutputMode::Normal, Some(_)) => {
                println!("{message} ({:.1}s)", self.elapsed_secs())
            }
            _ => println!("{message}"),
        }
    }

    pub fn warning(&self, message: &str) {
        self.to_stderr("warning", "Warning", message);
    }

    pub fn error(&self, message: &str) {
        self.to_stderr("error", "Error", message);
    }

    fn to_stderr(&self, event: &str, label: &str, message: &str) {
        if self.mode == OutputMode::Json {
            eprintln!("{}", self.json_event(event, message));
        } else {
            eprintln!("{label}: {message}");
        }
    }

    /// Render one JSON line. Serializing these plain fields cannot fail.
    fn json_event(&self, event: &str, message: &str) -> String {
        let event = JsonEvent {
            event,
            service: self.service(),
            message,
            duration_secs: self.started.map(|_| self.elapsed_secs()),
        };
        serde_json::to_string(&event).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_events_carry_service_key() {
        let output = Output::new(OutputMode::Json).for_service("api");
        let line = output.json_event("success", "deployed");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "success");
        assert_eq!(value["service"], "api");
        assert_eq!(value["message"], "deployed");
        assert!(value.get("duration_secs").is_none());
    }

    #[test]
    fn timed_events_report_duration() {
        let mut output = Output::new(OutputMode::Json);
        output.start_timer();
        let value: serde_json::Value =
            serde_json::from_str(&output.json_event("error", "build failed")).unwrap();
        assert!(value["duration_secs"].is_f64());
        assert!(value.get("service").is_none());
    }

    #[test]
    fn only_normal_mode_streams_tool_output() {
        assert_eq!(
            Output::new(OutputMode::Normal).tool_output(),
            process::OutputMode::Inherit
        );
        assert_eq!(
            Output::new(OutputMode::Quiet).tool_output(),
            process::OutputMode::Piped
        );
        assert_eq!(
            Output::new(OutputMode::Json).tool_output(),
            process::OutputMode::Piped
        );
    }
}
