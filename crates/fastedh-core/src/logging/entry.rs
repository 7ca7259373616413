//! Log entry type for JSONL-based logging.
//!
//! Each entry is a self-contained JSON object, so several browsing contexts
//! can append to their own files without coordinating.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single log entry in JSONL format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonLogEntry {
    /// ISO 8601 timestamp (e.g., "2026-10-17T14:30:45.123Z")
    pub ts: String,

    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Label of the browsing context that logged (e.g., "tab-1", "cli")
    pub context: String,

    /// Module path / target (e.g., "fastedh_core::timer")
    pub target: String,

    /// Human-readable message
    pub msg: String,

    /// Structured fields attached to the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,

    /// Enclosing span path, outermost first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

impl JsonLogEntry {
    /// Create a new log entry with the current timestamp.
    pub fn new(
        level: impl Into<String>,
        context: impl Into<String>,
        target: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: level.into(),
            context: context.into(),
            target: target.into(),
            msg: msg.into(),
            fields: None,
            span: None,
        }
    }

    pub fn with_fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_serialization() {
        let entry = JsonLogEntry::new("info", "tab-1", "fastedh_core::timer", "Timer started");

        let json = entry.to_json_line().unwrap();
        assert!(json.contains("\"level\":\"info\""));
        assert!(json.contains("\"context\":\"tab-1\""));
        assert!(!json.contains("\"span\""));

        let parsed = JsonLogEntry::from_json_line(&json).unwrap();
        assert_eq!(parsed.context, "tab-1");
        assert_eq!(parsed.msg, "Timer started");
    }

    #[test]
    fn test_log_entry_with_fields() {
        let entry = JsonLogEntry::new("debug", "tab-2", "fastedh_core::cell", "Applied peer update")
            .with_fields(serde_json::json!({ "key": "life-1" }));

        let json = entry.to_json_line().unwrap();
        assert!(json.contains("\"key\":\"life-1\""));
    }
}
