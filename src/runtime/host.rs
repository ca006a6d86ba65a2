use crate::ast::Value;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a component instance in log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLabel {
    pub flow: String,
    pub component: String,
    pub kind: String,
}

impl fmt::Display for ComponentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.flow, self.component, self.kind)
    }
}

/// Services the runtime delegates to its embedding application.
pub trait RuntimeHost {
    fn read_setting(&mut self, key: &str) -> Option<Value>;

    fn write_setting(&mut self, key: &str, value: Value);

    fn log_info(&mut self, value: &Value, component: &ComponentLabel);

    /// Receives every error the runtime recovers from or gives up on.
    fn log_error(&mut self, message: &str, component: &ComponentLabel);

    fn show_page(&mut self, page: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub message: String,
    pub component: ComponentLabel,
}

/// In-memory host used by the CLI and the tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    pub settings: AHashMap<String, Value>,
    pub logs: Vec<LogEntry>,
    pub errors: Vec<LogEntry>,
    pub pages_shown: Vec<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Messages passed to `log_info`, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.logs.iter().map(|l| l.message.as_str()).collect()
    }
}

impl RuntimeHost for MemoryHost {
    fn read_setting(&mut self, key: &str) -> Option<Value> {
        self.settings.get(key).cloned()
    }

    fn write_setting(&mut self, key: &str, value: Value) {
        self.settings.insert(key.to_string(), value);
    }

    fn log_info(&mut self, value: &Value, component: &ComponentLabel) {
        self.logs.push(LogEntry {
            message: value.to_string(),
            component: component.clone(),
        });
    }

    fn log_error(&mut self, message: &str, component: &ComponentLabel) {
        self.errors.push(LogEntry {
            message: message.to_string(),
            component: component.clone(),
        });
    }

    fn show_page(&mut self, page: &str) {
        self.pages_shown.push(page.to_string());
    }
}
