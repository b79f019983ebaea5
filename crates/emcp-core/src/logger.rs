//! Protocol-level logger
//!
//! Messages are written to `tracing` and, when they pass the level selected by
//! the client through `logging/setLevel`, published to subscribers so the
//! transport can forward them as `notifications/message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffered messages per subscriber before the oldest are dropped
const CHANNEL_CAPACITY: usize = 256;

/// Syslog-style severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Notice = 2,
    Warning = 3,
    Error = 4,
    Critical = 5,
    Alert = 6,
    Emergency = 7,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Notice,
            3 => Self::Warning,
            4 => Self::Error,
            5 => Self::Critical,
            6 => Self::Alert,
            _ => Self::Emergency,
        }
    }
}

/// Payload of a `notifications/message` notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

struct LoggerInner {
    name: String,
    min_level: AtomicU8,
    sender: broadcast::Sender<LogMessage>,
}

/// Cloneable handle; all clones share level and subscribers
#[derive(Clone)]
pub struct McpLogger {
    inner: Arc<LoggerInner>,
}

impl McpLogger {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(LoggerInner {
                name: name.into(),
                min_level: AtomicU8::new(LogLevel::Info as u8),
                sender,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.min_level.load(Ordering::Relaxed))
    }

    /// Minimum level forwarded to subscribers
    pub fn set_level(&self, level: LogLevel) {
        self.inner.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogMessage> {
        self.inner.sender.subscribe()
    }

    /// Log `message` with optional structured `data` (pass `Value::Null` for none)
    pub fn log(&self, level: LogLevel, message: &str, data: Value) {
        match level {
            LogLevel::Debug => tracing::debug!(logger = %self.inner.name, data = %data, "{}", message),
            LogLevel::Info | LogLevel::Notice => {
                tracing::info!(logger = %self.inner.name, data = %data, "{}", message)
            }
            LogLevel::Warning => tracing::warn!(logger = %self.inner.name, data = %data, "{}", message),
            _ => tracing::error!(logger = %self.inner.name, data = %data, "{}", message),
        }

        if level < self.level() {
            return;
        }

        let data = if data.is_null() {
            Value::String(message.to_string())
        } else {
            serde_json::json!({ "message": message, "data": data })
        };
        // No subscribers is fine: nobody is listening yet.
        let _ = self.inner.sender.send(LogMessage {
            level,
            logger: Some(self.inner.name.clone()),
            data,
        });
    }

    pub fn debug(&self, message: &str, data: Value) {
        self.log(LogLevel::Debug, message, data);
    }

    pub fn info(&self, message: &str, data: Value) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn notice(&self, message: &str, data: Value) {
        self.log(LogLevel::Notice, message, data);
    }

    pub fn warning(&self, message: &str, data: Value) {
        self.log(LogLevel::Warning, message, data);
    }

    pub fn error(&self, message: &str, data: Value) {
        self.log(LogLevel::Error, message, data);
    }

    pub fn critical(&self, message: &str, data: Value) {
        self.log(LogLevel::Critical, message, data);
    }

    pub fn alert(&self, message: &str, data: Value) {
        self.log(LogLevel::Alert, message, data);
    }

    pub fn emergency(&self, message: &str, data: Value) {
        self.log(LogLevel::Emergency, message, data);
    }
}

impl std::fmt::Debug for McpLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpLogger")
            .field("name", &self.inner.name)
            .field("level", &self.level())
            .finish()
    }
}
