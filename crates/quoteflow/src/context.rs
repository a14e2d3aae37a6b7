//! Run context and structured events.
//!
//! Components never log through an ambient logger. They receive a [`RunContext`] and emit
//! [`RunEvent`]s through it; the context forwards each event to its [`EventSink`] and keeps a
//! copy for the run report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Category of run events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Page loads, login, menus
    Navigation,
    /// Retried interactions
    Retry,
    /// Product search, add, edit
    Product,
    /// Accessory quantities
    Accessory,
    /// Snapshot capture
    Diagnostics,
    /// Workflow state transitions
    State,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigation => "navigation",
            Self::Retry => "retry",
            Self::Product => "product",
            Self::Accessory => "accessory",
            Self::Diagnostics => "diagnostics",
            Self::State => "state",
        };
        f.write_str(name)
    }
}

/// Level of run events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level
    Error,
}

/// A point-in-time occurrence during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Milliseconds since the run started
    pub timestamp_ms: u64,
    /// Event level
    pub level: EventLevel,
    /// Event category
    pub category: EventCategory,
    /// Event message
    pub message: String,
    /// Event attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl RunEvent {
    /// Create a new event
    #[must_use]
    pub fn new(level: EventLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms: 0,
            level,
            category,
            message: message.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let _ = self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Destination of run events
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn record(&self, event: &RunEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &RunEvent) {
        let category = event.category.to_string();
        let attributes = if event.attributes.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&event.attributes).unwrap_or_default()
        };
        let message = &event.message;
        match event.level {
            EventLevel::Debug => {
                tracing::debug!(category = %category, attributes = %attributes, "{message}");
            }
            EventLevel::Info => {
                tracing::info!(category = %category, attributes = %attributes, "{message}");
            }
            EventLevel::Warn => {
                tracing::warn!(category = %category, attributes = %attributes, "{message}");
            }
            EventLevel::Error => {
                tracing::error!(category = %category, attributes = %attributes, "{message}");
            }
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of one category
    #[must_use]
    pub fn by_category(&self, category: EventCategory) -> Vec<RunEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }

    /// Whether any event message contains `text`
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.message.contains(text))
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Explicit context passed to every component of a run
pub struct RunContext {
    sink: Arc<dyn EventSink>,
    history: RecordingSink,
    started: Instant,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl RunContext {
    /// Context emitting to `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            history: RecordingSink::new(),
            started: Instant::now(),
        }
    }

    /// Stamp, forward and keep an event
    pub fn emit(&self, mut event: RunEvent) {
        event.timestamp_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.sink.record(&event);
        self.history.record(&event);
    }

    /// Emit a debug event
    pub fn debug(&self, category: EventCategory, message: impl Into<String>) {
        self.emit(RunEvent::new(EventLevel::Debug, category, message));
    }

    /// Emit an info event
    pub fn info(&self, category: EventCategory, message: impl Into<String>) {
        self.emit(RunEvent::new(EventLevel::Info, category, message));
    }

    /// Emit a warning event
    pub fn warn(&self, category: EventCategory, message: impl Into<String>) {
        self.emit(RunEvent::new(EventLevel::Warn, category, message));
    }

    /// Emit an error event
    pub fn error(&self, category: EventCategory, message: impl Into<String>) {
        self.emit(RunEvent::new(EventLevel::Error, category, message));
    }

    /// Every event emitted so far
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.history.events()
    }
}
