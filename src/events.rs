//! Structured events emitted by the core.
//!
//! The core performs no logging of its own. Every operation that can produce a
//! diagnostic takes an `emit: &mut dyn FnMut(CoreEvent)` callback; front ends
//! forward events into whatever logger they use.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    Info { message: String },
    Warning { message: String },
    Error { message: String },
}

impl CoreEvent {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::Info { .. } => EventLevel::Info,
            Self::Warning { .. } => EventLevel::Warning,
            Self::Error { .. } => EventLevel::Error,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Info { message } | Self::Warning { message } | Self::Error { message } => {
                message
            }
        }
    }
}

impl fmt::Display for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.level() {
            EventLevel::Info => "info",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
        };
        write!(f, "{label}: {}", self.message())
    }
}

/// Collecting sink for callers that inspect events after the fact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<CoreEvent>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    /// Returns a callback that appends to this log.
    pub fn sink(&mut self) -> impl FnMut(CoreEvent) + '_ {
        move |event| self.events.push(event)
    }

    #[must_use]
    pub fn events(&self) -> &[CoreEvent] {
        &self.events
    }

    #[must_use]
    pub fn count(&self, level: EventLevel) -> usize {
        self.events
            .iter()
            .filter(|event| event.level() == level)
            .count()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|event| event.level() == EventLevel::Warning)
            .map(CoreEvent::message)
            .collect()
    }

    pub fn drain(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events)
    }
}
