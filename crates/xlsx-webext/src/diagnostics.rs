use std::fmt;

use log::Level;

/// Steps of [`crate::remove_descriptors`], used to attribute diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStep {
    Enumerate,
    DeleteParts,
    RemoveSubtree,
    Taskpanes,
    ContentTypes,
    RootRelationships,
}

impl RemovalStep {
    pub fn as_str(self) -> &'static str {
        match self {
            RemovalStep::Enumerate => "enumerate",
            RemovalStep::DeleteParts => "delete-parts",
            RemovalStep::RemoveSubtree => "remove-subtree",
            RemovalStep::Taskpanes => "taskpanes",
            RemovalStep::ContentTypes => "content-types",
            RemovalStep::RootRelationships => "root-relationships",
        }
    }
}

impl fmt::Display for RemovalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub level: Level,
    pub step: RemovalStep,
    pub message: String,
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.step, self.message)
    }
}

/// Per-request sink for events raised while editing a package.
///
/// Every event is kept (so callers can report them) and forwarded to the `log` facade with the
/// request label, so concurrent requests stay distinguishable in a shared log stream.
#[derive(Debug, Default)]
pub struct Diagnostics {
    label: Option<String>,
    events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            events: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn record(&mut self, level: Level, step: RemovalStep, message: impl Into<String>) {
        let message = message.into();
        match &self.label {
            Some(label) => log::log!(level, "{label}: {step}: {message}"),
            None => log::log!(level, "{step}: {message}"),
        }
        self.events.push(DiagnosticEvent {
            level,
            step,
            message,
        });
    }

    pub fn debug(&mut self, step: RemovalStep, message: impl Into<String>) {
        self.record(Level::Debug, step, message);
    }

    pub fn info(&mut self, step: RemovalStep, message: impl Into<String>) {
        self.record(Level::Info, step, message);
    }

    pub fn warn(&mut self, step: RemovalStep, message: impl Into<String>) {
        self.record(Level::Warn, step, message);
    }

    pub fn error(&mut self, step: RemovalStep, message: impl Into<String>) {
        self.record(Level::Error, step, message);
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<DiagnosticEvent> {
        self.events
    }

    pub fn has_errors(&self) -> bool {
        self.events.iter().any(|e| e.level == Level::Error)
    }
}
