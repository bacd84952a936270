//! Notable engine events and the sink they are reported to
//!
//! The engine never reaches into its host application to log. Instead the
//! host injects an [`EventSink`] at construction time; the default
//! [`TracingSink`] forwards everything to `tracing`.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Types of engine events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DeviceBound,
    DeviceUnbound,
    DeviceAttached,
    DeviceDetached,
    /// A device was bound and immediately unbound to read its state
    ProbeMutation,
    /// Discovery had to use a lower-priority source
    DiscoveryFallback,
    /// No discovery source produced devices
    DiscoveryFailed,
    /// A command hit its timeout and was killed
    CommandTimedOut,
    /// A privileged command could not obtain credentials
    PermissionDenied,
}

/// Severity hint for sinks that care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
}

/// A structured engine event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub level: EventLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            busid: None,
            host: None,
            port: None,
        }
    }

    pub fn with_busid(mut self, busid: impl Into<String>) -> Self {
        self.busid = Some(busid.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }
}

/// Receiver of engine events
pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        let busid = event.busid.as_deref().unwrap_or("-");
        match event.level {
            EventLevel::Debug => debug!(kind = ?event.kind, busid, "{}", event.message),
            EventLevel::Info => info!(kind = ?event.kind, busid, "{}", event.message),
            EventLevel::Warning => warn!(kind = ?event.kind, busid, "{}", event.message),
        }
    }
}

/// Keeps every event in memory. Useful for hosts that display recent
/// activity, and for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
