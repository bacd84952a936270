//! Common types and utilities for usbip-share
//!
//! This crate provides the pieces shared by the parsers, the engine and the
//! CLI: the device record model, the error taxonomy, busid and host
//! normalization, the event sink port, and logging setup.

pub mod busid;
pub mod device;
pub mod error;
pub mod events;
pub mod logging;
pub mod test_utils;

pub use busid::{is_busid_token, normalize_busid, sanitize_host};
pub use device::{
    AttachedPort, Discovery, DiscoverySource, DiscoveryStatus, LocalDevice, OperationOutcome,
    RecordKind, RemoteDevice, UNKNOWN_ID, placeholder_name,
};
pub use error::{Error, ErrorKind, Result};
pub use events::{Event, EventKind, EventLevel, EventSink, MemorySink, TracingSink};
pub use logging::setup_logging;
