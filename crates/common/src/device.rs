//! Device records shared by the parsers, the engine and its collaborators
//!
//! Records are built fresh for every inventory call and never persisted.
//! Busids stored in these records are always normalized.

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};

/// Placeholder for a vendor or product ID the tools did not report
pub const UNKNOWN_ID: &str = "0000";

/// What a [`LocalDevice`] record represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A real, discovered device
    #[default]
    Device,
    /// Informational notice (nothing was found)
    Info,
    /// Discovery failed
    Error,
}

/// A USB device attached to this host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDevice {
    /// Canonical busid, unique within one inventory snapshot
    pub busid: String,
    /// 4 lowercase hex digits, `0000` when unknown
    pub vendor_id: String,
    /// 4 lowercase hex digits, `0000` when unknown
    pub product_id: String,
    /// Best-effort human readable name
    pub device_name: String,
    /// Raw descriptive line as reported by the tool
    pub info: String,
    /// Auxiliary lines kept for diagnostics, in tool output order
    pub details: Vec<String>,
    /// Derived from the published set on every call
    pub is_published: bool,
    /// Discovered through `lsusb`; the busid may be a bus/slot pair rather
    /// than a usbip busid
    #[serde(default)]
    pub is_fallback: bool,
    /// Software-simulated device layered in by a collaborator
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_id: Option<String>,
    #[serde(default)]
    pub kind: RecordKind,
}

impl LocalDevice {
    /// Create a device record with placeholder IDs and name.
    pub fn new(busid: impl Into<String>) -> Self {
        let busid = crate::normalize_busid(&busid.into());
        Self {
            device_name: placeholder_name(&busid),
            info: busid.clone(),
            busid,
            vendor_id: UNKNOWN_ID.to_string(),
            product_id: UNKNOWN_ID.to_string(),
            details: Vec::new(),
            is_published: false,
            is_fallback: false,
            is_virtual: false,
            virtual_id: None,
            kind: RecordKind::Device,
        }
    }

    /// `vendor:product` pair, the key used to cross-reference data sources
    pub fn usb_id(&self) -> String {
        format!("{}:{}", self.vendor_id, self.product_id)
    }

    pub fn has_known_ids(&self) -> bool {
        self.vendor_id != UNKNOWN_ID || self.product_id != UNKNOWN_ID
    }

    pub fn is_error(&self) -> bool {
        self.kind == RecordKind::Error
    }

    pub fn is_info(&self) -> bool {
        self.kind == RecordKind::Info
    }

    fn notice(kind: RecordKind, title: &str, info: &str, details: Vec<String>) -> Self {
        Self {
            busid: kind_label(kind).to_string(),
            vendor_id: UNKNOWN_ID.to_string(),
            product_id: UNKNOWN_ID.to_string(),
            device_name: title.to_string(),
            info: info.to_string(),
            details,
            is_published: false,
            is_fallback: false,
            is_virtual: false,
            virtual_id: None,
            kind,
        }
    }
}

/// Default display name for a device the tools could not name
pub fn placeholder_name(busid: &str) -> String {
    format!("Device {}", busid)
}

fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Device => "device",
        RecordKind::Info => "info",
        RecordKind::Error => "error",
    }
}

/// A device exported by a remote USB/IP host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDevice {
    pub busid: String,
    pub info: String,
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// A remote device currently attached to a local virtual host controller port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedPort {
    /// Port identifier as printed by the tool (`00`, `8`, ...). Kept as a
    /// string; leading zeros are significant to some tool versions.
    pub port: String,
    pub info: String,
    pub remote_host: Option<String>,
    /// Normalized
    pub remote_busid: Option<String>,
    pub details: Vec<String>,
}

/// Which data source produced a local inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    DiagnosticScript,
    UsbipList,
    Lsusb,
}

impl std::fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoverySource::DiagnosticScript => write!(f, "diagnostic script"),
            DiscoverySource::UsbipList => write!(f, "usbip list -l"),
            DiscoverySource::Lsusb => write!(f, "lsusb"),
        }
    }
}

/// Outcome of a local discovery pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoveryStatus {
    /// At least one source produced devices
    Ok,
    /// Sources ran but none reported a device
    Empty { hints: Vec<String> },
    /// No source could be run successfully
    Error { reason: String, hints: Vec<String> },
}

/// Local inventory together with how it was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub devices: Vec<LocalDevice>,
    pub source: Option<DiscoverySource>,
    pub status: DiscoveryStatus,
}

impl Discovery {
    pub fn is_ok(&self) -> bool {
        self.status == DiscoveryStatus::Ok
    }

    /// Flatten into a list that is never empty.
    ///
    /// An empty or failed discovery becomes a single notice record
    /// (`kind = info` or `kind = error`) so list-oriented callers always have
    /// something to render.
    pub fn into_display_list(self) -> Vec<LocalDevice> {
        match self.status {
            DiscoveryStatus::Ok => self.devices,
            DiscoveryStatus::Empty { hints } => vec![LocalDevice::notice(
                RecordKind::Info,
                "No devices",
                "No USB devices found",
                hints,
            )],
            DiscoveryStatus::Error { reason, mut hints } => {
                hints.push(format!("Error details: {}", reason));
                vec![LocalDevice::notice(
                    RecordKind::Error,
                    "USB/IP error",
                    "USB/IP service is not running or not configured",
                    hints,
                )]
            }
        }
    }
}

/// Result of bind, unbind, attach or detach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    /// Human readable; includes the tool's stderr on failure
    pub message: String,
    /// The device was already in the requested state; nothing was changed
    #[serde(default)]
    pub already_in_state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl OperationOutcome {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            already_in_state: false,
            error: None,
        }
    }

    pub fn already(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            already_in_state: true,
            error: None,
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            already_in_state: false,
            error: Some(error.kind()),
        }
    }
}

impl From<crate::Result<OperationOutcome>> for OperationOutcome {
    fn from(result: crate::Result<OperationOutcome>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(e) => Self::failed(&e),
        }
    }
}
