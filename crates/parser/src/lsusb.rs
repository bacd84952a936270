//! `lsusb` parser
//!
//! `lsusb` reports bus number and device address (`Bus 001 Device 005`),
//! which is a different identifier space from usbip busids (`1-1.4` is a
//! port path). [`LsusbEntry::slot_busid`] is only a best guess.

use common::normalize_busid;
use regex::Regex;
use std::sync::LazyLock;

/// Vendor ID of the Linux Foundation, used by root hubs
pub const ROOT_HUB_VENDOR: &str = "1d6b";

static LSUSB_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*Bus\s+(?P<bus>\d+)\s+Device\s+(?P<dev>\d+):\s+ID\s+(?P<vid>[0-9a-fA-F]{4}):(?P<pid>[0-9a-fA-F]{4})\s*(?P<name>.*)$",
    )
    .expect("invalid lsusb pattern")
});

/// One `lsusb` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsusbEntry {
    pub bus: String,
    pub device: String,
    pub vendor_id: String,
    pub product_id: String,
    pub name: Option<String>,
    pub line: String,
}

impl LsusbEntry {
    /// `bus-device` normalized, e.g. `Bus 001 Device 005` becomes `1-5`
    pub fn slot_busid(&self) -> String {
        normalize_busid(&format!("{}-{}", self.bus, self.device))
    }

    pub fn usb_id(&self) -> String {
        format!("{}:{}", self.vendor_id, self.product_id)
    }

    pub fn is_root_hub(&self) -> bool {
        self.vendor_id == ROOT_HUB_VENDOR
    }
}

/// Parse `lsusb` output; unrecognised lines are skipped.
pub fn parse_lsusb(output: &str) -> Vec<LsusbEntry> {
    output
        .lines()
        .filter_map(|line| {
            let caps = LSUSB_LINE.captures(line)?;
            let name = caps["name"].trim();
            Some(LsusbEntry {
                bus: caps["bus"].to_string(),
                device: caps["dev"].to_string(),
                vendor_id: caps["vid"].to_ascii_lowercase(),
                product_id: caps["pid"].to_ascii_lowercase(),
                name: (!name.is_empty()).then(|| name.to_string()),
                line: line.trim().to_string(),
            })
        })
        .collect()
}
