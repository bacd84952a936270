//! Local device discovery
//!
//! Sources are tried in order until one reports a device:
//!
//! 1. the diagnostic script in `--local-devices` mode, when installed
//! 2. `usbip list -l`
//! 3. `lsusb`, whose records are marked as fallback
//!
//! Every returned device carries a fresh `is_published` flag.

use crate::exec::{CommandOutput, CommandRunner};
use crate::host::UsbipHost;
use common::{
    Discovery, DiscoverySource, DiscoveryStatus, Event, EventKind, EventLevel, LocalDevice,
    placeholder_name,
};
use parser::{LsusbEntry, parse_doctor_devices, parse_local_devices, parse_lsusb};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

const EMPTY_HINTS: &[&str] = &[
    "Check that USB devices are connected to this host",
    "Make sure the usbip-host kernel module is loaded: sudo modprobe usbip-host",
];

const ERROR_HINTS: &[&str] = &[
    "Install the usbip tools for your distribution",
    "Run the diagnostic script (doctor.sh) to find and fix the problem",
];

impl<R: CommandRunner> UsbipHost<R> {
    /// Discover local devices and annotate their publish state.
    pub async fn discover(&self) -> Discovery {
        let mut discovery = self.discover_unannotated().await;
        if !discovery.devices.is_empty() {
            let published = self.published_for(&discovery.devices).await;
            for device in &mut discovery.devices {
                device.is_published = published.contains(&device.busid);
            }
        }
        discovery
    }

    /// Local devices as a never-empty list: a failed or empty discovery
    /// yields one informational or error record.
    pub async fn list_local_devices(&self) -> Vec<LocalDevice> {
        self.discover().await.into_display_list()
    }

    pub(crate) async fn discover_unannotated(&self) -> Discovery {
        let mut failures: Vec<String> = Vec::new();
        let mut any_source_ran = false;

        if self.config.discovery.use_diagnostic_script
            && let Some(request) = self.tools.doctor(&["--local-devices"])
        {
            let output = self.run(request).await;
            if output.success() {
                any_source_ran = true;
                let devices = parse_doctor_devices(&output.stdout);
                if !devices.is_empty() {
                    return self.found(devices, DiscoverySource::DiagnosticScript);
                }
                debug!("Diagnostic script reported no devices");
            } else {
                failures.push(describe_failure(&output));
            }
        }

        let output = self.run(self.tools.list_local()).await;
        if output.success() {
            any_source_ran = true;
            let mut devices = parse_local_devices(&output.stdout);
            if !devices.is_empty() {
                if self.config.discovery.enrich_names {
                    self.enrich_names(&mut devices).await;
                }
                return self.found(devices, DiscoverySource::UsbipList);
            }
            debug!("usbip list -l reported no devices");
        } else {
            failures.push(describe_failure(&output));
        }

        if self.config.discovery.lsusb_fallback {
            let output = self.run(self.tools.lsusb()).await;
            if output.success() {
                any_source_ran = true;
                let devices = self.fallback_devices(parse_lsusb(&output.stdout));
                if !devices.is_empty() {
                    self.emit(Event::new(
                        EventKind::DiscoveryFallback,
                        EventLevel::Info,
                        format!(
                            "usbip reported no devices; listing {} device(s) from lsusb",
                            devices.len()
                        ),
                    ));
                    return self.found(devices, DiscoverySource::Lsusb);
                }
            } else {
                failures.push(describe_failure(&output));
            }
        }

        if any_source_ran {
            info!("No USB devices found");
            Discovery {
                devices: Vec::new(),
                source: None,
                status: DiscoveryStatus::Empty {
                    hints: EMPTY_HINTS.iter().map(|s| s.to_string()).collect(),
                },
            }
        } else {
            let reason = failures.join("; ");
            self.emit(Event::new(
                EventKind::DiscoveryFailed,
                EventLevel::Warning,
                format!("Device discovery failed: {}", reason),
            ));
            Discovery {
                devices: Vec::new(),
                source: None,
                status: DiscoveryStatus::Error {
                    reason,
                    hints: ERROR_HINTS.iter().map(|s| s.to_string()).collect(),
                },
            }
        }
    }

    fn found(&self, devices: Vec<LocalDevice>, source: DiscoverySource) -> Discovery {
        info!("Found {} USB device(s) via {}", devices.len(), source);
        Discovery {
            devices,
            source: Some(source),
            status: DiscoveryStatus::Ok,
        }
    }

    /// Turn `lsusb` entries into fallback records.
    ///
    /// `lsusb` slots are bus/address pairs, not port paths. When sysfs has
    /// exactly one device with the same vendor:product pair, the record is
    /// re-keyed to that device's busid.
    fn fallback_devices(&self, entries: Vec<LsusbEntry>) -> Vec<LocalDevice> {
        let mut by_usb_id: HashMap<String, Vec<String>> = HashMap::new();
        match self.sysfs.devices() {
            Ok(devices) => {
                for device in devices {
                    by_usb_id
                        .entry(device.usb_id())
                        .or_default()
                        .push(device.busid);
                }
            }
            Err(e) => debug!("sysfs device scan unavailable: {}", e),
        }

        let mut seen = BTreeSet::new();
        let mut devices = Vec::new();
        for entry in entries.into_iter().filter(|e| !e.is_root_hub()) {
            let slot = entry.slot_busid();
            let mut device = LocalDevice::new(&slot);
            device.vendor_id = entry.vendor_id.clone();
            device.product_id = entry.product_id.clone();
            device.info = entry.line.clone();
            device.is_fallback = true;
            if let Some(name) = &entry.name {
                device.device_name = name.clone();
            }
            device.details.push(format!("lsusb slot {}", slot));

            if let Some([busid]) = by_usb_id.get(&entry.usb_id()).map(Vec::as_slice) {
                debug!("Re-keyed lsusb slot {} to busid {}", slot, busid);
                device.busid = busid.clone();
                if entry.name.is_none() {
                    device.device_name = placeholder_name(busid);
                }
            }

            if seen.insert(device.busid.clone()) {
                devices.push(device);
            }
        }
        devices
    }

    /// Replace unhelpful names with the `lsusb` description of the same
    /// vendor:product pair. Failures leave names untouched.
    async fn enrich_names(&self, devices: &mut [LocalDevice]) {
        if !devices.iter().any(needs_better_name) {
            return;
        }
        let output = self.run(self.tools.lsusb()).await;
        if !output.success() {
            debug!("lsusb unavailable for name lookup: {}", output.stderr.trim());
            return;
        }

        let names: HashMap<String, String> = parse_lsusb(&output.stdout)
            .into_iter()
            .filter_map(|entry| {
                let usb_id = entry.usb_id();
                entry.name.map(|name| (usb_id, name))
            })
            .collect();

        for device in devices.iter_mut().filter(|d| needs_better_name(d)) {
            if let Some(name) = names.get(&device.usb_id()) {
                debug!("Named {} from lsusb: {}", device.busid, name);
                let previous = std::mem::replace(&mut device.device_name, name.clone());
                device.details.push(format!("usbip name: {}", previous));
            }
        }
    }
}

fn needs_better_name(device: &LocalDevice) -> bool {
    device.has_known_ids()
        && (device.device_name.to_lowercase().contains("unknown")
            || device.device_name == placeholder_name(&device.busid))
}

fn describe_failure(output: &CommandOutput) -> String {
    let reason = match output.error() {
        Some(error) => error.to_string(),
        None => format!("{} failed", output.command),
    };
    warn!("{}", reason);
    reason
}
