//! Device listing parsers (`usbip list -l`, `usbip list -r`, diagnostic script)
//!
//! Lines are fed through a [`PatternSet`]. A recognised record start flushes
//! the open record; any other non-blank line is kept as a detail of the open
//! record. Text before the first record is dropped.

use crate::patterns::{PatternSet, find_usb_id, name_from_description, name_from_detail};
use common::{LocalDevice, RemoteDevice, UNKNOWN_ID, normalize_busid, placeholder_name};
use std::collections::HashSet;
use tracing::{debug, trace};

/// A device record as read from tool output, before defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Normalized busid
    pub busid: String,
    pub info: String,
    pub details: Vec<String>,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub name: Option<String>,
    /// Name of the pattern that opened the record
    pub matched_by: &'static str,
}

struct OpenRecord {
    raw_busid: String,
    description: Option<String>,
    vendor_id: Option<String>,
    product_id: Option<String>,
    details: Vec<String>,
    matched_by: &'static str,
}

impl OpenRecord {
    fn finish(self) -> ParsedRecord {
        let busid = normalize_busid(&self.raw_busid);

        let mut ids = self
            .vendor_id
            .zip(self.product_id)
            .map(|(v, p)| (v.to_ascii_lowercase(), p.to_ascii_lowercase()));
        if ids.is_none() {
            ids = self
                .description
                .as_deref()
                .and_then(find_usb_id)
                .or_else(|| self.details.iter().find_map(|d| find_usb_id(d)));
        }

        let name = self
            .description
            .as_deref()
            .and_then(name_from_description)
            .or_else(|| self.details.iter().find_map(|d| name_from_detail(d)));

        let info = match (&self.description, &name, &ids) {
            (Some(description), _, _) => format!("{}: {}", busid, description),
            (None, Some(name), Some((v, p))) => format!("{}: {} ({}:{})", busid, name, v, p),
            (None, None, Some((v, p))) => format!("{}: ({}:{})", busid, v, p),
            (None, Some(name), None) => format!("{}: {}", busid, name),
            (None, None, None) => busid.clone(),
        };

        let (vendor_id, product_id) = ids.unzip();
        ParsedRecord {
            busid,
            info,
            details: self.details,
            vendor_id,
            product_id,
            name,
            matched_by: self.matched_by,
        }
    }
}

/// Split `output` into device records using `patterns`.
///
/// Never fails; unrecognised text before the first record is dropped.
pub fn parse_records(output: &str, patterns: &PatternSet) -> Vec<ParsedRecord> {
    let mut records = Vec::new();
    let mut open: Option<OpenRecord> = None;

    for line in output.lines() {
        let open_busid = open.as_ref().map(|r| r.raw_busid.as_str());
        if let Some((matched_by, start)) = patterns.match_line(line, open_busid) {
            if let Some(record) = open.take() {
                records.push(record.finish());
            }
            trace!("record start via {}: {}", matched_by, line.trim());
            open = Some(OpenRecord {
                raw_busid: start.busid,
                description: start.description,
                vendor_id: start.vendor_id,
                product_id: start.product_id,
                details: Vec::new(),
                matched_by,
            });
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match open.as_mut() {
            Some(record) => record.details.push(trimmed.to_string()),
            None => trace!("dropping line outside any record: {}", trimmed),
        }
    }

    if let Some(record) = open.take() {
        records.push(record.finish());
    }

    records
}

/// Parse a local device listing into records with defaults applied.
///
/// Duplicate busids keep the first occurrence.
pub fn parse_local_devices(output: &str) -> Vec<LocalDevice> {
    let mut seen = HashSet::new();
    let devices: Vec<LocalDevice> = parse_records(output, PatternSet::local())
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.busid.clone());
            if !fresh {
                debug!("ignoring duplicate record for busid {}", record.busid);
            }
            fresh
        })
        .map(into_local_device)
        .collect();

    debug!("parsed {} local device(s)", devices.len());
    devices
}

/// Parse `usbip list -r <host>` output.
pub fn parse_remote_devices(output: &str) -> Vec<RemoteDevice> {
    let devices: Vec<RemoteDevice> = parse_records(output, PatternSet::remote())
        .into_iter()
        .map(|record| RemoteDevice {
            busid: record.busid,
            info: record.info,
            details: record.details,
            vendor_id: record.vendor_id,
            product_id: record.product_id,
            device_name: record.name,
        })
        .collect();

    debug!("parsed {} remote device(s)", devices.len());
    devices
}

fn into_local_device(record: ParsedRecord) -> LocalDevice {
    let mut device = LocalDevice::new(record.busid);
    device.vendor_id = record.vendor_id.unwrap_or_else(|| UNKNOWN_ID.to_string());
    device.product_id = record.product_id.unwrap_or_else(|| UNKNOWN_ID.to_string());
    device.device_name = record
        .name
        .unwrap_or_else(|| placeholder_name(&device.busid));
    device.info = record.info;
    device.details = record.details;
    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{
        DOCTOR_LOCAL_DEVICES, USBIP_LIST_LOCAL, USBIP_LIST_LOCAL_LEGACY, USBIP_LIST_PARSABLE,
        USBIP_LIST_REMOTE,
    };

    #[test]
    fn test_legacy_line_with_detail() {
        let output = "1-6: 04f3 : unknown product (04f3:22e8)\n   : /sys/devices/pci0000:00/0000:00:14.0/usb1/1-6\n";
        let devices = parse_local_devices(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].busid, "1-6");
        assert_eq!(devices[0].vendor_id, "04f3");
        assert_eq!(devices[0].product_id, "22e8");
        assert_eq!(devices[0].device_name, "04f3 : unknown product");
        assert_eq!(devices[0].details.len(), 1);
    }

    #[test]
    fn test_diagnostic_marker_with_name_line() {
        let output = "- busid 1-1 (abcd:1234)\n  LogiLink : UDisk flash drive (abcd:1234)\n";
        let devices = parse_local_devices(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].busid, "1-1");
        assert_eq!(devices[0].usb_id(), "abcd:1234");
        assert_eq!(devices[0].device_name, "LogiLink : UDisk flash drive");
        assert_eq!(
            devices[0].info,
            "1-1: LogiLink : UDisk flash drive (abcd:1234)"
        );
    }

    #[test]
    fn test_current_usbip_layout() {
        let devices = parse_local_devices(USBIP_LIST_LOCAL);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].busid, "1-1.4");
        assert_eq!(devices[0].device_name, "Logitech, Inc. : Unifying Receiver");
        assert_eq!(devices[1].busid, "1-6");
        assert_eq!(devices[1].usb_id(), "04f3:22e8");
    }

    #[test]
    fn test_legacy_layout_keeps_details_per_record() {
        let devices = parse_local_devices(USBIP_LIST_LOCAL_LEGACY);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].details.len(), 2);
        assert_eq!(devices[1].busid, "3-2");
        assert_eq!(devices[1].device_name, "SanDisk Corp. : Cruzer Blade");
        assert_eq!(devices[1].details.len(), 1);
    }

    #[test]
    fn test_parsable_layout_lowercases_ids() {
        let devices = parse_local_devices(USBIP_LIST_PARSABLE);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].usb_id(), "04f3:22e8");
        assert_eq!(devices[1].device_name, "Device 1-6");
    }

    #[test]
    fn test_diagnostic_local_devices_mode() {
        let devices = parse_local_devices(DOCTOR_LOCAL_DEVICES);
        let busids: Vec<&str> = devices.iter().map(|d| d.busid.as_str()).collect();
        assert_eq!(busids, vec!["1-1", "1-6"]);
    }

    #[test]
    fn test_ids_found_in_details() {
        let output = "2-1: Mystery gadget\n   : vendor/product 0bda:5411\n";
        let devices = parse_local_devices(output);
        assert_eq!(devices[0].usb_id(), "0bda:5411");
        assert_eq!(devices[0].device_name, "Mystery gadget");
    }

    #[test]
    fn test_duplicate_busids_keep_first() {
        let output = "- busid 001-001 (abcd:1234)\n- busid 1-1 (ffff:ffff)\n";
        let devices = parse_local_devices(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].usb_id(), "abcd:1234");
    }

    #[test]
    fn test_garbage_input_yields_nothing() {
        assert!(parse_local_devices("").is_empty());
        assert!(parse_local_devices("usbip: error: failed to open /usr/share/hwdata//usb.ids\n").is_empty());
        assert!(parse_local_devices("\u{0}\u{1}\n\t\t\n::::").is_empty());
    }

    #[test]
    fn test_remote_listing() {
        let devices = parse_remote_devices(USBIP_LIST_REMOTE);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].busid, "1-1.4");
        assert_eq!(
            devices[0].info,
            "1-1.4: Logitech, Inc. : Unifying Receiver (046d:c52b)"
        );
        assert_eq!(devices[0].details.len(), 3);
        assert_eq!(devices[0].vendor_id.as_deref(), Some("046d"));
        assert_eq!(devices[1].busid, "3-2");
        assert_eq!(
            devices[1].device_name.as_deref(),
            Some("SanDisk Corp. : Cruzer Blade")
        );
    }
}
