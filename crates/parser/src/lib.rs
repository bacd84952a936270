//! Parsers for usbip-share
//!
//! Turns the text output of `usbip`, `lsusb`, `ls` and the diagnostic script
//! into device records. Output formats drift between tool versions, so every
//! parser is tolerant: unrecognised lines are dropped or kept as detail
//! lines, and no parser fails or panics on malformed input.
//!
//! # Example
//!
//! ```
//! use parser::parse_local_devices;
//!
//! let output = "1-6: 04f3 : unknown product (04f3:22e8)\n   : /sys/devices/usb1/1-6\n";
//! let devices = parse_local_devices(output);
//!
//! assert_eq!(devices.len(), 1);
//! assert_eq!(devices[0].busid, "1-6");
//! assert_eq!(devices[0].vendor_id, "04f3");
//! assert_eq!(devices[0].product_id, "22e8");
//! ```
//!
//! # Pattern strategies
//!
//! Listing parsers share one record-splitting routine driven by an ordered
//! [`PatternSet`]:
//!
//! ```
//! use parser::PatternSet;
//!
//! let (pattern, start) = PatternSet::local()
//!     .match_line(" - busid 1-1 (abcd:1234)", None)
//!     .unwrap();
//! assert_eq!(pattern, "busid-marker");
//! assert_eq!(start.busid, "1-1");
//! ```

pub mod binding;
pub mod doctor;
pub mod listing;
pub mod lsusb;
pub mod patterns;
pub mod port;
pub mod section;

pub use binding::{busids_from_entries, parse_driver_listing};
pub use doctor::{
    KERNEL_STATUS_HEADER, LOCAL_DEVICES_HEADER, parse_doctor_devices, parse_kernel_status,
};
pub use listing::{ParsedRecord, parse_local_devices, parse_records, parse_remote_devices};
pub use lsusb::{LsusbEntry, ROOT_HUB_VENDOR, parse_lsusb};
pub use patterns::{LinePattern, PatternSet, RecordStart, Strength, find_usb_id};
pub use port::parse_attached_ports;
pub use section::section;
