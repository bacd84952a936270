//! Test utilities for usbip-share
//!
//! Captured tool output in the formats the parsers have to cope with, plus
//! record constructors shared by the crates' tests.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_mock_local_device, USBIP_LIST_LOCAL};
//!
//! let device = create_mock_local_device("001-001", "abcd", "1234");
//! assert_eq!(device.busid, "1-1");
//! assert!(USBIP_LIST_LOCAL.contains("busid 1-1.4"));
//! ```

use crate::device::LocalDevice;

/// `usbip list -l` from usbip-utils 2.0
pub const USBIP_LIST_LOCAL: &str = " - busid 1-1.4 (046d:c52b)
   Logitech, Inc. : Unifying Receiver (046d:c52b)

 - busid 1-6 (04f3:22e8)
   Elan Microelectronics Corp. : unknown product (04f3:22e8)

";

/// `usbip list -l` from older builds that print one `busid: description`
/// line per device
pub const USBIP_LIST_LOCAL_LEGACY: &str = "1-6: 04f3 : unknown product (04f3:22e8)
   : /sys/devices/pci0000:00/0000:00:14.0/usb1/1-6
   : (Defined at Interface level) (00/00/00)
3-2: SanDisk Corp. : Cruzer Blade (0781:5567)
   : /sys/devices/pci0000:00/0000:00:14.0/usb3/3-2
";

/// `usbip list -p -l`
pub const USBIP_LIST_PARSABLE: &str = "busid=1-1#usbid=abcd:1234#
busid=1-6#usbid=04F3:22E8#
";

/// Output of the diagnostic script in `--local-devices` mode
pub const DOCTOR_LOCAL_DEVICES: &str = "Found 2 USB device(s):
 - busid 1-1 (abcd:1234)
   LogiLink : UDisk flash drive (abcd:1234)
 - busid 1-6 (04f3:22e8)
   Elan Microelectronics Corp. : unknown product (04f3:22e8)
";

/// Full diagnostic script run, split into sections
pub const DOCTOR_FULL: &str = "=== USB/IP doctor ===
Kernel modules:
  usbip_core: loaded
  usbip_host: loaded
  vhci_hcd: loaded

Local USB devices:
Found 2 USB device(s)
 - busid 1-1 (abcd:1234)
   LogiLink : UDisk flash drive (abcd:1234)
 - busid 001-006 (04f3:22e8)
   Elan Microelectronics Corp. : unknown product (04f3:22e8)

Kernel status:
  1-1: status 1 (bound to usbip-host)
  1-6: status 0 (available)
  2-3: not bound

Daemon:
  usbipd: running (pid 812)
";

/// `usbip list -r 192.168.1.5`
pub const USBIP_LIST_REMOTE: &str = "Exportable USB devices
======================
 - 192.168.1.5
      1-1.4: Logitech, Inc. : Unifying Receiver (046d:c52b)
           : /sys/devices/platform/soc/3f980000.usb/usb1/1-1/1-1.4
           : (Defined at Interface level) (00/00/00)
           :  0 - Human Interface Device / Boot Interface Subclass / Keyboard (03/01/01)

      3-2: SanDisk Corp. : Cruzer Blade (0781:5567)
           : /sys/devices/platform/soc/3f980000.usb/usb3/3-2
           : (Defined at Interface level) (00/00/00)
";

/// `usbip port` from usbip-utils 2.0
pub const USBIP_PORT: &str = "Imported USB devices
====================
Port 00: <Port in Use> at High Speed(480Mbps)
       Logitech, Inc. : Unifying Receiver (046d:c52b)
       3-1 -> usbip://192.168.1.5:3240/1-1.4
           -> remote bus/dev 001/004
Port 08: <Port in Use> at Super Speed(5000Mbps)
       SanDisk Corp. : Cruzer Blade (0781:5567)
       4-1 -> usbip://pi.local:3240/003-002
           -> remote bus/dev 003/002
";

/// `usbip port` from builds that print explicit remote lines
pub const USBIP_PORT_LEGACY: &str = "Port 00: <Port in Use> at Remote 192.168.1.100
  Status: Online
  Remote host: 192.168.1.100
  Remote busid: 001-001
";

/// `lsusb`
pub const LSUSB: &str = "Bus 002 Device 001: ID 1d6b:0003 Linux Foundation 3.0 root hub
Bus 001 Device 005: ID 062a:4101 MosArt Semiconductor Corp. Wireless Keyboard/Mouse
Bus 001 Device 006: ID 04f3:22e8 Elan Microelectronics Corp. ELAN:Fingerprint
Bus 001 Device 001: ID 1d6b:0002 Linux Foundation 2.0 root hub
";

/// `ls -la /sys/bus/usb/drivers/usbip-host`
pub const DRIVER_DIR_LISTING: &str = "total 0
drwxr-xr-x  2 root root    0 Oct 19 10:00 .
drwxr-xr-x 30 root root    0 Oct 19 10:00 ..
lrwxrwxrwx  1 root root    0 Oct 19 10:01 1-1 -> ../../../../devices/pci0000:00/0000:00:14.0/usb1/1-1
lrwxrwxrwx  1 root root    0 Oct 19 10:01 1-1.4 -> ../../../../devices/pci0000:00/0000:00:14.0/usb1/1-1/1-1.4
lrwxrwxrwx  1 root root    0 Oct 19 10:01 1-1.4:1.0 -> ../../../../devices/pci0000:00/0000:00:14.0/usb1/1-1/1-1.4/1-1.4:1.0
--w-------  1 root root 4096 Oct 19 10:00 bind
-rw-------  1 root root 4096 Oct 19 10:00 match_busid
lrwxrwxrwx  1 root root    0 Oct 19 10:00 module -> ../../../../module/usbip_host
--w-------  1 root root 4096 Oct 19 10:00 rebind
--w-------  1 root root 4096 Oct 19 10:00 uevent
--w-------  1 root root 4096 Oct 19 10:00 unbind
";

/// `usbip bind` stderr when the device is already exported
pub const ALREADY_BOUND_STDERR: &str = "usbip: error: device on busid 1-1 is already bound to usbip-host\n";

/// Create a discovered local device record with the given IDs
///
/// # Example
/// ```
/// use common::test_utils::create_mock_local_device;
///
/// let device = create_mock_local_device("1-6", "04f3", "22e8");
/// assert_eq!(device.usb_id(), "04f3:22e8");
/// ```
pub fn create_mock_local_device(busid: &str, vendor_id: &str, product_id: &str) -> LocalDevice {
    let mut device = LocalDevice::new(busid);
    device.vendor_id = vendor_id.to_string();
    device.product_id = product_id.to_string();
    device.device_name = format!("Test Device {}", device.busid);
    device.info = format!(
        "{}: {} ({}:{})",
        device.busid, device.device_name, vendor_id, product_id
    );
    device
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_local_device() {
        let device = create_mock_local_device("002-003", "0781", "5567");
        assert_eq!(device.busid, "2-3");
        assert_eq!(device.usb_id(), "0781:5567");
        assert!(device.info.starts_with("2-3:"));
    }
}
