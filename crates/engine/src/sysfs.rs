//! Read-only sysfs access

use crate::config::SysfsSettings;
use common::{is_busid_token, normalize_busid};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// USB identity of one device directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsDevice {
    pub busid: String,
    pub vendor_id: String,
    pub product_id: String,
}

impl SysfsDevice {
    pub fn usb_id(&self) -> String {
        format!("{}:{}", self.vendor_id, self.product_id)
    }
}

#[derive(Debug, Clone)]
pub struct SysfsView {
    driver_dir: PathBuf,
    devices_dir: PathBuf,
}

impl SysfsView {
    pub fn new(settings: &SysfsSettings) -> Self {
        Self {
            driver_dir: settings.driver_dir.clone(),
            devices_dir: settings.devices_dir.clone(),
        }
    }

    pub fn driver_dir(&self) -> &Path {
        &self.driver_dir
    }

    /// Busids bound to the usbip-host driver.
    ///
    /// A missing driver directory while the devices directory exists means
    /// the module is not loaded, so nothing is bound.
    pub fn bound_busids(&self) -> io::Result<BTreeSet<String>> {
        match fs::read_dir(&self.driver_dir) {
            Ok(entries) => {
                let names: Vec<String> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect();
                Ok(parser::busids_from_entries(names))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && self.devices_dir.is_dir() => {
                Ok(BTreeSet::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn device_exists(&self, busid: &str) -> bool {
        self.devices_dir.join(busid).exists()
    }

    /// Every device directory with readable `idVendor`/`idProduct`
    pub fn devices(&self) -> io::Result<Vec<SysfsDevice>> {
        let mut devices = Vec::new();
        for entry in fs::read_dir(&self.devices_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_busid_token(&name) {
                continue;
            }
            let path = entry.path();
            let (Some(vendor_id), Some(product_id)) =
                (read_attr(&path, "idVendor"), read_attr(&path, "idProduct"))
            else {
                continue;
            };
            devices.push(SysfsDevice {
                busid: normalize_busid(&name),
                vendor_id,
                product_id,
            });
        }
        devices.sort_by(|a, b| a.busid.cmp(&b.busid));
        Ok(devices)
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    let value = fs::read_to_string(dir.join(name)).ok()?;
    let value = value.trim().to_ascii_lowercase();
    (!value.is_empty()).then_some(value)
}
