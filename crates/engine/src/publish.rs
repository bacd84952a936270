//! Which devices are currently published (bound to usbip-host)
//!
//! No single source is reliable everywhere, so the answer is the union of:
//!
//! - the usbip-host driver directory in sysfs (read directly, or through a
//!   privileged `ls -la` when unreadable)
//! - the `Kernel status:` section of the diagnostic script
//! - a bind probe, only when neither of the above produced an answer
//!
//! The probe changes host state: it binds each candidate and immediately
//! unbinds the ones that were not already bound. Between the two commands
//! the device is exported and another client could attach to it, and a
//! failed unbind leaves it exported. Disable it with
//! `discovery.probe_by_bind = false` on shared hosts.

use crate::exec::CommandRunner;
use crate::host::UsbipHost;
use common::{Event, EventKind, EventLevel, LocalDevice, is_busid_token};
use parser::{parse_driver_listing, parse_kernel_status};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Marker usbip prints when binding an exported device
pub const ALREADY_BOUND_MARKER: &str = "already bound";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    DriverDirectory,
    DiagnosticScript,
    BindProbe,
}

/// Published busids and the methods that contributed to them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub busids: BTreeSet<String>,
    pub methods: Vec<DetectionMethod>,
}

impl PublishReport {
    fn add(&mut self, method: DetectionMethod, busids: BTreeSet<String>) {
        debug!("{:?} reports {} published device(s)", method, busids.len());
        self.methods.push(method);
        self.busids.extend(busids);
    }

    pub fn contains(&self, busid: &str) -> bool {
        self.busids.contains(busid)
    }
}

impl<R: CommandRunner> UsbipHost<R> {
    /// Normalized busids currently bound to usbip-host.
    pub async fn published_busids(&self) -> BTreeSet<String> {
        self.publish_report(None).await.busids
    }

    /// Like [`published_busids`](Self::published_busids), also naming the
    /// detection methods that answered.
    pub async fn published_report(&self) -> PublishReport {
        self.publish_report(None).await
    }

    pub(crate) async fn published_for(&self, devices: &[LocalDevice]) -> BTreeSet<String> {
        self.publish_report(Some(devices)).await.busids
    }

    /// `known` supplies probe candidates; without it a discovery pass runs
    /// when the probe is needed.
    async fn publish_report(&self, known: Option<&[LocalDevice]>) -> PublishReport {
        let mut report = PublishReport::default();

        if let Some(busids) = self.driver_directory_busids().await {
            report.add(DetectionMethod::DriverDirectory, busids);
        }
        if let Some(busids) = self.diagnostic_script_busids().await {
            report.add(DetectionMethod::DiagnosticScript, busids);
        }

        if report.methods.is_empty() && self.config.discovery.probe_by_bind {
            let candidates: Vec<String> = match known {
                Some(devices) => probe_candidates(devices),
                None => probe_candidates(&self.discover_unannotated().await.devices),
            };
            let busids = self.probe_by_bind(&candidates).await;
            report.add(DetectionMethod::BindProbe, busids);
        }

        if report.methods.is_empty() {
            debug!("No publish detection method available; assuming nothing is published");
        }
        report
    }

    async fn driver_directory_busids(&self) -> Option<BTreeSet<String>> {
        match self.sysfs.bound_busids() {
            Ok(busids) => return Some(busids),
            Err(e) => debug!(
                "Cannot read {}: {}, trying ls",
                self.sysfs.driver_dir().display(),
                e
            ),
        }

        let output = self.run(self.tools.list_dir(self.sysfs.driver_dir())).await;
        if output.success() {
            Some(parse_driver_listing(&output.stdout))
        } else {
            debug!("ls of driver directory failed: {}", output.stderr.trim());
            None
        }
    }

    async fn diagnostic_script_busids(&self) -> Option<BTreeSet<String>> {
        if !self.config.discovery.use_diagnostic_script {
            return None;
        }
        let request = self.tools.doctor(&[])?;
        let output = self.run(request).await;
        // The script exits non-zero when it finds problems but still
        // prints its report.
        if output.stdout.trim().is_empty() {
            return None;
        }
        parse_kernel_status(&output.stdout)
    }

    async fn probe_by_bind(&self, candidates: &[String]) -> BTreeSet<String> {
        let mut published = BTreeSet::new();
        if candidates.is_empty() {
            return published;
        }
        warn!(
            "No non-intrusive publish detection available; probing {} device(s) by bind",
            candidates.len()
        );

        for busid in candidates {
            let output = self.run(self.tools.bind(busid)).await;
            if output.mentions(ALREADY_BOUND_MARKER) {
                published.insert(busid.clone());
                continue;
            }
            if !output.success() {
                debug!("Probe bind of {} failed: {}", busid, output.stderr.trim());
                continue;
            }

            self.emit(
                Event::new(
                    EventKind::ProbeMutation,
                    EventLevel::Warning,
                    format!("Probe bound {}; unbinding to restore state", busid),
                )
                .with_busid(busid),
            );
            let undo = self.run(self.tools.unbind(busid)).await;
            if !undo.success() {
                warn!(
                    "Failed to restore {} after probe, device stays published: {}",
                    busid,
                    undo.stderr.trim()
                );
                published.insert(busid.clone());
            }
        }
        published
    }
}

/// Real devices with usbip busids; fallback and notice records are skipped.
fn probe_candidates(devices: &[LocalDevice]) -> Vec<String> {
    devices
        .iter()
        .filter(|d| !d.is_fallback && !d.is_virtual && d.kind == common::RecordKind::Device)
        .filter(|d| is_busid_token(&d.busid))
        .map(|d| d.busid.clone())
        .collect()
}
