//! Publish, unpublish, attach and detach
//!
//! Each operation returns an [`OperationOutcome`] and never panics or
//! returns early with an error. Inputs are validated before any command
//! runs so nothing that looks like an option reaches `usbip`.

use crate::exec::CommandRunner;
use crate::host::UsbipHost;
use crate::publish::ALREADY_BOUND_MARKER;
use common::{
    AttachedPort, Error, Event, EventKind, EventLevel, OperationOutcome, Result, is_busid_token,
    normalize_busid, sanitize_host,
};
use parser::parse_attached_ports;
use tracing::info;

impl<R: CommandRunner> UsbipHost<R> {
    /// Publish a local device. Binding an already published device
    /// succeeds with `already_in_state` set.
    pub async fn bind(&self, busid: &str) -> OperationOutcome {
        self.try_bind(busid).await.into()
    }

    /// Unpublish a device. Fails without running anything when the device
    /// is not published.
    pub async fn unbind(&self, busid: &str) -> OperationOutcome {
        self.try_unbind(busid).await.into()
    }

    /// Attach a device exported by `host`.
    pub async fn attach(&self, host: &str, busid: &str) -> OperationOutcome {
        self.try_attach(host, busid).await.into()
    }

    /// Detach the device on a local virtual port.
    pub async fn detach(&self, port: &str) -> OperationOutcome {
        self.try_detach(port).await.into()
    }

    /// Remote devices attached to this host
    pub async fn list_ports(&self) -> Result<Vec<AttachedPort>> {
        let output = self.run(self.tools.port()).await;
        if let Some(error) = output.error() {
            return Err(error);
        }
        Ok(parse_attached_ports(&output.stdout))
    }

    async fn try_bind(&self, busid: &str) -> Result<OperationOutcome> {
        let busid = validate_busid(busid)?;
        if !self.device_exists(&busid).await {
            return Err(Error::DeviceNotFound { busid });
        }

        let output = self.run(self.tools.bind(&busid).interactive(true)).await;
        if output.success() {
            info!("Published {}", busid);
            self.emit(
                Event::new(
                    EventKind::DeviceBound,
                    EventLevel::Info,
                    format!("Device {} published", busid),
                )
                .with_busid(&busid),
            );
            return Ok(OperationOutcome::done(format!("Device {} published", busid)));
        }
        if output.mentions(ALREADY_BOUND_MARKER) {
            return Ok(OperationOutcome::already(format!(
                "Device {} is already published",
                busid
            )));
        }
        Err(failure(&output))
    }

    async fn try_unbind(&self, busid: &str) -> Result<OperationOutcome> {
        let busid = validate_busid(busid)?;
        if !self.published_busids().await.contains(&busid) {
            return Err(Error::NotPublished { busid });
        }

        let output = self.run(self.tools.unbind(&busid).interactive(true)).await;
        if !output.success() {
            return Err(failure(&output));
        }
        info!("Unpublished {}", busid);
        self.emit(
            Event::new(
                EventKind::DeviceUnbound,
                EventLevel::Info,
                format!("Device {} unpublished", busid),
            )
            .with_busid(&busid),
        );
        Ok(OperationOutcome::done(format!("Device {} unpublished", busid)))
    }

    async fn try_attach(&self, host: &str, busid: &str) -> Result<OperationOutcome> {
        let host = validate_host(host)?;
        let busid = validate_busid(busid)?;

        let output = self
            .run(self.tools.attach(&host, &busid).interactive(true))
            .await;
        if !output.success() {
            return Err(failure(&output));
        }
        info!("Attached {} from {}", busid, host);
        self.emit(
            Event::new(
                EventKind::DeviceAttached,
                EventLevel::Info,
                format!("Device {} from {} attached", busid, host),
            )
            .with_busid(&busid)
            .with_host(&host),
        );
        Ok(OperationOutcome::done(format!(
            "Device {} from {} attached",
            busid, host
        )))
    }

    async fn try_detach(&self, port: &str) -> Result<OperationOutcome> {
        let port = validate_port(port)?;

        let output = self.run(self.tools.detach(&port).interactive(true)).await;
        if !output.success() {
            return Err(failure(&output));
        }
        info!("Detached port {}", port);
        self.emit(
            Event::new(
                EventKind::DeviceDetached,
                EventLevel::Info,
                format!("Port {} detached", port),
            )
            .with_port(&port),
        );
        Ok(OperationOutcome::done(format!("Port {} detached", port)))
    }

    /// The device is present in sysfs, or failing that in `usbip list -l`.
    async fn device_exists(&self, busid: &str) -> bool {
        if self.sysfs.device_exists(busid) {
            return true;
        }
        let output = self.run(self.tools.list_local()).await;
        output.success()
            && parser::parse_local_devices(&output.stdout)
                .iter()
                .any(|device| device.busid == busid)
    }
}

fn failure(output: &crate::exec::CommandOutput) -> Error {
    output.error().unwrap_or_else(|| Error::ToolFailure {
        command: output.command.clone(),
        code: output.exit_code,
        stderr: output.stderr.trim().to_string(),
    })
}

/// Normalized busid, or `InvalidInput` for anything that is not one
pub fn validate_busid(raw: &str) -> Result<String> {
    let busid = normalize_busid(raw);
    if is_busid_token(&busid) {
        Ok(busid)
    } else {
        Err(Error::InvalidInput(format!("invalid busid: {:?}", raw.trim())))
    }
}

/// Sanitized host, rejecting empty results and option-like input
pub fn validate_host(raw: &str) -> Result<String> {
    let host = sanitize_host(raw);
    if host.is_empty() || host.starts_with('-') || host.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!("invalid host: {:?}", raw.trim())));
    }
    Ok(host)
}

pub fn validate_port(raw: &str) -> Result<String> {
    let port = raw.trim();
    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!("invalid port: {:?}", port)));
    }
    Ok(port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_busid() {
        assert_eq!(validate_busid(" 001-006 ").unwrap(), "1-6");
        assert_eq!(validate_busid("1-1.4").unwrap(), "1-1.4");
        assert!(validate_busid("").is_err());
        assert!(validate_busid("-h").is_err());
        assert!(validate_busid("1-1; rm -rf /").is_err());
    }

    #[test]
    fn test_validate_host() {
        assert_eq!(
            validate_host("http://192.168.1.5:3240/").unwrap(),
            "192.168.1.5"
        );
        assert_eq!(validate_host("pi.local").unwrap(), "pi.local");
        assert!(validate_host("   ").is_err());
        assert!(validate_host("--help").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert_eq!(validate_port(" 08 ").unwrap(), "08");
        assert!(validate_port("").is_err());
        assert!(validate_port("-a").is_err());
    }
}
