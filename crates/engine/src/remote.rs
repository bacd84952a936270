//! Devices exported by a remote host

use crate::exec::CommandRunner;
use crate::host::UsbipHost;
use crate::ops::validate_host;
use common::{RemoteDevice, Result};
use parser::parse_remote_devices;
use tracing::debug;

impl<R: CommandRunner> UsbipHost<R> {
    /// Devices `host` exports. An empty list means the host answered but
    /// exports nothing; connection problems are errors.
    pub async fn list_remote(&self, host: &str) -> Result<Vec<RemoteDevice>> {
        let host = validate_host(host)?;
        let output = self.run(self.tools.list_remote(&host)).await;
        if let Some(error) = output.error() {
            debug!("Remote listing of {} failed: {}", host, error);
            return Err(error);
        }
        Ok(parse_remote_devices(&output.stdout))
    }
}
