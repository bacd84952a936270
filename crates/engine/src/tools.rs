//! Tool resolution and command lines
//!
//! `usbip` lives in different places across distributions; Ubuntu ships it
//! per kernel under `/usr/lib/linux-tools/<version>/`.

use crate::config::ToolSettings;
use crate::exec::CommandRequest;
use std::path::{Path, PathBuf};
use tracing::debug;

const SYSTEM_DIRS: &[&str] = &["/usr/sbin", "/usr/bin", "/usr/local/sbin", "/usr/local/bin"];

const LINUX_TOOLS_DIR: &str = "/usr/lib/linux-tools";

const DOCTOR_SCRIPT_NAME: &str = "doctor.sh";

/// Install locations; the working directory is never searched because the
/// script runs through the credential ladder.
const DOCTOR_SCRIPT_DIRS: &[&str] = &["/usr/local/share/usbip-share", "/usr/share/usbip-share"];

/// Resolved tool locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub usbip: PathBuf,
    pub lsusb: PathBuf,
    pub ls: PathBuf,
    pub shell: String,
    pub doctor_script: Option<PathBuf>,
}

impl ToolPaths {
    /// Resolve every tool from settings, falling back to well-known
    /// locations and finally to a bare name for `PATH` lookup.
    pub fn resolve(settings: &ToolSettings) -> Self {
        let usbip = settings
            .usbip
            .clone()
            .unwrap_or_else(|| find_tool("usbip", &usbip_search_dirs()));
        let lsusb = settings
            .lsusb
            .clone()
            .unwrap_or_else(|| find_tool("lsusb", &system_dirs()));
        let doctor_script = match &settings.doctor_script {
            Some(path) => Some(path.clone()),
            None => find_doctor_script(),
        };

        debug!(
            "Tools: usbip={}, lsusb={}, doctor={:?}",
            usbip.display(),
            lsusb.display(),
            doctor_script
        );

        Self {
            usbip,
            lsusb,
            ls: PathBuf::from("ls"),
            shell: settings.shell.clone(),
            doctor_script,
        }
    }

    /// Bare tool names, resolved through `PATH`
    pub fn bare() -> Self {
        Self {
            usbip: PathBuf::from("usbip"),
            lsusb: PathBuf::from("lsusb"),
            ls: PathBuf::from("ls"),
            shell: "bash".to_string(),
            doctor_script: None,
        }
    }

    pub fn with_doctor_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.doctor_script = Some(script.into());
        self
    }

    pub fn usbip(&self) -> CommandRequest {
        CommandRequest::new(self.usbip.to_string_lossy())
    }

    pub fn list_local(&self) -> CommandRequest {
        self.usbip().args(["list", "-l"])
    }

    pub fn list_remote(&self, host: &str) -> CommandRequest {
        self.usbip().args(["list", "-r", host])
    }

    pub fn bind(&self, busid: &str) -> CommandRequest {
        self.usbip().args(["bind", "-b", busid]).privileged(true)
    }

    pub fn unbind(&self, busid: &str) -> CommandRequest {
        self.usbip().args(["unbind", "-b", busid]).privileged(true)
    }

    pub fn attach(&self, host: &str, busid: &str) -> CommandRequest {
        self.usbip()
            .args(["attach", "-r", host, "-b", busid])
            .privileged(true)
    }

    pub fn detach(&self, port: &str) -> CommandRequest {
        self.usbip().args(["detach", "-p", port]).privileged(true)
    }

    pub fn port(&self) -> CommandRequest {
        self.usbip().arg("port")
    }

    pub fn lsusb(&self) -> CommandRequest {
        CommandRequest::new(self.lsusb.to_string_lossy())
    }

    pub fn list_dir(&self, dir: &Path) -> CommandRequest {
        CommandRequest::new(self.ls.to_string_lossy())
            .arg("-la")
            .arg(dir.to_string_lossy())
            .privileged(true)
    }

    /// Diagnostic script invocation, or `None` when the script is not
    /// installed. The script inspects root-only state.
    pub fn doctor(&self, args: &[&str]) -> Option<CommandRequest> {
        let script = self.doctor_script.as_ref()?;
        Some(
            CommandRequest::new(self.shell.clone())
                .arg(script.to_string_lossy())
                .args(args.iter().copied())
                .privileged(true),
        )
    }
}

fn system_dirs() -> Vec<PathBuf> {
    SYSTEM_DIRS.iter().map(PathBuf::from).collect()
}

/// System directories, then per-kernel linux-tools directories, newest
/// version first.
fn usbip_search_dirs() -> Vec<PathBuf> {
    let mut dirs = system_dirs();
    if let Ok(entries) = std::fs::read_dir(LINUX_TOOLS_DIR) {
        let mut versions: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        versions.sort();
        versions.reverse();
        dirs.extend(versions);
    }
    dirs
}

fn find_tool(name: &str, dirs: &[PathBuf]) -> PathBuf {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(name))
}

fn find_doctor_script() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok();
    doctor_script_candidates(exe.as_deref())
        .into_iter()
        .find(|path| path.is_file())
}

/// Next to the executable, its `../share/usbip-share`, then the install
/// locations. Relative paths are dropped.
fn doctor_script_candidates(exe: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = exe.and_then(Path::parent) {
        candidates.push(dir.join(DOCTOR_SCRIPT_NAME));
        if let Some(prefix) = dir.parent() {
            candidates.push(
                prefix
                    .join("share")
                    .join("usbip-share")
                    .join(DOCTOR_SCRIPT_NAME),
            );
        }
    }
    candidates.extend(
        DOCTOR_SCRIPT_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(DOCTOR_SCRIPT_NAME)),
    );
    candidates.retain(|path| path.is_absolute());
    candidates
}
