//! Test runners for the engine
//!
//! [`ScriptedRunner`] replays canned output per command line.
//! [`FakeUsbip`] emulates `usbip` and `lsusb` with real state, so bind and
//! unbind sequences can be checked end to end.
//!
//! # Example
//!
//! ```
//! use engine::test_utils::ScriptedRunner;
//! use engine::{CommandRequest, CommandRunner};
//!
//! # tokio_test_block(async {
//! let runner = ScriptedRunner::new().on("usbip port", "Imported USB devices\n");
//! let output = runner.run(&CommandRequest::new("usbip").arg("port")).await;
//! assert!(output.success());
//! assert_eq!(runner.commands(), vec!["usbip port"]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```

use crate::exec::{CommandOutput, CommandRequest, CommandRunner};
use crate::tools::ToolPaths;
use crate::{EngineConfig, UsbipHost};
use common::MemorySink;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Response {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    Timeout,
}

/// Replays canned output keyed by command line (`usbip list -l`).
/// Unknown commands fail as if the tool were not installed.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Vec<(String, Response)>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `command` exits 0 printing `stdout`
    pub fn on(self, command: &str, stdout: &str) -> Self {
        self.respond(command, 0, stdout, "")
    }

    /// `command` exits with `code` printing `stderr`
    pub fn on_failure(self, command: &str, code: i32, stderr: &str) -> Self {
        self.respond(command, code, "", stderr)
    }

    pub fn on_timeout(mut self, command: &str) -> Self {
        self.responses.push((command.to_string(), Response::Timeout));
        self
    }

    pub fn respond(mut self, command: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.push((
            command.to_string(),
            Response::Exit {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(CommandRequest::display).collect()
    }

    pub fn ran(&self, command: &str) -> bool {
        self.commands().iter().any(|c| c == command)
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: &CommandRequest) -> CommandOutput {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let command_line = request.display();
        match self.responses.iter().find(|(command, _)| *command == command_line) {
            Some((_, Response::Exit { code, stdout, stderr })) => {
                CommandOutput::exited(command_line, *code, stdout.as_str(), stderr.as_str())
            }
            Some((_, Response::Timeout)) => CommandOutput::timed_out(command_line, request.timeout),
            None => not_installed(command_line),
        }
    }
}

fn not_installed(command_line: String) -> CommandOutput {
    let error = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
    CommandOutput::spawn_failed(command_line, &error)
}

/// A device known to [`FakeUsbip`]
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub busid: String,
    pub vendor_id: String,
    pub product_id: String,
    pub name: String,
}

#[derive(Debug, Default)]
struct FakeState {
    devices: Vec<FakeDevice>,
    bound: BTreeSet<String>,
    /// (port, host, busid)
    attached: Vec<(u32, String, String)>,
}

/// Stateful stand-in for `usbip` and `lsusb`.
///
/// Bound devices can be mirrored into a directory that plays the role of
/// the usbip-host driver directory in sysfs.
#[derive(Debug, Default)]
pub struct FakeUsbip {
    state: Mutex<FakeState>,
    driver_dir: Option<PathBuf>,
    calls: Mutex<Vec<String>>,
}

impl FakeUsbip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, busid: &str, vendor_id: &str, product_id: &str, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.devices.push(FakeDevice {
                busid: busid.to_string(),
                vendor_id: vendor_id.to_string(),
                product_id: product_id.to_string(),
                name: name.to_string(),
            });
        }
        self
    }

    pub fn with_bound(self, busid: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.bound.insert(busid.to_string());
        }
        self.mirror(busid, true);
        self
    }

    /// Keep `dir` in sync with the bound set; created if missing
    pub fn mirror_driver_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).ok();
        self.driver_dir = Some(dir);
        let bound: Vec<String> = self.bound();
        for busid in bound {
            self.mirror(&busid, true);
        }
        self
    }

    pub fn bound(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.bound.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_bound(&self, busid: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.bound.contains(busid))
            .unwrap_or(false)
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn mirror(&self, busid: &str, bound: bool) {
        let Some(dir) = &self.driver_dir else {
            return;
        };
        let entry = dir.join(busid);
        if bound {
            std::fs::create_dir_all(entry).ok();
        } else {
            std::fs::remove_dir_all(entry).ok();
        }
    }

    fn usbip(&self, command_line: String, args: &[&str]) -> CommandOutput {
        let Ok(mut state) = self.state.lock() else {
            return CommandOutput::exited(command_line, 1, "", "usbip: error: state poisoned");
        };
        let ok = |stdout: String| CommandOutput::exited(command_line.clone(), 0, stdout, "");
        let err = |stderr: String| CommandOutput::exited(command_line.clone(), 1, "", stderr);

        match args {
            ["list", "-l"] => ok(state
                .devices
                .iter()
                .map(|d| {
                    format!(
                        " - busid {} ({}:{})\n   {} ({}:{})\n\n",
                        d.busid, d.vendor_id, d.product_id, d.name, d.vendor_id, d.product_id
                    )
                })
                .collect()),
            ["list", "-r", host] => {
                let mut out = format!("Exportable USB devices\n======================\n - {}\n", host);
                for d in state.devices.iter().filter(|d| state.bound.contains(&d.busid)) {
                    out.push_str(&format!(
                        "      {}: {} ({}:{})\n           : /sys/devices/usb/{}\n\n",
                        d.busid, d.name, d.vendor_id, d.product_id, d.busid
                    ));
                }
                ok(out)
            }
            ["bind", "-b", busid] => {
                if !state.devices.iter().any(|d| d.busid == *busid) {
                    err("usbip: error: device with the specified bus ID does not exist\n".into())
                } else if !state.bound.insert(busid.to_string()) {
                    err(format!(
                        "usbip: error: device on busid {} is already bound to usbip-host\n",
                        busid
                    ))
                } else {
                    drop(state);
                    self.mirror(busid, true);
                    ok(format!("usbip: info: bind device on busid {}: complete\n", busid))
                }
            }
            ["unbind", "-b", busid] => {
                if state.bound.remove(*busid) {
                    drop(state);
                    self.mirror(busid, false);
                    ok(format!("usbip: info: unbind device on busid {}: complete\n", busid))
                } else {
                    err("usbip: error: device is not bound to usbip-host driver\n".into())
                }
            }
            ["attach", "-r", host, "-b", busid] => {
                let port = state.attached.len() as u32;
                state.attached.push((port, host.to_string(), busid.to_string()));
                ok(String::new())
            }
            ["detach", "-p", port] => {
                let before = state.attached.len();
                let port_number = port.parse::<u32>().ok();
                state.attached.retain(|(p, _, _)| Some(*p) != port_number);
                if state.attached.len() < before {
                    ok(format!("usbip: info: Port {} is now detached!\n", port))
                } else {
                    err(format!("usbip: error: Invalid port {}\n", port))
                }
            }
            ["port"] => {
                let mut out = String::from("Imported USB devices\n====================\n");
                for (port, host, busid) in &state.attached {
                    out.push_str(&format!(
                        "Port {:02}: <Port in Use> at High Speed(480Mbps)\n       unknown vendor : unknown product\n       3-1 -> usbip://{}:3240/{}\n",
                        port, host, busid
                    ));
                }
                ok(out)
            }
            _ => err(format!("usbip: error: unsupported arguments {:?}\n", args)),
        }
    }

    fn lsusb(&self, command_line: String) -> CommandOutput {
        let Ok(state) = self.state.lock() else {
            return CommandOutput::exited(command_line, 1, "", "lsusb: state poisoned");
        };
        let mut out = String::from("Bus 001 Device 001: ID 1d6b:0002 Linux Foundation 2.0 root hub\n");
        for (i, d) in state.devices.iter().enumerate() {
            out.push_str(&format!(
                "Bus 001 Device {:03}: ID {}:{} {}\n",
                i + 2,
                d.vendor_id,
                d.product_id,
                d.name
            ));
        }
        CommandOutput::exited(command_line, 0, out, "")
    }
}

impl CommandRunner for FakeUsbip {
    async fn run(&self, request: &CommandRequest) -> CommandOutput {
        let command_line = request.display();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command_line.clone());
        }
        let program = Path::new(&request.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let args: Vec<&str> = request.args.iter().map(String::as_str).collect();

        match program.as_str() {
            "usbip" => self.usbip(command_line, &args),
            "lsusb" => self.lsusb(command_line),
            _ => not_installed(command_line),
        }
    }
}

/// Engine config whose sysfs paths live under `root` (which need not
/// exist) and with short timeouts
pub fn test_config(root: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.sysfs.driver_dir = root.join("drivers/usbip-host");
    config.sysfs.devices_dir = root.join("devices");
    config.timeouts.command = Duration::from_secs(2);
    config
}

/// Host over `runner` using bare tool names and a recording event sink
pub fn test_host<R: CommandRunner>(
    runner: R,
    config: EngineConfig,
) -> (UsbipHost<R>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let host = UsbipHost::new(runner, config)
        .with_tools(ToolPaths::bare())
        .with_sink(sink.clone());
    (host, sink)
}
