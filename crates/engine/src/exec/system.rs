//! Runner backed by real processes

use super::{CommandOutput, CommandRequest, CommandRunner, PrivilegeLadder};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Spawns commands with `tokio::process`, enforcing timeouts and walking
/// the credential ladder for privileged requests.
///
/// Each command runs in its own process group so a timeout kills any
/// children it spawned as well.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    ladder: PrivilegeLadder,
    interactive_timeout: Duration,
    is_root: bool,
}

impl SystemRunner {
    pub fn new(ladder: PrivilegeLadder, interactive_timeout: Duration) -> Self {
        Self {
            ladder,
            interactive_timeout,
            is_root: running_as_root(),
        }
    }

    pub fn from_config(config: &crate::EngineConfig) -> Self {
        Self::new(config.privilege.ladder(), config.timeouts.interactive)
    }

    async fn run_privileged(&self, request: &CommandRequest) -> CommandOutput {
        let argv = request.argv();
        let command_line = request.display();
        let mut last: Option<CommandOutput> = None;

        for rung in self.ladder.rungs(request.interactive) {
            let Some(wrapped) = rung.strategy.wrap(&argv) else {
                debug!("Skipping {} for {}: not available", rung.strategy, command_line);
                continue;
            };
            let timeout = rung.effective_timeout(request.timeout, self.interactive_timeout);
            let output = spawn(&wrapped, &command_line, timeout)
                .await
                .with_strategy(rung.strategy);

            if output.credential_required() {
                debug!(
                    "{} could not obtain credentials for {}: {}",
                    rung.strategy,
                    command_line,
                    output.stderr.trim()
                );
                last = Some(output);
                continue;
            }
            if output.termination == super::Termination::SpawnFailed && wrapped[0] != argv[0] {
                // The escalation tool itself is missing
                debug!("{} unavailable: {}", rung.strategy, output.stderr);
                last = Some(output);
                continue;
            }
            return output;
        }

        last.unwrap_or_else(|| {
            CommandOutput::exited(
                command_line.clone(),
                1,
                "",
                format!("{}: not authorized, no credential strategy available", command_line),
            )
            .with_strategy(super::CredentialStrategy::Direct)
        })
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(PrivilegeLadder::default(), Duration::from_secs(30))
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, request: &CommandRequest) -> CommandOutput {
        if request.privileged && !self.is_root && !self.ladder.is_direct_only() {
            return self.run_privileged(request).await;
        }
        spawn(&request.argv(), &request.display(), request.timeout).await
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

async fn spawn(argv: &[String], command_line: &str, timeout: Duration) -> CommandOutput {
    let Some((program, args)) = argv.split_first() else {
        let error = std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command");
        return CommandOutput::spawn_failed(command_line, &error);
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    debug!("Running: {}", argv.join(" "));
    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!("Failed to spawn {}: {}", program, e);
            return CommandOutput::spawn_failed(command_line, &e);
        }
    };
    let pid = child.id();

    let mut output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutput::exited(
            command_line,
            exit_code(&output.status),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ),
        Ok(Err(e)) => CommandOutput::spawn_failed(command_line, &e),
        Err(_) => {
            warn!("{} timed out after {:?}, killing", command_line, timeout);
            if let Some(pid) = pid {
                kill_group(pid);
            }
            return CommandOutput::timed_out(command_line, timeout);
        }
    };
    output.timeout = timeout;
    output
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}
