//! Command execution
//!
//! Every external tool goes through a [`CommandRunner`]. A runner never
//! fails: spawn errors, timeouts and non-zero exits all come back as a
//! [`CommandOutput`], which callers classify with [`CommandOutput::error`].

mod privilege;
mod system;

pub use privilege::{CredentialStrategy, PrivilegeLadder, Rung};
pub use system::SystemRunner;

use common::Error;
use std::future::Future;
use std::time::Duration;

/// Exit code reported when a command is killed for exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when a command could not be started
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Markers in stderr meaning the escalation tool wanted credentials it
/// could not get. The next rung of the ladder may still succeed.
const CREDENTIAL_MARKERS: &[&str] = &[
    "a password is required",
    "a terminal is required",
    "no tty present",
    "no askpass program",
    "not in the sudoers file",
    "not allowed to execute",
    "not authorized",
    "request dismissed",
    "authentication failed",
    "incorrect password",
];

const DENIED_MARKERS: &[&str] = &["permission denied", "operation not permitted"];

const NOT_FOUND_MARKERS: &[&str] = &["command not found", "no such file or directory"];

/// One command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Needs root; the runner wraps it in the credential ladder
    pub privileged: bool,
    /// May wait on a password prompt, which allows the interactive rungs
    pub interactive: bool,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            privileged: false,
            interactive: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Command line for messages, with the program shown by file name
    pub fn display(&self) -> String {
        let program = std::path::Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone());
        std::iter::once(program)
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited,
    TimedOut,
    SpawnFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Display form of the command that produced this output
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub termination: Termination,
    /// Ladder rung that produced this output, if the command was wrapped
    pub strategy: Option<CredentialStrategy>,
    pub timeout: Duration,
}

impl CommandOutput {
    pub fn exited(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            termination: Termination::Exited,
            strategy: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn timed_out(command: impl Into<String>, timeout: Duration) -> Self {
        let command = command.into();
        Self {
            stderr: format!("{} timed out after {:.1}s", command, timeout.as_secs_f64()),
            command,
            stdout: String::new(),
            exit_code: TIMEOUT_EXIT_CODE,
            termination: Termination::TimedOut,
            strategy: None,
            timeout,
        }
    }

    pub fn spawn_failed(command: impl Into<String>, error: &std::io::Error) -> Self {
        let command = command.into();
        Self {
            stderr: format!("failed to run {}: {}", command, error),
            command,
            stdout: String::new(),
            exit_code: if error.kind() == std::io::ErrorKind::NotFound {
                NOT_FOUND_EXIT_CODE
            } else {
                -1
            },
            termination: Termination::SpawnFailed,
            strategy: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_strategy(mut self, strategy: CredentialStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.exit_code == 0
    }

    pub fn is_timeout(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// The escalation tool could not obtain credentials
    pub fn credential_required(&self) -> bool {
        if self.strategy.is_none() || self.termination != Termination::Exited || self.success() {
            return false;
        }
        let stderr = self.stderr.to_lowercase();
        // pkexec: 126 dismissed, 127 not authorized
        let pkexec_refused = self.strategy == Some(CredentialStrategy::Pkexec)
            && matches!(self.exit_code, 126 | 127)
            && !contains_any(&stderr, NOT_FOUND_MARKERS);
        pkexec_refused || contains_any(&stderr, CREDENTIAL_MARKERS)
    }

    pub fn mentions(&self, needle: &str) -> bool {
        self.combined().to_lowercase().contains(&needle.to_lowercase())
    }

    /// Classify a failed command; `None` on success.
    pub fn error(&self) -> Option<Error> {
        if self.success() {
            return None;
        }
        let program = self
            .command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        let error = match self.termination {
            Termination::TimedOut => Error::Timeout {
                command: self.command.clone(),
                seconds: self.timeout.as_secs_f64(),
            },
            Termination::SpawnFailed if self.exit_code == NOT_FOUND_EXIT_CODE => {
                Error::ToolNotFound { tool: program }
            }
            Termination::SpawnFailed => Error::ToolFailure {
                command: self.command.clone(),
                code: self.exit_code,
                stderr: self.detail(),
            },
            Termination::Exited => {
                let stderr = self.stderr.to_lowercase();
                if self.credential_required() || contains_any(&stderr, DENIED_MARKERS) {
                    Error::PermissionDenied {
                        command: self.command.clone(),
                        detail: self.detail(),
                    }
                } else if self.exit_code == NOT_FOUND_EXIT_CODE
                    || contains_any(&stderr, &["command not found"])
                {
                    Error::ToolNotFound { tool: program }
                } else {
                    Error::ToolFailure {
                        command: self.command.clone(),
                        code: self.exit_code,
                        stderr: self.detail(),
                    }
                }
            }
        };
        Some(error)
    }

    /// Non-empty lines of stderr, or of stdout when stderr is empty
    fn detail(&self) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            "no output".to_string()
        } else {
            lines.join("\n")
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Runs external commands
pub trait CommandRunner: Send + Sync {
    fn run(&self, request: &CommandRequest) -> impl Future<Output = CommandOutput> + Send;
}

impl<R: CommandRunner> CommandRunner for std::sync::Arc<R> {
    fn run(&self, request: &CommandRequest) -> impl Future<Output = CommandOutput> + Send {
        (**self).run(request)
    }
}
