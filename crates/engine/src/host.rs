//! The USB/IP host handle
//!
//! [`UsbipHost`] owns the command runner, resolved tools and event sink.
//! Its operations are split across the `inventory`, `publish`, `ops` and
//! `remote` modules.

use crate::config::EngineConfig;
use crate::exec::{CommandOutput, CommandRequest, CommandRunner, SystemRunner};
use crate::sysfs::SysfsView;
use crate::tools::ToolPaths;
use common::{Event, EventKind, EventLevel, EventSink, TracingSink};
use std::sync::Arc;
use tracing::debug;

pub struct UsbipHost<R = SystemRunner> {
    pub(crate) runner: R,
    pub(crate) config: EngineConfig,
    pub(crate) tools: ToolPaths,
    pub(crate) sysfs: SysfsView,
    sink: Arc<dyn EventSink>,
}

impl UsbipHost<SystemRunner> {
    /// Host backed by real processes, with tools resolved from `config`
    pub fn from_config(config: EngineConfig) -> Self {
        let runner = SystemRunner::from_config(&config);
        Self::new(runner, config)
    }
}

impl<R: CommandRunner> UsbipHost<R> {
    pub fn new(runner: R, config: EngineConfig) -> Self {
        let tools = ToolPaths::resolve(&config.tools);
        let sysfs = SysfsView::new(&config.sysfs);
        Self {
            runner,
            config,
            tools,
            sysfs,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub(crate) fn emit(&self, event: Event) {
        self.sink.record(&event);
    }

    /// Run with the configured command timeout. Timeouts are also
    /// reported as events.
    pub(crate) async fn run(&self, request: CommandRequest) -> CommandOutput {
        let request = request.timeout(self.config.timeouts.command);
        let output = self.runner.run(&request).await;
        debug!(
            "{} -> exit {} ({} bytes stdout)",
            output.command,
            output.exit_code,
            output.stdout.len()
        );
        if output.is_timeout() {
            self.emit(Event::new(
                EventKind::CommandTimedOut,
                EventLevel::Warning,
                format!(
                    "{} timed out after {:.1}s",
                    output.command,
                    output.timeout.as_secs_f64()
                ),
            ));
        } else if output.credential_required() {
            self.emit(Event::new(
                EventKind::PermissionDenied,
                EventLevel::Warning,
                format!("No credentials for {}", output.command),
            ));
        }
        output
    }
}
