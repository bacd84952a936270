//! usbip-share
//!
//! Share USB devices over the network with the Linux USB/IP tools: list
//! local devices and their publish state, publish and unpublish them, and
//! attach devices exported by other hosts.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::setup_logging;
use config::AppConfig;
use engine::UsbipHost;
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "usbip-share")]
#[command(
    author,
    version,
    about = "usbip-share - Publish and attach USB devices with USB/IP"
)]
#[command(long_about = "
Lists local USB devices, shows which are published through the usbip-host
driver, and publishes, unpublishes, attaches or detaches devices by driving
the usbip command line tools.

EXAMPLES:
    # List local devices and their publish state
    usbip-share list

    # Publish a device so remote hosts can attach it
    usbip-share bind 1-6

    # See what another host exports, then attach it
    usbip-share remote 192.168.1.5
    usbip-share attach 192.168.1.5 1-1.4

    # Machine readable output
    usbip-share --json ports

CONFIGURATION:
    Configuration files are searched in the following order:
    1. Path specified with --config
    2. ~/.config/usbip-share/config.toml
    3. /etc/usbip-share/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List local USB devices (default)
    List,
    /// Show busids currently published
    Published,
    /// List devices exported by a remote host
    Remote {
        /// Host name or address; schemes, ports and paths are stripped
        host: String,
    },
    /// List remote devices attached to this host
    Ports,
    /// Publish a local device
    Bind { busid: String },
    /// Unpublish a local device
    Unbind { busid: String },
    /// Attach a device exported by a remote host
    Attach { host: String, busid: String },
    /// Detach the device on a local port
    Detach { port: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.save_config {
        let config = AppConfig::default();
        let path = AppConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = if let Some(ref path) = args.config {
        AppConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        AppConfig::load_or_default().context("Failed to load configuration")?
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbip-share v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let host = UsbipHost::from_config(config.engine);
    let json = args.json;

    let outcome = match args.command.unwrap_or(Command::List) {
        Command::List => {
            output::print_discovery(host.discover().await, json)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Published => {
            output::print_published(&host.published_busids().await, json)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Remote { host: remote } => {
            let devices = host
                .list_remote(&remote)
                .await
                .with_context(|| format!("Failed to list devices on {}", remote))?;
            output::print_remote(&remote, &devices, json)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Ports => {
            let ports = host
                .list_ports()
                .await
                .context("Failed to list attached ports")?;
            output::print_ports(&ports, json)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Bind { busid } => host.bind(&busid).await,
        Command::Unbind { busid } => host.unbind(&busid).await,
        Command::Attach {
            host: remote,
            busid,
        } => host.attach(&remote, &busid).await,
        Command::Detach { port } => host.detach(&port).await,
    };

    output::print_outcome(&outcome, json)?;
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
