//! USB/IP host engine
//!
//! Drives the `usbip` command line tools to list, publish and attach USB
//! devices. All system interaction goes through a [`CommandRunner`], so the
//! engine runs against real processes ([`SystemRunner`]) or scripted ones
//! ([`test_utils`]).
//!
//! # Example
//!
//! ```no_run
//! use engine::{EngineConfig, UsbipHost};
//!
//! # async fn example() {
//! let host = UsbipHost::from_config(EngineConfig::default());
//! for device in host.list_local_devices().await {
//!     println!("{} {} published={}", device.busid, device.device_name, device.is_published);
//! }
//! let outcome = host.bind("1-6").await;
//! assert!(outcome.success);
//! # }
//! ```

pub mod config;
pub mod exec;
pub mod host;
pub mod inventory;
pub mod ops;
pub mod publish;
pub mod remote;
pub mod sysfs;
pub mod test_utils;
pub mod tools;

pub use config::EngineConfig;
pub use exec::{
    CommandOutput, CommandRequest, CommandRunner, CredentialStrategy, PrivilegeLadder, Rung,
    SystemRunner, Termination,
};
pub use host::UsbipHost;
pub use ops::{validate_busid, validate_host, validate_port};
pub use publish::{DetectionMethod, PublishReport};
pub use tools::ToolPaths;
