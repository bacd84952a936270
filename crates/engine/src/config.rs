//! Engine configuration
//!
//! Every section has defaults, so an empty TOML table is a valid
//! configuration. Paths are taken as given; tilde expansion is the job of
//! whoever loads the file.

use crate::exec::{CredentialStrategy, PrivilegeLadder, Rung};
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub privilege: PrivilegeSettings,
    #[serde(default)]
    pub sysfs: SysfsSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

/// Tool locations. `None` means search the usual install locations and
/// then `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usbip: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lsusb: Option<PathBuf>,
    /// Bundled diagnostic script (`doctor.sh`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_script: Option<PathBuf>,
    /// Interpreter used to run the diagnostic script
    #[serde(default = "ToolSettings::default_shell")]
    pub shell: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            usbip: None,
            lsusb: None,
            doctor_script: None,
            shell: Self::default_shell(),
        }
    }
}

impl ToolSettings {
    fn default_shell() -> String {
        "bash".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Upper bound for one non-interactive command
    #[serde(default = "TimeoutSettings::default_command", with = "duration_serde")]
    pub command: Duration,
    /// Upper bound for a command waiting on a password prompt
    #[serde(
        default = "TimeoutSettings::default_interactive",
        with = "duration_serde"
    )]
    pub interactive: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            interactive: Self::default_interactive(),
        }
    }
}

impl TimeoutSettings {
    fn default_command() -> Duration {
        Duration::from_secs(5)
    }

    fn default_interactive() -> Duration {
        Duration::from_secs(30)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeSettings {
    /// Wrap privileged commands in the credential ladder. Ignored when
    /// already running as root.
    #[serde(default = "PrivilegeSettings::default_enabled")]
    pub enabled: bool,
    /// Credential strategies, tried in order
    #[serde(default = "PrivilegeSettings::default_ladder")]
    pub ladder: Vec<Rung>,
}

impl Default for PrivilegeSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            ladder: Self::default_ladder(),
        }
    }
}

impl PrivilegeSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_ladder() -> Vec<Rung> {
        PrivilegeLadder::default().into_rungs()
    }

    pub fn ladder(&self) -> PrivilegeLadder {
        if self.enabled {
            PrivilegeLadder::new(self.ladder.clone())
        } else {
            PrivilegeLadder::new(vec![Rung::new(CredentialStrategy::Direct)])
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysfsSettings {
    /// Directory of the usbip-host driver; bound devices appear as entries
    #[serde(default = "SysfsSettings::default_driver_dir")]
    pub driver_dir: PathBuf,
    /// USB device directory with `idVendor`/`idProduct` attributes
    #[serde(default = "SysfsSettings::default_devices_dir")]
    pub devices_dir: PathBuf,
}

impl Default for SysfsSettings {
    fn default() -> Self {
        Self {
            driver_dir: Self::default_driver_dir(),
            devices_dir: Self::default_devices_dir(),
        }
    }
}

impl SysfsSettings {
    fn default_driver_dir() -> PathBuf {
        PathBuf::from("/sys/bus/usb/drivers/usbip-host")
    }

    fn default_devices_dir() -> PathBuf {
        PathBuf::from("/sys/bus/usb/devices")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Ask the diagnostic script first when it is installed
    #[serde(default = "enabled")]
    pub use_diagnostic_script: bool,
    /// Fall back to `lsusb` when usbip reports nothing
    #[serde(default = "enabled")]
    pub lsusb_fallback: bool,
    /// Replace "unknown product" names with the `lsusb` description
    #[serde(default = "enabled")]
    pub enrich_names: bool,
    /// Detect publish state by attempting a bind when sysfs and the
    /// diagnostic script are both unavailable. Mutates host state.
    #[serde(default = "enabled")]
    pub probe_by_bind: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            use_diagnostic_script: true,
            lsusb_fallback: true,
            enrich_names: true,
            probe_by_bind: true,
        }
    }
}

fn enabled() -> bool {
    true
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.command.is_zero() {
            return Err(Error::Config("timeouts.command must be greater than zero".into()));
        }
        if self.timeouts.interactive < self.timeouts.command {
            return Err(Error::Config(
                "timeouts.interactive must not be shorter than timeouts.command".into(),
            ));
        }
        if self.privilege.enabled && self.privilege.ladder.is_empty() {
            return Err(Error::Config(
                "privilege.ladder is empty; disable privilege instead".into(),
            ));
        }
        if self.tools.shell.trim().is_empty() {
            return Err(Error::Config("tools.shell must not be empty".into()));
        }
        Ok(())
    }
}

/// Durations as human strings ("5s", "1m30s", "750ms")
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        format_duration(*duration).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parse "1h", "30m", "1m30s", "250ms"; a bare number is seconds.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim().to_lowercase();
        if s.is_empty() {
            return Err("Empty duration".to_string());
        }

        let mut total_ms: u64 = 0;
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            let mut digits = String::new();
            while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(c);
                chars.next();
            }
            let mut unit = String::new();
            while let Some(c) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
                unit.push(c);
                chars.next();
            }

            if digits.is_empty() {
                return Err(format!("Invalid duration format: {}", s));
            }
            let num: u64 = digits
                .parse()
                .map_err(|_| format!("Invalid number in duration: {}", digits))?;

            let factor = match unit.as_str() {
                "h" => 3_600_000,
                "m" => 60_000,
                "s" | "" => 1000,
                "ms" => 1,
                other => return Err(format!("Invalid duration unit: {}", other)),
            };
            total_ms = num
                .checked_mul(factor)
                .and_then(|ms| total_ms.checked_add(ms))
                .ok_or_else(|| format!("Duration too large: {}", s))?;

            if let Some(c) = chars.peek()
                && !c.is_ascii_digit()
            {
                return Err(format!("Invalid duration format: {}", s));
            }
        }

        Ok(Duration::from_millis(total_ms))
    }

    pub fn format_duration(d: Duration) -> String {
        let total_ms = d.as_millis() as u64;
        if total_ms % 1000 != 0 {
            return format!("{}ms", total_ms);
        }

        let secs = total_ms / 1000;
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let rest = secs % 60;

        let mut out = String::new();
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if mins > 0 {
            out.push_str(&format!("{}m", mins));
        }
        if rest > 0 || out.is_empty() {
            out.push_str(&format!("{}s", rest));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::duration_serde::{format_duration, parse_duration};
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.timeouts.command, Duration::from_secs(5));
        assert_eq!(config.timeouts.interactive, Duration::from_secs(30));
        assert!(config.privilege.enabled);
        assert_eq!(config.tools.shell, "bash");
        assert!(config.discovery.probe_by_bind);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("5 s").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("9999999999999999h").is_err());
        assert!(parse_duration("18446744073709551615ms1ms").is_err());
        assert!(parse_duration("99999999999999999999").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_millis(750)), "750ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_validate_rejects_bad_timeouts() {
        let mut config = EngineConfig::default();
        config.timeouts.command = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.timeouts.interactive = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_ladder() {
        let mut config = EngineConfig::default();
        config.privilege.ladder.clear();
        assert!(config.validate().is_err());

        config.privilege.enabled = false;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.privilege.ladder().strategies(),
            vec![CredentialStrategy::Direct]
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [timeouts]
            command = "2s"

            [discovery]
            probe_by_bind = false
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.command, Duration::from_secs(2));
        assert_eq!(config.timeouts.interactive, Duration::from_secs(30));
        assert!(!config.discovery.probe_by_bind);
        assert!(config.discovery.lsusb_fallback);
        assert_eq!(
            config.sysfs.driver_dir,
            PathBuf::from("/sys/bus/usb/drivers/usbip-host")
        );
    }
}
