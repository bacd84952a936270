//! Credential ladder for privileged commands

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One way of running a command as root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialStrategy {
    /// Run as-is (already root, or privilege disabled)
    Direct,
    /// `sudo -n`: cached credentials or NOPASSWD only, never prompts
    SudoNonInteractive,
    /// `sudo -A`: prompts through `$SUDO_ASKPASS`
    SudoAskpass,
    /// `pkexec`: prompts through the polkit agent
    Pkexec,
}

impl CredentialStrategy {
    /// Whether this strategy may block on a password prompt
    pub fn is_interactive(self) -> bool {
        matches!(self, Self::SudoAskpass | Self::Pkexec)
    }

    /// Wrap `argv` for this strategy, or `None` when the strategy cannot
    /// be used in this environment.
    pub fn wrap(self, argv: &[String]) -> Option<Vec<String>> {
        let prefix: &[&str] = match self {
            Self::Direct => &[],
            Self::SudoNonInteractive => &["sudo", "-n", "--"],
            Self::SudoAskpass => {
                std::env::var_os("SUDO_ASKPASS")?;
                &["sudo", "-A", "--"]
            }
            Self::Pkexec => &["pkexec"],
        };
        Some(
            prefix
                .iter()
                .map(|s| s.to_string())
                .chain(argv.iter().cloned())
                .collect(),
        )
    }
}

impl std::fmt::Display for CredentialStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::SudoNonInteractive => "sudo-non-interactive",
            Self::SudoAskpass => "sudo-askpass",
            Self::Pkexec => "pkexec",
        };
        f.write_str(name)
    }
}

/// A strategy with its own timeout. Without one the request's timeout
/// applies; interactive strategies fall back to the interactive timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rung {
    pub strategy: CredentialStrategy,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration"
    )]
    pub timeout: Option<Duration>,
}

impl Rung {
    pub fn new(strategy: CredentialStrategy) -> Self {
        Self {
            strategy,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn effective_timeout(&self, request: Duration, interactive: Duration) -> Duration {
        match self.timeout {
            Some(timeout) => timeout,
            None if self.strategy.is_interactive() => interactive.max(request),
            None => request,
        }
    }
}

/// Ordered credential strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeLadder {
    rungs: Vec<Rung>,
}

impl Default for PrivilegeLadder {
    fn default() -> Self {
        Self::new(vec![
            Rung::new(CredentialStrategy::SudoNonInteractive),
            Rung::new(CredentialStrategy::SudoAskpass),
            Rung::new(CredentialStrategy::Pkexec),
        ])
    }
}

impl PrivilegeLadder {
    pub fn new(rungs: Vec<Rung>) -> Self {
        Self { rungs }
    }

    /// Rungs usable for a request; interactive rungs are skipped unless the
    /// request allows prompting.
    pub fn rungs(&self, allow_interactive: bool) -> impl Iterator<Item = &Rung> {
        self.rungs
            .iter()
            .filter(move |rung| allow_interactive || !rung.strategy.is_interactive())
    }

    pub fn strategies(&self) -> Vec<CredentialStrategy> {
        self.rungs.iter().map(|rung| rung.strategy).collect()
    }

    pub fn into_rungs(self) -> Vec<Rung> {
        self.rungs
    }

    pub fn is_direct_only(&self) -> bool {
        self.rungs
            .iter()
            .all(|rung| rung.strategy == CredentialStrategy::Direct)
    }
}

mod optional_duration {
    use crate::config::duration_serde::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv() -> Vec<String> {
        vec!["/usr/sbin/usbip".into(), "bind".into(), "-b".into(), "1-1".into()]
    }

    #[test]
    fn test_wrap() {
        assert_eq!(CredentialStrategy::Direct.wrap(&argv()).unwrap(), argv());
        assert_eq!(
            CredentialStrategy::SudoNonInteractive.wrap(&argv()).unwrap(),
            vec!["sudo", "-n", "--", "/usr/sbin/usbip", "bind", "-b", "1-1"]
        );
        assert_eq!(
            CredentialStrategy::Pkexec.wrap(&argv()).unwrap(),
            vec!["pkexec", "/usr/sbin/usbip", "bind", "-b", "1-1"]
        );
    }

    #[test]
    fn test_non_interactive_requests_skip_prompting_rungs() {
        let ladder = PrivilegeLadder::default();
        let strategies: Vec<_> = ladder.rungs(false).map(|r| r.strategy).collect();
        assert_eq!(strategies, vec![CredentialStrategy::SudoNonInteractive]);
        assert_eq!(ladder.rungs(true).count(), 3);
    }

    #[test]
    fn test_effective_timeout() {
        let request = Duration::from_secs(5);
        let interactive = Duration::from_secs(30);

        let sudo = Rung::new(CredentialStrategy::SudoNonInteractive);
        assert_eq!(sudo.effective_timeout(request, interactive), request);

        let pkexec = Rung::new(CredentialStrategy::Pkexec);
        assert_eq!(pkexec.effective_timeout(request, interactive), interactive);

        let fixed = pkexec.with_timeout(Duration::from_secs(60));
        assert_eq!(
            fixed.effective_timeout(request, interactive),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_rung_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            ladder: Vec<Rung>,
        }

        let wrapper: Wrapper = toml::from_str(
            r#"
            [[ladder]]
            strategy = "sudo-non-interactive"

            [[ladder]]
            strategy = "pkexec"
            timeout = "45s"
            "#,
        )
        .unwrap();

        assert_eq!(wrapper.ladder[0], Rung::new(CredentialStrategy::SudoNonInteractive));
        assert_eq!(
            wrapper.ladder[1],
            Rung::new(CredentialStrategy::Pkexec).with_timeout(Duration::from_secs(45))
        );
    }
}
