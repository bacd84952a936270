//! `usbip port` parser
//!
//! Each attached device is a `Port <N>:` section. The remote end is reported
//! either as explicit `Remote host:` / `Remote busid:` lines or as a
//! `<local busid> -> usbip://<host>:<port>/<busid>` line, depending on the
//! tool version.

use common::{AttachedPort, normalize_busid, sanitize_host};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static PORT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Port\s+(?P<port>[0-9A-Za-z_.]+)\s*:").expect("invalid port pattern")
});

static REMOTE_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Remote host:\s*(?P<host>\S+)").expect("invalid host pattern")
});

static REMOTE_BUSID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Remote busid:\s*(?P<busid>\S+)").expect("invalid busid pattern")
});

static USBIP_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"usbip://(?P<authority>[^/\s]+)/(?P<busid>\S+)").expect("invalid url pattern")
});

/// Parse `usbip port` output into attached ports.
pub fn parse_attached_ports(output: &str) -> Vec<AttachedPort> {
    let mut ports = Vec::new();
    let mut open: Option<AttachedPort> = None;

    for line in output.lines() {
        if let Some(caps) = PORT_START.captures(line) {
            if let Some(port) = open.take() {
                ports.push(port);
            }
            open = Some(AttachedPort {
                port: caps["port"].to_string(),
                info: line.trim().to_string(),
                remote_host: None,
                remote_busid: None,
                details: Vec::new(),
            });
            continue;
        }

        let trimmed = line.trim();
        let Some(port) = open.as_mut() else {
            continue;
        };
        if trimmed.is_empty() {
            continue;
        }
        port.details.push(trimmed.to_string());

        if let Some(caps) = REMOTE_HOST.captures(line) {
            port.remote_host = Some(sanitize_host(&caps["host"]));
        } else if let Some(caps) = REMOTE_BUSID.captures(line) {
            port.remote_busid = Some(normalize_busid(&caps["busid"]));
        } else if let Some(caps) = USBIP_URL.captures(line) {
            port.remote_host
                .get_or_insert_with(|| sanitize_host(&caps["authority"]));
            port.remote_busid
                .get_or_insert_with(|| normalize_busid(&caps["busid"]));
        }
    }

    if let Some(port) = open.take() {
        ports.push(port);
    }

    debug!("parsed {} attached port(s)", ports.len());
    ports
}
