//! Diagnostic script report parsing

use crate::listing::parse_local_devices;
use crate::section::section;
use common::{LocalDevice, is_busid_token, normalize_busid};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Header of the device section in a full report
pub const LOCAL_DEVICES_HEADER: &str = "Local USB devices:";

/// Header of the per-busid driver status section
pub const KERNEL_STATUS_HEADER: &str = "Kernel status:";

static STATUS_ONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bstatus\s*[:=]?\s*1\b").expect("invalid status pattern")
});

static BOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbound\b").expect("invalid bound pattern"));

static NOT_BOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnot\s+bound\b").expect("invalid bound pattern"));

/// Devices listed by the diagnostic script.
///
/// Uses the `Local USB devices:` section when present, otherwise the whole
/// output (the script's `--local-devices` mode prints only that section).
pub fn parse_doctor_devices(output: &str) -> Vec<LocalDevice> {
    match section(output, LOCAL_DEVICES_HEADER) {
        Some(body) => parse_local_devices(&body),
        None => parse_local_devices(output),
    }
}

/// Busids the `Kernel status:` section marks as bound (or status 1).
///
/// Returns `None` when the report has no such section, so callers can tell
/// "nothing bound" apart from "no information".
pub fn parse_kernel_status(output: &str) -> Option<BTreeSet<String>> {
    let body = section(output, KERNEL_STATUS_HEADER)?;

    let bound = body
        .lines()
        .filter_map(|line| {
            let busid = line
                .split_whitespace()
                .map(|token| token.trim_end_matches([':', ',']))
                .find(|token| is_busid_token(token))?;
            let is_bound = STATUS_ONE.is_match(line)
                || (BOUND.is_match(line) && !NOT_BOUND.is_match(line));
            is_bound.then(|| normalize_busid(busid))
        })
        .collect();

    Some(bound)
}
