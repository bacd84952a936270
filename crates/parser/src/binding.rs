//! Driver binding directory listing (`ls -la /sys/bus/usb/drivers/usbip-host`)
//!
//! Devices bound to the driver appear as symlinks named after their busid.
//! Interface links (`1-1:1.0`) and the driver's control files are ignored.

use common::{is_busid_token, normalize_busid};
use std::collections::BTreeSet;

/// Busids bound to the driver according to an `ls -la` listing.
pub fn parse_driver_listing(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(entry_name)
        .filter(|name| is_busid_token(name))
        .map(normalize_busid)
        .collect()
}

/// Busids among plain directory entry names (as returned by `read_dir`).
pub fn busids_from_entries<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|name| is_busid_token(name.as_ref()))
        .map(|name| normalize_busid(name.as_ref()))
        .collect()
}

/// The entry name of one `ls -l` line: the token before `->` for symlinks,
/// otherwise the last token.
fn entry_name(line: &str) -> Option<&str> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.iter().position(|t| *t == "->") {
        Some(arrow) if arrow > 0 => Some(tokens[arrow - 1]),
        Some(_) => None,
        None => tokens.last().copied(),
    }
}
