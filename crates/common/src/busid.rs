//! Bus identifier and host string normalization
//!
//! A busid (`B-D`, e.g. `1-6`) is the join key between every data source the
//! engine reads. Different tools pad the numbers differently (`001-002` from
//! lsusb slots, `1-2` from usbip), so every busid is normalized before it is
//! compared, used as a map key, displayed, or placed on a command line.

/// Canonicalize a busid.
///
/// Strings of the exact form `<digits>-<digits>` lose leading zeros on both
/// sides (`001-002` becomes `1-2`, `0-0` stays `0-0`). Anything else, including
/// hub paths like `1-1.4`, is returned unchanged (surrounding whitespace is
/// still trimmed).
pub fn normalize_busid(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('-') {
        Some((bus, dev)) if is_digits(bus) && is_digits(dev) => {
            format!("{}-{}", strip_zeros(bus), strip_zeros(dev))
        }
        _ => trimmed.to_string(),
    }
}

/// Whether `token` looks like a device busid, including hub port paths
/// (`1-1.4.2`). Interface entries such as `1-1:1.0` are not busids.
pub fn is_busid_token(token: &str) -> bool {
    let Some((bus, path)) = token.split_once('-') else {
        return false;
    };
    is_digits(bus) && !path.is_empty() && path.split('.').all(is_digits)
}

/// Reduce a user-supplied host string to the bare host name or address the
/// `usbip` tool expects.
///
/// Strips the scheme (`http://`), any userinfo (`admin@`), the path and query,
/// and a trailing `:port`. Bracketed IPv6 literals lose their brackets and
/// port; bare IPv6 literals are left intact.
pub fn sanitize_host(raw: &str) -> String {
    let mut host = raw.trim();

    if let Some((_, rest)) = host.split_once("://") {
        host = rest;
    }
    if let Some(end) = host.find(['/', '?', '#']) {
        host = &host[..end];
    }
    if let Some((_, rest)) = host.rsplit_once('@') {
        host = rest;
    }

    if let Some(inner) = host.strip_prefix('[') {
        return match inner.split_once(']') {
            Some((addr, _)) => addr.to_string(),
            None => inner.to_string(),
        };
    }

    // Exactly one colon means host:port; more means an IPv6 literal.
    if host.matches(':').count() == 1
        && let Some((name, _port)) = host.split_once(':')
    {
        host = name;
    }

    host.to_string()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn strip_zeros(s: &str) -> &str {
    let stripped = s.trim_start_matches('0');
    if stripped.is_empty() { "0" } else { stripped }
}
