//! Section extraction for sectioned reports (the diagnostic script)
//!
//! A section starts at a header line and runs until the next top-level
//! header. Headers are either `=== Title ===` banners or unindented lines
//! ending in `:` that contain no digits (`Kernel status:`), which keeps
//! content lines such as `Found 2 USB device(s):` inside their section.

/// Return the body of the first section whose header starts with `header`
/// (case-insensitive, trailing `:` ignored), or `None` if there is no such
/// section.
pub fn section(text: &str, header: &str) -> Option<String> {
    let wanted = header.trim().trim_end_matches(':').to_ascii_lowercase();
    let mut lines = text.lines();

    lines.by_ref().find(|line| {
        is_header(line) && header_title(line).to_ascii_lowercase().starts_with(&wanted)
    })?;

    let body: Vec<&str> = lines.take_while(|line| !is_header(line)).collect();
    Some(body.join("\n"))
}

/// Whether `line` opens a new section
pub fn is_header(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.starts_with("===") && trimmed.ends_with("===") {
        return true;
    }
    let indented = line.starts_with(char::is_whitespace);
    !indented
        && trimmed.ends_with(':')
        && !trimmed.starts_with('-')
        && !trimmed.bytes().any(|b| b.is_ascii_digit())
}

fn header_title(line: &str) -> &str {
    line.trim()
        .trim_matches('=')
        .trim()
        .trim_end_matches(':')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::DOCTOR_FULL;

    #[test]
    fn test_section_bounds() {
        let body = section(DOCTOR_FULL, "Local USB devices:").unwrap();
        assert!(body.contains("busid 1-1"));
        assert!(body.contains("Found 2 USB device(s)"));
        assert!(!body.contains("status 1"));
        assert!(!body.contains("usbip_host"));
    }

    #[test]
    fn test_section_case_insensitive() {
        let body = section(DOCTOR_FULL, "kernel STATUS").unwrap();
        assert!(body.contains("1-1: status 1"));
        assert!(!body.contains("usbipd"));
    }

    #[test]
    fn test_missing_section() {
        assert!(section(DOCTOR_FULL, "Remote devices").is_none());
        assert!(section("", "Kernel status").is_none());
    }

    #[test]
    fn test_header_detection() {
        assert!(is_header("Kernel status:"));
        assert!(is_header("=== USB/IP doctor ==="));
        assert!(!is_header("Found 2 USB device(s):"));
        assert!(!is_header("  usbip_host: loaded"));
        assert!(!is_header("1-1: status 1"));
        assert!(!is_header(""));
    }
}
