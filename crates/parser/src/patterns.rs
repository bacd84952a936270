//! Record-start line patterns
//!
//! Tool output differs between usbip builds, so each listing parser walks an
//! ordered list of [`LinePattern`]s and takes the first one that recognises a
//! line as the start of a device record. Strict patterns anchored to a known
//! format come first; the loose pattern that scans anywhere in the line is
//! only consulted when no strict pattern matched.
//!
//! Supporting a new output format means adding one entry to a pattern list.

use common::is_busid_token;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// How much a pattern trusts its match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    /// Anchored to a known format
    Strict,
    /// Scans anywhere in the line; only tried when no strict pattern matched
    Loose,
}

/// Fields a pattern extracted from a record-start line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStart {
    /// Raw busid as printed (not yet normalized)
    pub busid: String,
    /// Descriptive text following the busid, if the format carries it inline
    pub description: Option<String>,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
}

/// One entry of a pattern strategy list
pub struct LinePattern {
    pub name: &'static str,
    pub strength: Strength,
    regex: Regex,
    build: fn(&Captures<'_>, &str) -> Option<RecordStart>,
}

impl LinePattern {
    fn new(
        name: &'static str,
        strength: Strength,
        pattern: &str,
        build: fn(&Captures<'_>, &str) -> Option<RecordStart>,
    ) -> Self {
        Self {
            name,
            strength,
            // Patterns are compile-time literals covered by tests.
            regex: Regex::new(pattern).expect("invalid record pattern"),
            build,
        }
    }

    /// Try to recognise `line` as a record start.
    pub fn apply(&self, line: &str) -> Option<RecordStart> {
        let caps = self.regex.captures(line)?;
        (self.build)(&caps, line)
    }
}

impl std::fmt::Debug for LinePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinePattern")
            .field("name", &self.name)
            .field("strength", &self.strength)
            .finish()
    }
}

/// An ordered strategy list of record-start patterns
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<LinePattern>,
}

impl PatternSet {
    /// Patterns for local listings: `usbip list -l` (current and legacy
    /// layouts), `usbip list -p -l`, and the diagnostic script
    pub fn local() -> &'static PatternSet {
        &LOCAL_PATTERNS
    }

    /// Patterns for `usbip list -r <host>`
    pub fn remote() -> &'static PatternSet {
        &REMOTE_PATTERNS
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name).collect()
    }

    /// Find the first pattern recognising `line` as a record start.
    ///
    /// `open_busid` is the raw busid of the record currently being collected;
    /// the loose pattern never re-opens that same record, and never treats a
    /// `:`-prefixed continuation line as a new record.
    pub fn match_line(
        &self,
        line: &str,
        open_busid: Option<&str>,
    ) -> Option<(&'static str, RecordStart)> {
        let strict = self
            .patterns
            .iter()
            .filter(|p| p.strength == Strength::Strict)
            .find_map(|p| p.apply(line).map(|start| (p.name, start)));
        if strict.is_some() {
            return strict;
        }

        if line.trim_start().starts_with(':') {
            return None;
        }

        self.patterns
            .iter()
            .filter(|p| p.strength == Strength::Loose)
            .find_map(|p| p.apply(line).map(|start| (p.name, start)))
            .filter(|(_, start)| Some(start.busid.as_str()) != open_busid)
    }
}

const BUSID: &str = r"\d+-\d+(?:\.\d+)*";
const HEX4: &str = r"[0-9a-fA-F]{4}";

static LOCAL_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| PatternSet {
    patterns: vec![busid_marker(), busid_colon(), parsable(), loose()],
});

static REMOTE_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| PatternSet {
    patterns: vec![busid_colon(), busid_marker(), loose()],
});

/// ` - busid 1-1.4 (046d:c52b)` (usbip-utils 2.x and the diagnostic script)
fn busid_marker() -> LinePattern {
    LinePattern::new(
        "busid-marker",
        Strength::Strict,
        &format!(
            r"^\s*-\s+busid\s+(?P<busid>{BUSID})\s+\((?P<vid>{HEX4}):(?P<pid>{HEX4})\)\s*(?P<rest>.*)$"
        ),
        |caps, _| {
            Some(RecordStart {
                busid: caps["busid"].to_string(),
                description: non_empty(&caps["rest"]),
                vendor_id: Some(caps["vid"].to_string()),
                product_id: Some(caps["pid"].to_string()),
            })
        },
    )
}

/// `1-6: 04f3 : unknown product (04f3:22e8)` (legacy local and remote lists)
fn busid_colon() -> LinePattern {
    LinePattern::new(
        "busid-colon",
        Strength::Strict,
        &format!(r"^\s*(?P<busid>{BUSID}):\s+(?P<rest>\S.*)$"),
        |caps, _| {
            let rest = caps["rest"].trim();
            let (vendor_id, product_id) = find_usb_id(rest).unzip();
            Some(RecordStart {
                busid: caps["busid"].to_string(),
                description: Some(rest.to_string()),
                vendor_id,
                product_id,
            })
        },
    )
}

/// `busid=1-1#usbid=abcd:1234#` (`usbip list -p -l`)
fn parsable() -> LinePattern {
    LinePattern::new(
        "parsable",
        Strength::Strict,
        &format!(r"^\s*busid=(?P<busid>{BUSID})#usbid=(?P<vid>{HEX4}):(?P<pid>{HEX4})#"),
        |caps, _| {
            Some(RecordStart {
                busid: caps["busid"].to_string(),
                description: None,
                vendor_id: Some(caps["vid"].to_string()),
                product_id: Some(caps["pid"].to_string()),
            })
        },
    )
}

/// Any line holding both a busid token and a `vvvv:pppp` token
fn loose() -> LinePattern {
    LinePattern::new(
        "loose",
        Strength::Loose,
        &format!(r"\b(?P<vid>{HEX4}):(?P<pid>{HEX4})\b"),
        |caps, line| {
            let busid = line
                .split(|c: char| c.is_whitespace() || "(),;[]<>'\"".contains(c))
                .map(|token| token.trim_end_matches(':'))
                .find(|token| is_busid_token(token))?;
            Some(RecordStart {
                busid: busid.to_string(),
                description: non_empty(line.trim()),
                vendor_id: Some(caps["vid"].to_string()),
                product_id: Some(caps["pid"].to_string()),
            })
        },
    )
}

static PAREN_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([0-9a-fA-F]{4}):([0-9a-fA-F]{4})\)").expect("invalid id pattern")
});

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9a-fA-F]{4}):([0-9a-fA-F]{4})\b").expect("invalid id pattern")
});

static NAMED_ID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>[^:\s].*?)\s*\([0-9a-fA-F]{4}:[0-9a-fA-F]{4}\)\s*$")
        .expect("invalid name pattern")
});

/// Find a `vendor:product` pair, preferring the parenthesised `(vvvv:pppp)`
/// form over a bare `vvvv:pppp` token. IDs are lowercased.
pub fn find_usb_id(text: &str) -> Option<(String, String)> {
    PAREN_ID
        .captures(text)
        .or_else(|| BARE_ID.captures(text))
        .map(|caps| (caps[1].to_ascii_lowercase(), caps[2].to_ascii_lowercase()))
}

/// Strip a trailing `(vvvv:pppp)` from a description to get a display name.
pub fn name_from_description(description: &str) -> Option<String> {
    let name = match PAREN_ID.find(description) {
        Some(m) => &description[..m.start()],
        None => description,
    };
    non_empty(name.trim())
}

/// Name from a detail line of the form `Vendor : Product (vvvv:pppp)`
pub fn name_from_detail(line: &str) -> Option<String> {
    NAMED_ID_LINE
        .captures(line)
        .and_then(|caps| non_empty(caps["name"].trim()))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
