//! Alias file entries and the line format they are stored in.
//!
//! Every entry written by mailias looks like:
//!
//! ```text
//! alias jurgen-doe "Jürgen Doe" <jurgen@example.com> # mailias: 2024-01-04@10:00:00
//! ```
//!
//! The trailing `# mailias:` comment is the provenance marker. Lines without
//! it are never touched by a purge.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::address::{find_email, is_email};

/// Provenance marker written after every tool-generated entry.
pub const PROVENANCE_MARKER: &str = "mailias:";

/// `strftime` format of the canonical sent-date annotation.
pub const SENT_AT_FORMAT: &str = "%Y-%m-%d@%H:%M:%S";

static MARKER_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"#\s*{}", regex::escape(PROVENANCE_MARKER)))
        .expect("Invalid MARKER_COMMENT pattern")
});

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*([^<>\s]+)\s*>").expect("Invalid BRACKETED pattern"));

/// When the message was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentAt {
    /// The `Date:` header converted to absolute time.
    Parsed(DateTime<Utc>),
    /// The header text as found, kept for human reference only.
    Raw(String),
}

impl SentAt {
    /// The text written after the provenance marker.
    pub fn annotation(&self) -> String {
        match self {
            Self::Parsed(dt) => dt.format(SENT_AT_FORMAT).to_string(),
            Self::Raw(raw) => raw.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }

    /// The timestamp, if the date could be parsed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Parsed(dt) => Some(*dt),
            Self::Raw(_) => None,
        }
    }
}

impl std::fmt::Display for SentAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.annotation())
    }
}

/// Where an alias line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Written by mailias; carries the provenance marker.
    ToolGenerated,
    /// Anything else: hand-written, imported, or from another tool.
    PreExisting,
}

/// A new entry produced by the merge engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Alias token, `[a-z0-9-]+`.
    pub alias: String,
    /// Decoded display name as it will be stored (comma policy applied).
    pub display_name: String,
    /// Lowercased email address.
    pub email: String,
    pub sent_at: SentAt,
    pub provenance: Provenance,
}

impl AliasEntry {
    /// Render the entry as one alias-file line (without trailing newline).
    ///
    /// The quoted name is omitted when the display name is empty.
    pub fn to_line(&self) -> String {
        let mut line = format!("alias {} ", self.alias);
        if !self.display_name.is_empty() {
            line.push('"');
            line.push_str(&escape_quotes(&self.display_name));
            line.push_str("\" ");
        }
        line.push('<');
        line.push_str(&self.email);
        line.push('>');
        if self.provenance == Provenance::ToolGenerated {
            line.push_str(" # ");
            line.push_str(PROVENANCE_MARKER);
            let annotation = self.sent_at.annotation();
            if !annotation.is_empty() {
                line.push(' ');
                line.push_str(&annotation);
            }
        }
        line
    }
}

/// Escape a display name for the quoted alias field.
fn escape_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One line of an alias file, classified but kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLine {
    /// The line as text (no trailing newline).
    pub raw: String,
    /// Lowercased addresses of an `alias` line, in order. Group aliases
    /// carry several.
    pub emails: Vec<String>,
    pub provenance: Provenance,
    /// Bytes as read, when they differ from `raw` (legacy encoding, CRLF).
    original: Option<Vec<u8>>,
}

impl StoreLine {
    /// Classify a raw alias-file line.
    ///
    /// Only lines starting with the `alias` keyword carry addresses. Anything
    /// else (comments, blank lines, other mutt commands) is opaque.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim_end_matches(['\r', '\n']).to_string();
        let emails = alias_body(&raw).map(extract_emails).unwrap_or_default();
        let provenance = if !emails.is_empty() && MARKER_COMMENT.is_match(&raw) {
            Provenance::ToolGenerated
        } else {
            Provenance::PreExisting
        };
        Self {
            raw,
            emails,
            provenance,
            original: None,
        }
    }

    /// Remember the bytes this line was decoded from, so it is written back
    /// unchanged.
    pub fn with_original(mut self, bytes: &[u8]) -> Self {
        if bytes != self.raw.as_bytes() {
            self.original = Some(bytes.to_vec());
        }
        self
    }

    /// Bytes to write for this line (no trailing newline).
    pub fn as_bytes(&self) -> &[u8] {
        self.original.as_deref().unwrap_or(self.raw.as_bytes())
    }

    /// Is this line an alias definition with at least one address?
    pub fn is_alias(&self) -> bool {
        !self.emails.is_empty()
    }

    pub fn is_tool_generated(&self) -> bool {
        self.provenance == Provenance::ToolGenerated
    }
}

impl From<&AliasEntry> for StoreLine {
    fn from(entry: &AliasEntry) -> Self {
        Self {
            raw: entry.to_line(),
            emails: vec![entry.email.clone()],
            provenance: entry.provenance,
            original: None,
        }
    }
}

/// Everything after `alias <token>`, or `None` for non-alias lines.
fn alias_body(line: &str) -> Option<&str> {
    let rest = line.trim_start();
    let keyword = rest.get(..5)?;
    if !keyword.eq_ignore_ascii_case("alias") {
        return None;
    }
    let rest = &rest[5..];
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let rest = rest.trim_start();
    // Skip the nickname.
    let name_end = rest.find([' ', '\t'])?;
    Some(&rest[name_end..])
}

/// Every `<…>`-bracketed address, else the first bare email token.
fn extract_emails(body: &str) -> Vec<String> {
    let bracketed: Vec<String> = BRACKETED
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| is_email(s))
        .map(str::to_lowercase)
        .collect();
    if !bracketed.is_empty() {
        return bracketed;
    }
    // Bare addresses: ignore the trailing comment so annotations never shadow them.
    let body = body.split(" #").next().unwrap_or(body);
    find_email(body).map(str::to_lowercase).into_iter().collect()
}
