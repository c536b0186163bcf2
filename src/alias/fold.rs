//! ASCII folding of names before they become alias tokens.
//!
//! Folders are tried in order; the last one always succeeds.

use tracing::debug;

/// One way of reducing text to plain ASCII.
///
/// Returns `None` to hand over to the next folder in the chain.
pub trait AsciiFolder {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn fold(&self, s: &str) -> Option<String>;
}

/// Transliteration through `deunicode` ("Jürgen" → "Jurgen", "Łódź" → "Lodz").
///
/// Only letters and digits are transliterated; other non-ASCII characters
/// (emoji, dingbats) and letters without a transliteration are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Transliterate;

/// Keeps ASCII characters and drops everything else. Never returns `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripNonAscii;

impl AsciiFolder for Transliterate {
    fn name(&self) -> &'static str {
        "deunicode"
    }

    fn fold(&self, s: &str) -> Option<String> {
        let mut out = String::with_capacity(s.len());
        for ch in s.chars() {
            if ch.is_ascii() {
                out.push(ch);
            } else if !ch.is_alphanumeric() {
                continue;
            } else if let Some(ascii) = deunicode::deunicode_char(ch) {
                out.push_str(ascii);
            }
        }
        // Nothing usable left from a non-blank input: let the next folder try.
        if !out.chars().any(|c| c.is_ascii_alphanumeric()) && s.chars().any(char::is_alphanumeric) {
            return None;
        }
        Some(out)
    }
}

impl AsciiFolder for StripNonAscii {
    fn name(&self) -> &'static str {
        "strip"
    }

    fn fold(&self, s: &str) -> Option<String> {
        Some(s.chars().filter(char::is_ascii).collect())
    }
}

/// Folders tried in order by [`fold_ascii`].
pub const FOLDER_CHAIN: [&dyn AsciiFolder; 2] = [&Transliterate, &StripNonAscii];

/// Fold `s` to ASCII using the first folder in [`FOLDER_CHAIN`] that succeeds.
pub fn fold_ascii(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    for folder in FOLDER_CHAIN {
        if let Some(folded) = folder.fold(s) {
            return folded;
        }
        debug!(folder = folder.name(), input = s, "Folder gave up");
    }
    String::new()
}
