//! Email addresses extracted from address-list headers.

use std::sync::LazyLock;

use regex::Regex;

/// Address token grammar: `local-part@domain`, the domain having at least one
/// dot-separated label and a top label of two or more letters.
const EMAIL_PATTERN: &str = r"[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}\b";

static EMAIL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("Invalid EMAIL_TOKEN pattern"));

static EMAIL_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{EMAIL_PATTERN}$")).expect("Invalid EMAIL_EXACT pattern")
});

/// One address extracted from an address-spec.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `email = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `email = "user@example.com"`
///
/// The display name is raw: it may still contain RFC 2047 encoded-words.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParsedAddress {
    /// The bare email address, as written in the header.
    pub email: String,
    /// Raw display name (may be empty).
    pub display_name: String,
}

impl ParsedAddress {
    /// Build an address, checking the email against the token grammar.
    pub fn new(email: &str, display_name: &str) -> Option<Self> {
        let email = email.trim();
        if !is_email(email) {
            return None;
        }
        Some(Self {
            email: email.to_string(),
            display_name: display_name.to_string(),
        })
    }

    /// The part before the last `@`.
    pub fn local_part(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map(|(local, _)| local)
            .unwrap_or(&self.email)
    }

    /// The part after the last `@`.
    pub fn domain(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or("")
    }

    /// Lowercased email, the key used for deduplication.
    pub fn key(&self) -> String {
        self.email.to_lowercase()
    }
}

/// True if the whole string is a single email token.
pub fn is_email(s: &str) -> bool {
    EMAIL_EXACT.is_match(s)
}

/// Find the first email token inside arbitrary text.
pub fn find_email(s: &str) -> Option<&str> {
    EMAIL_TOKEN.find(s).map(|m| m.as_str())
}

impl std::fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.display_name, self.email)
        }
    }
}
