//! Impersonal-address heuristic.
//!
//! Flags addresses that are almost certainly not a person: no-reply senders,
//! mailing-list control addresses, bounce handlers and bulk-mail local parts
//! full of tracking numbers. False positives and negatives are expected.

use std::sync::LazyLock;

use regex::Regex;

/// `(reason, pattern)` pairs, matched case-insensitively against the local part.
const PATTERNS: &[(&str, &str)] = &[
    ("long digit run", r"[0-9]{9,}"),
    ("digit/letter tracking code", r"[0-9]+[a-z]+[0-9]+[a-z]+[0-9]+"),
    ("sub-address", r"\+"),
    ("no-reply", r"no[-_.]?reply|not[-_.]?reply|do[-_.]?not[-_.]?reply"),
    ("nicht-antworten", r"nicht[-_.]?antworten"),
    ("ne-pas-repondre", r"ne[-_.]?pas[-_.]?r[eé]pond(re)?"),
    ("subscription", r"(un)?subscribe"),
    ("mailer-daemon", r"mailer[-_.]?daemon"),
];

static IMPERSONAL: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(reason, pattern)| {
            let re = Regex::new(&format!("(?i){pattern}")).expect("Invalid IMPERSONAL pattern");
            (*reason, re)
        })
        .collect()
});

/// Why an address looks impersonal, or `None` if it looks like a person.
pub fn impersonal_reason(email: &str) -> Option<&'static str> {
    let local = email.rsplit_once('@').map_or(email, |(local, _)| local);
    IMPERSONAL
        .iter()
        .find(|(_, re)| re.is_match(local))
        .map(|(reason, _)| *reason)
}

/// True if the address matches the impersonal heuristic.
pub fn is_impersonal(email: &str) -> bool {
    impersonal_reason(email).is_some()
}
