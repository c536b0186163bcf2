//! `Date:` header resolution.
//!
//! Real mailers produce plenty of non-conforming dates. [`resolve`] tries a
//! list of increasingly lenient parsers and, when all of them fail, keeps the
//! raw text so the alias line still records something human-readable.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::model::alias::SentAt;

/// Resolve a raw `Date:` header value.
pub fn resolve(raw: &str) -> SentAt {
    match parse_date(raw) {
        Some(dt) => SentAt::Parsed(dt),
        None => SentAt::Raw(raw.trim().to_string()),
    }
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let collapsed = date_str.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = strip_trailing_comment(&collapsed);
    if trimmed.is_empty() {
        return None;
    }

    // Try chrono's RFC 2822
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Try ISO 8601 / RFC 3339
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let english = translate_months(&no_dow);
    let imap = normalize_imap_date(&english);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    for candidate in [&no_dow, &english, &imap] {
        for replaced in [candidate.clone(), replace_named_tz(candidate)] {
            for fmt in &formats {
                if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                    return Some(dt.with_timezone(&Utc));
                }
                if let Ok(ndt) = NaiveDateTime::parse_from_str(&replaced, fmt) {
                    return Some(Utc.from_utc_datetime(&ndt));
                }
            }
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let date = parsed.date()?;
    // mail-parser happily returns 0000-00-00 for garbage
    if date.year == 0 {
        return None;
    }
    DateTime::parse_from_rfc3339(&date.to_rfc3339())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Drop a trailing `(CET)`-style comment.
fn strip_trailing_comment(s: &str) -> &str {
    match s.rfind(" (") {
        Some(pos) if s.ends_with(')') => s[..pos].trim_end(),
        _ => s.trim(),
    }
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu " or "Donnerstag, ").
///
/// Any alphabetic word followed by a comma counts, so localized day names go too.
fn strip_day_of_week(s: &str) -> String {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    let Some(word_end) = s.find([' ', ',']) else {
        return s.to_string();
    };
    let word = &s[..word_end];
    if word.is_empty() || !word.chars().all(char::is_alphabetic) {
        return s.to_string();
    }
    let followed_by_comma = s[word_end..].starts_with(',');
    if followed_by_comma || DAYS.iter().any(|d| d.eq_ignore_ascii_case(word)) {
        return s[word_end..].trim_start_matches([',', ' ']).to_string();
    }
    s.to_string()
}

/// Map non-English month abbreviations to the English ones chrono expects.
fn translate_months(s: &str) -> String {
    const MONTHS: &[(&str, &str)] = &[
        // German
        ("Mär", "Mar"),
        ("Mrz", "Mar"),
        ("Mai", "May"),
        ("Okt", "Oct"),
        ("Dez", "Dec"),
        // French
        ("janv.", "Jan"),
        ("févr.", "Feb"),
        ("janv", "Jan"),
        ("févr", "Feb"),
        ("fév", "Feb"),
        ("mars", "Mar"),
        ("avr.", "Apr"),
        ("avr", "Apr"),
        ("juin", "Jun"),
        ("juil.", "Jul"),
        ("juil", "Jul"),
        ("août", "Aug"),
        ("sept.", "Sep"),
        ("déc.", "Dec"),
        ("déc", "Dec"),
        // Spanish / Italian / Dutch
        ("ene", "Jan"),
        ("abr", "Apr"),
        ("ago", "Aug"),
        ("dic", "Dec"),
        ("gen", "Jan"),
        ("mag", "May"),
        ("giu", "Jun"),
        ("lug", "Jul"),
        ("set", "Sep"),
        ("ott", "Oct"),
        ("mei", "May"),
        ("okt", "Oct"),
    ];

    s.split(' ')
        .map(|token| {
            MONTHS
                .iter()
                .find(|(foreign, _)| token.eq_ignore_ascii_case(foreign) || token == *foreign)
                .map(|(_, english)| *english)
                .unwrap_or(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    let Some((date, rest)) = s.split_once(' ') else {
        return s.to_string();
    };
    let parts: Vec<&str> = date.split('-').collect();
    if parts.len() != 3 || parts[1].len() != 3 || !parts[1].chars().all(char::is_alphabetic) {
        return s.to_string();
    }
    let mut month = parts[1].to_lowercase();
    if let Some(first) = month.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    format!("{} {} {} {}", parts[0], month, parts[2], rest)
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("MEZ", "+0100"),
        ("MESZ", "+0200"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("BST", "+0100"),
        ("JST", "+0900"),
    ];
    for (name, offset) in &tzs {
        if let Some(prefix) = s.strip_suffix(name) {
            if prefix.ends_with(' ') {
                return format!("{prefix}{offset}");
            }
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(dt: DateTime<Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 10:00:00");
    }

    #[test]
    fn test_parse_date_converts_to_utc() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0200").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 08:00:00");
    }

    #[test]
    fn test_parse_date_extra_whitespace() {
        let dt = parse_date("  Thu,   4 Jan  2024\t10:00:00   +0000 ").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 10:00:00");
    }

    #[test]
    fn test_parse_date_missing_seconds() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00 +0000").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 10:00:00");
    }

    #[test]
    fn test_parse_date_trailing_comment() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0100 (CET)").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 09:00:00");
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 15:00:00");
    }

    #[test]
    fn test_parse_date_german_month() {
        let dt = parse_date("Do, 07 Mär 2024 10:00:00 +0100").unwrap();
        assert_eq!(ymd_hms(dt), "2024-03-07 09:00:00");
        let dt = parse_date("12 Okt 2023 18:30:00 +0000").unwrap();
        assert_eq!(ymd_hms(dt), "2023-10-12 18:30:00");
    }

    #[test]
    fn test_parse_date_french_month() {
        let dt = parse_date("3 févr. 2024 09:15:00 +0000").unwrap();
        assert_eq!(ymd_hms(dt), "2024-02-03 09:15:00");
    }

    #[test]
    fn test_parse_date_iso8601() {
        let dt = parse_date("2024-01-04T10:00:00Z").unwrap();
        assert_eq!(ymd_hms(dt), "2024-01-04 10:00:00");
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("   ").is_none());
        assert!(parse_date("sometime last week").is_none());
    }

    #[test]
    fn test_resolve_keeps_raw_text() {
        assert_eq!(
            resolve(" sometime last week "),
            SentAt::Raw("sometime last week".to_string())
        );
        assert!(matches!(
            resolve("Thu, 04 Jan 2024 10:00:00 +0000"),
            SentAt::Parsed(_)
        ));
    }

    #[test]
    fn test_canonical_annotation() {
        let sent = resolve("Thu, 04 Jan 2024 10:00:00 +0000");
        assert_eq!(sent.annotation(), "2024-01-04@10:00:00");
    }

    #[test]
    fn test_normalize_imap_date() {
        assert_eq!(
            normalize_imap_date("16-JUL-2025 03:01:03"),
            "16 Jul 2025 03:01:03"
        );
        assert_eq!(
            normalize_imap_date("04 Jan 2024 10:00:00"),
            "04 Jan 2024 10:00:00"
        );
    }

    #[test]
    fn test_strip_day_of_week() {
        assert_eq!(strip_day_of_week("Thu, 04 Jan 2024"), "04 Jan 2024");
        assert_eq!(strip_day_of_week("Donnerstag, 4 Jan 2024"), "4 Jan 2024");
        assert_eq!(strip_day_of_week("04 Jan 2024"), "04 Jan 2024");
        assert_eq!(strip_day_of_week("Jan 04 10:00:00 2024"), "Jan 04 10:00:00 2024");
    }
}
