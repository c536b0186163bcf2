//! Merging newly discovered addresses into the alias file's lines.
//!
//! One [`MergeEngine`] covers one run:
//!
//! 1. seed the seen-set from every address in the alias file,
//! 2. purge tool-generated lines (optional); their addresses stay seen,
//! 3. [`MergeEngine::offer`] each candidate; first occurrence wins,
//! 4. [`MergeEngine::finish`] filters new entries (optional), appends them,
//!    then filters the whole store (optional).
//!
//! The engine never fails. Unusable candidates are counted and dropped.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use crate::alias::filter::is_impersonal;
use crate::alias::name;
use crate::model::address::ParsedAddress;
use crate::model::alias::{AliasEntry, Provenance, SentAt, StoreLine};
use crate::parser::header::decode_display_name;

/// Merge behavior for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Only messages younger than this many days are used (0 = no limit).
    pub max_age_days: u32,
    /// Drop every previously tool-generated line before merging.
    pub purge: bool,
    /// Drop impersonal addresses from the new entries.
    pub filter_new: bool,
    /// Drop impersonal addresses from the whole store, old lines included.
    pub filter_all: bool,
    /// Keep commas in stored display names.
    pub keep_comma_in_display_name: bool,
}

/// One address found in one message.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub address: ParsedAddress,
    pub sent_at: SentAt,
}

/// What happened to an offered candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// A new entry was queued.
    Added,
    /// The address is already in the store or was seen earlier in this run.
    Duplicate,
    /// The message is too old, or its age is unknown under an age limit.
    TooOld,
    /// Neither the display name nor the local part gave an alias token.
    NoAlias,
}

/// Counters for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MergeStats {
    pub candidates: u64,
    pub added: u64,
    pub duplicates: u64,
    pub too_old: u64,
    pub unusable: u64,
    pub purged: u64,
    pub filtered_new: u64,
    pub filtered_all: u64,
}

impl MergeStats {
    /// True if the merged store differs from what was loaded.
    pub fn changed(&self) -> bool {
        self.added > self.filtered_new || self.purged > 0 || self.filtered_all > 0
    }

    /// Entries that made it into the store.
    pub fn committed(&self) -> u64 {
        self.added - self.filtered_new
    }
}

/// Final line sequence plus counters.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub lines: Vec<StoreLine>,
    pub stats: MergeStats,
}

/// Seen-set, pending entries and store lines for one run.
#[derive(Debug)]
pub struct MergeEngine {
    lines: Vec<StoreLine>,
    seen: HashSet<String>,
    pending: Vec<AliasEntry>,
    options: MergeOptions,
    now: DateTime<Utc>,
    stats: MergeStats,
}

impl MergeEngine {
    /// Start a merge over the loaded store lines.
    ///
    /// `now` is the reference time for the age limit.
    pub fn new(lines: Vec<StoreLine>, options: MergeOptions, now: DateTime<Utc>) -> Self {
        let seen: HashSet<String> = lines
            .iter()
            .flat_map(|l| l.emails.iter().cloned())
            .collect();
        debug!(known = seen.len(), "Seeded seen-set from alias file");

        let mut stats = MergeStats::default();
        let lines = if options.purge {
            let before = lines.len();
            let kept: Vec<StoreLine> = lines.into_iter().filter(|l| !l.is_tool_generated()).collect();
            stats.purged = (before - kept.len()) as u64;
            debug!(purged = stats.purged, "Purged tool-generated entries");
            kept
        } else {
            lines
        };

        Self {
            lines,
            seen,
            pending: Vec::new(),
            options,
            now,
            stats,
        }
    }

    /// Offer one candidate. Returns whether it was queued, and why not.
    pub fn offer(&mut self, candidate: Candidate) -> Offer {
        self.stats.candidates += 1;
        let Candidate { address, sent_at } = candidate;

        if !within_age(&sent_at, self.options.max_age_days, self.now) {
            trace!(email = %address.email, sent = %sent_at, "Too old");
            self.stats.too_old += 1;
            return Offer::TooOld;
        }

        let key = address.key();
        if self.seen.contains(&key) {
            self.stats.duplicates += 1;
            return Offer::Duplicate;
        }

        let display_name = decode_display_name(&address.display_name);
        let Some(alias) = name::build(&display_name, address.local_part()) else {
            debug!(email = %address.email, "No usable alias token, skipping");
            self.stats.unusable += 1;
            return Offer::NoAlias;
        };

        let entry = AliasEntry {
            alias,
            display_name: stored_display_name(
                &display_name,
                self.options.keep_comma_in_display_name,
            ),
            email: key.clone(),
            sent_at,
            provenance: Provenance::ToolGenerated,
        };
        debug!(alias = %entry.alias, email = %entry.email, "New alias");
        self.seen.insert(key);
        self.pending.push(entry);
        self.stats.added += 1;
        Offer::Added
    }

    /// Entries queued so far, in discovery order.
    pub fn pending(&self) -> &[AliasEntry] {
        &self.pending
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    /// Run the filter passes and return the final line sequence.
    pub fn finish(self) -> MergeResult {
        let Self {
            mut lines,
            mut pending,
            options,
            mut stats,
            ..
        } = self;

        if options.filter_new {
            let before = pending.len();
            pending.retain(|e| !is_impersonal(&e.email));
            stats.filtered_new = (before - pending.len()) as u64;
        }

        lines.extend(pending.iter().map(StoreLine::from));

        if options.filter_all {
            let before = lines.len();
            // A group alias goes as a whole if any member is impersonal.
            lines.retain(|l| !l.emails.iter().any(|e| is_impersonal(e)));
            stats.filtered_all = (before - lines.len()) as u64;
        }

        MergeResult { lines, stats }
    }
}

/// Age check: with a limit, only messages with a known date strictly younger
/// than `max_age_days` pass.
pub fn within_age(sent_at: &SentAt, max_age_days: u32, now: DateTime<Utc>) -> bool {
    if max_age_days == 0 {
        return true;
    }
    match sent_at.timestamp() {
        Some(ts) => now.signed_duration_since(ts) < Duration::days(i64::from(max_age_days)),
        None => false,
    }
}

/// The display name as written to the alias file.
pub fn stored_display_name(decoded: &str, keep_comma: bool) -> String {
    if keep_comma {
        return decoded.to_string();
    }
    decoded
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate(email: &str, name: &str) -> Candidate {
        Candidate {
            address: ParsedAddress::new(email, name).unwrap(),
            sent_at: SentAt::Parsed(now() - Duration::days(1)),
        }
    }

    fn lines(raw: &[&str]) -> Vec<StoreLine> {
        raw.iter().map(|l| StoreLine::parse(l)).collect()
    }

    fn raw(result: &MergeResult) -> Vec<&str> {
        result.lines.iter().map(|l| l.raw.as_str()).collect()
    }

    #[test]
    fn test_new_entry_is_appended() {
        let mut engine = MergeEngine::new(
            lines(&["# my aliases"]),
            MergeOptions::default(),
            now(),
        );
        assert_eq!(engine.offer(candidate("Jurgen@Example.com", "Doe, Jürgen")), Offer::Added);
        let result = engine.finish();
        assert_eq!(
            raw(&result),
            vec![
                "# my aliases",
                "alias jurgen-doe \"Doe Jürgen\" <jurgen@example.com> # mailias: 2024-05-31@12:00:00",
            ]
        );
        assert_eq!(result.stats.added, 1);
    }

    #[test]
    fn test_keep_comma_in_display_name() {
        let options = MergeOptions {
            keep_comma_in_display_name: true,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(Vec::new(), options, now());
        engine.offer(candidate("jurgen@example.com", "Doe, Jürgen"));
        assert_eq!(engine.pending()[0].display_name, "Doe, Jürgen");
        assert_eq!(engine.pending()[0].alias, "jurgen-doe");
    }

    #[test]
    fn test_existing_address_is_case_insensitive_duplicate() {
        let mut engine = MergeEngine::new(
            lines(&["alias jane Jane <Jane@Example.com>"]),
            MergeOptions::default(),
            now(),
        );
        assert_eq!(engine.offer(candidate("jane@example.com", "Jane")), Offer::Duplicate);
        let result = engine.finish();
        assert_eq!(result.lines.len(), 1);
        assert!(!result.stats.changed());
    }

    #[test]
    fn test_first_occurrence_wins_within_run() {
        let mut engine = MergeEngine::new(Vec::new(), MergeOptions::default(), now());
        assert_eq!(engine.offer(candidate("a@b.com", "First Name")), Offer::Added);
        assert_eq!(engine.offer(candidate("A@B.com", "Second Name")), Offer::Duplicate);
        assert_eq!(engine.offer(candidate("c@d.com", "")), Offer::Added);
        let aliases: Vec<_> = engine.pending().iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(aliases, vec!["first-name", "c"]);
    }

    #[test]
    fn test_encoded_display_name_is_decoded() {
        let mut engine = MergeEngine::new(Vec::new(), MergeOptions::default(), now());
        engine.offer(candidate("jose@example.com", "=?UTF-8?B?Sm9zw6k=?="));
        assert_eq!(engine.pending()[0].display_name, "José");
        assert_eq!(engine.pending()[0].alias, "jose");
    }

    #[test]
    fn test_age_boundary_is_strict() {
        let options = MergeOptions {
            max_age_days: 10,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(Vec::new(), options, now());
        let mut old = candidate("old@example.com", "");
        old.sent_at = SentAt::Parsed(now() - Duration::days(10));
        let mut recent = candidate("recent@example.com", "");
        recent.sent_at = SentAt::Parsed(now() - Duration::days(9));
        assert_eq!(engine.offer(old), Offer::TooOld);
        assert_eq!(engine.offer(recent), Offer::Added);
    }

    #[test]
    fn test_unparsed_date_with_age_limit_is_excluded() {
        let options = MergeOptions {
            max_age_days: 30,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(Vec::new(), options, now());
        let mut c = candidate("x@example.com", "");
        c.sent_at = SentAt::Raw("yesterday-ish".to_string());
        assert_eq!(engine.offer(c), Offer::TooOld);
    }

    #[test]
    fn test_unparsed_date_without_age_limit_is_kept() {
        let mut engine = MergeEngine::new(Vec::new(), MergeOptions::default(), now());
        let mut c = candidate("x@example.com", "");
        c.sent_at = SentAt::Raw("yesterday-ish".to_string());
        assert_eq!(engine.offer(c), Offer::Added);
        let result = engine.finish();
        assert!(result.lines[0].raw.ends_with("# mailias: yesterday-ish"));
    }

    #[test]
    fn test_too_old_address_is_not_marked_seen() {
        let options = MergeOptions {
            max_age_days: 5,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(Vec::new(), options, now());
        let mut old = candidate("a@b.com", "");
        old.sent_at = SentAt::Parsed(now() - Duration::days(50));
        assert_eq!(engine.offer(old), Offer::TooOld);
        assert_eq!(engine.offer(candidate("a@b.com", "")), Offer::Added);
    }

    #[test]
    fn test_purge_keeps_manual_lines() {
        let options = MergeOptions {
            purge: true,
            ..Default::default()
        };
        let engine = MergeEngine::new(
            lines(&[
                "alias mumon \"Mumon\" <mumon@example.com>",
                "alias old \"Old One\" <old@example.com> # mailias: 2020-01-01@00:00:00",
            ]),
            options,
            now(),
        );
        let result = engine.finish();
        assert_eq!(raw(&result), vec!["alias mumon \"Mumon\" <mumon@example.com>"]);
        assert_eq!(result.stats.purged, 1);
    }

    #[test]
    fn test_purged_addresses_stay_seen() {
        let options = MergeOptions {
            purge: true,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(
            lines(&["alias old \"Old One\" <old@example.com> # mailias: 2020-01-01@00:00:00"]),
            options,
            now(),
        );
        assert_eq!(engine.offer(candidate("old@example.com", "Old One")), Offer::Duplicate);
        let result = engine.finish();
        assert!(result.lines.is_empty());
        assert_eq!(result.stats.purged, 1);
        assert_eq!(result.stats.added, 0);
    }

    #[test]
    fn test_group_alias_members_are_duplicates() {
        let mut engine = MergeEngine::new(
            lines(&["alias team Jane <jane@x.com>, Bob <bob@x.com>"]),
            MergeOptions::default(),
            now(),
        );
        assert_eq!(engine.offer(candidate("jane@x.com", "Jane")), Offer::Duplicate);
        assert_eq!(engine.offer(candidate("Bob@X.com", "Bob")), Offer::Duplicate);
        let result = engine.finish();
        assert_eq!(result.lines.len(), 1);
        assert!(!result.stats.changed());
    }

    #[test]
    fn test_filter_all_checks_every_group_member() {
        let options = MergeOptions {
            filter_all: true,
            ..Default::default()
        };
        let engine = MergeEngine::new(
            lines(&[
                "alias team Jane <jane@x.com>, Bot <no-reply@x.com>",
                "alias pals Jane <jane@x.com>, Bob <bob@x.com>",
            ]),
            options,
            now(),
        );
        let result = engine.finish();
        assert_eq!(raw(&result), vec!["alias pals Jane <jane@x.com>, Bob <bob@x.com>"]);
        assert_eq!(result.stats.filtered_all, 1);
    }

    #[test]
    fn test_filter_new_only_touches_new_entries() {
        let options = MergeOptions {
            filter_new: true,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(
            lines(&["alias bot <no-reply@old.example>"]),
            options,
            now(),
        );
        engine.offer(candidate("no-reply@service.example", "Service"));
        engine.offer(candidate("order1234567890@shop.example", "Shop"));
        engine.offer(candidate("jane.doe@example.com", "Jane Doe"));
        let result = engine.finish();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].raw, "alias bot <no-reply@old.example>");
        assert_eq!(result.lines[1].emails, vec!["jane.doe@example.com"]);
        assert_eq!(result.stats.filtered_new, 2);
        assert_eq!(result.stats.committed(), 1);
    }

    #[test]
    fn test_filter_all_touches_every_alias_line() {
        let options = MergeOptions {
            filter_all: true,
            ..Default::default()
        };
        let mut engine = MergeEngine::new(
            lines(&[
                "# no-reply@comment.example stays",
                "alias bot <no-reply@old.example>",
                "alias jane \"Jane\" <jane@example.com>",
            ]),
            options,
            now(),
        );
        engine.offer(candidate("MAILER-DAEMON@mx.example", ""));
        let result = engine.finish();
        assert_eq!(
            raw(&result),
            vec![
                "# no-reply@comment.example stays",
                "alias jane \"Jane\" <jane@example.com>",
            ]
        );
        assert_eq!(result.stats.filtered_all, 2);
    }

    #[test]
    fn test_within_age_unlimited() {
        assert!(within_age(&SentAt::Raw(String::new()), 0, now()));
        assert!(within_age(
            &SentAt::Parsed(now() - Duration::days(10_000)),
            0,
            now()
        ));
    }

    #[test]
    fn test_future_dates_pass() {
        assert!(within_age(&SentAt::Parsed(now() + Duration::days(3)), 1, now()));
    }

    #[test]
    fn test_stored_display_name() {
        assert_eq!(stored_display_name("Doe, John", false), "Doe John");
        assert_eq!(stored_display_name("Doe, John", true), "Doe, John");
        assert_eq!(stored_display_name("A,B", false), "A B");
    }
}
