//! One harvest run: scan the mail directories, merge, publish.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alias::file::{AliasStore, StoreOptions};
use crate::alias::merge::{Candidate, MergeEngine, MergeOptions, MergeStats};
use crate::config::{expand_home, Config};
use crate::error::{AliasError, Result};
use crate::model::alias::{SentAt, StoreLine};
use crate::parser::address::{parse_spec, AddressList};
use crate::parser::date;
use crate::store::maildir::{self, Maildir};

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub alias_file: PathBuf,
    pub sources: Vec<PathBuf>,
    /// Address headers to collect from, lowercase.
    pub headers: Vec<String>,
    pub merge: MergeOptions,
    pub store: StoreOptions,
    /// Compute the result but do not touch the alias file.
    pub dry_run: bool,
}

impl HarvestOptions {
    /// Build options from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = Self {
            alias_file: expand_home(&config.harvest.alias_file),
            sources: config.harvest.sources.iter().map(|p| expand_home(p)).collect(),
            headers: config
                .harvest
                .headers
                .iter()
                .map(|h| h.trim().trim_end_matches(':').to_lowercase())
                .collect(),
            merge: MergeOptions {
                max_age_days: config.harvest.max_age_days,
                purge: config.filter.purge,
                filter_new: config.filter.filter_new,
                filter_all: config.filter.filter_all,
                keep_comma_in_display_name: config.harvest.keep_comma_in_display_name,
            },
            store: StoreOptions {
                backup: config.store.backup,
                backup_suffix: config.store.backup_suffix.clone(),
                create: config.store.create,
                fresh: config.store.fresh,
            },
            dry_run: false,
        };
        options.validate()?;
        Ok(options)
    }

    /// Reject settings that cannot produce a sensible run.
    pub fn validate(&self) -> Result<()> {
        if self.headers.is_empty() || self.headers.iter().any(|h| h.is_empty()) {
            return Err(AliasError::Config(
                "at least one non-empty address header is required".to_string(),
            ));
        }
        if self.store.backup && self.store.backup_suffix.is_empty() {
            return Err(AliasError::Config(
                "backup_suffix must not be empty when backups are enabled".to_string(),
            ));
        }
        if self.alias_file.as_os_str().is_empty() {
            return Err(AliasError::Config("alias_file must not be empty".to_string()));
        }
        Ok(())
    }
}

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub alias_file: PathBuf,
    pub sources: usize,
    pub messages: u64,
    /// Messages that could not be read and were skipped.
    pub unreadable: u64,
    pub stats: MergeStats,
    /// The alias file was rewritten.
    pub published: bool,
    pub dry_run: bool,
    /// The resulting alias file content.
    #[serde(skip)]
    pub lines: Vec<StoreLine>,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The alias file changed (or would have, in a dry run).
    Updated(RunReport),
    /// Candidates were found but nothing new came of them.
    Unchanged(RunReport),
    /// No message produced a candidate and no purge or filter was requested.
    NoCandidates(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> &RunReport {
        match self {
            Self::Updated(r) | Self::Unchanged(r) | Self::NoCandidates(r) => r,
        }
    }

    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated(_) => "updated",
            Self::Unchanged(_) => "unchanged",
            Self::NoCandidates(_) => "no-candidates",
        }
    }
}

/// Run a harvest now.
///
/// `progress` receives `(messages_done, messages_total)`.
pub fn run(options: &HarvestOptions, progress: Option<&dyn Fn(u64, u64)>) -> Result<RunOutcome> {
    run_at(options, Utc::now(), progress)
}

/// Run a harvest with an explicit reference time for the age limit.
pub fn run_at(
    options: &HarvestOptions,
    now: DateTime<Utc>,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<RunOutcome> {
    options.validate()?;

    // Open every source before touching the store, so a typo fails fast.
    let sources: Vec<Maildir> = options
        .sources
        .iter()
        .map(Maildir::open)
        .collect::<Result<_>>()?;

    let mut store = AliasStore::load(&options.alias_file, options.store.clone())?;

    let mtime_now = SystemTime::from(now);
    let mut messages = Vec::new();
    for source in &sources {
        messages.extend(source.messages(options.merge.max_age_days, mtime_now)?);
    }
    let total = messages.len() as u64;
    info!(sources = sources.len(), messages = total, "Scanning mail");

    let mut engine = MergeEngine::new(store.take_lines(), options.merge.clone(), now);
    let mut unreadable = 0u64;

    for (i, path) in messages.iter().enumerate() {
        match maildir::read_headers(path) {
            Ok(headers) => {
                let sent_at = headers
                    .get("date")
                    .map(date::resolve)
                    .unwrap_or_else(|| SentAt::Raw(String::new()));
                for header in &options.headers {
                    for value in headers.get_all(header) {
                        for address in AddressList::new(value).filter_map(parse_spec) {
                            engine.offer(Candidate {
                                address,
                                sent_at: sent_at.clone(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable message");
                unreadable += 1;
            }
        }
        if let Some(cb) = progress {
            cb(i as u64 + 1, total);
        }
    }

    let result = engine.finish();
    let stats = result.stats;
    debug!(?stats, "Merge finished");

    let merge = &options.merge;
    let passes_requested = merge.purge || merge.filter_new || merge.filter_all;
    let fresh_rewrite = options.store.fresh && store.existed();

    let mut report = RunReport {
        alias_file: options.alias_file.clone(),
        sources: sources.len(),
        messages: total,
        unreadable,
        stats,
        published: false,
        dry_run: options.dry_run,
        lines: result.lines,
    };

    if report.stats.candidates == 0 && !passes_requested && !fresh_rewrite {
        info!("No candidate addresses found, alias file left alone");
        return Ok(RunOutcome::NoCandidates(report));
    }

    let needs_write = report.stats.changed() || fresh_rewrite || !store.existed();
    if !needs_write {
        info!("Nothing new, alias file left alone");
        return Ok(RunOutcome::Unchanged(report));
    }

    if options.dry_run {
        info!("Dry run, alias file not written");
    } else {
        store.publish(&report.lines)?;
        report.published = true;
    }
    info!(
        added = report.stats.committed(),
        purged = report.stats.purged,
        filtered = report.stats.filtered_all,
        "Alias file updated"
    );
    Ok(RunOutcome::Updated(report))
}
