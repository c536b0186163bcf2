//! CLI entry point for `mailias`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailias::alias::file::{render, AliasStore, StoreOptions};
use mailias::alias::filter::impersonal_reason;
use mailias::alias::name;
use mailias::config::Config;
use mailias::harvest::{self, HarvestOptions, RunOutcome, RunReport};
use mailias::parser::address::{parse_spec, AddressList};
use mailias::parser::header::decode_display_name;

#[derive(Parser)]
#[command(
    name = "mailias",
    version,
    about = "Build a mutt alias file from the recipients of your mail"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Mail directories to scan (Maildir or flat). Replaces the configured sources.
    #[arg(value_name = "DIR")]
    sources: Vec<PathBuf>,

    /// Alias file to update
    #[arg(short, long, value_name = "FILE", env = "MAILIAS_ALIAS_FILE")]
    alias_file: Option<PathBuf>,

    /// Only use messages younger than DAYS (0 = no limit)
    #[arg(long, value_name = "DAYS")]
    max_age: Option<u32>,

    /// Address header to collect from; repeatable (default: to)
    #[arg(long = "header", value_name = "NAME")]
    headers: Vec<String>,

    /// Remove all previously generated entries before merging
    #[arg(long)]
    purge: bool,

    /// Skip impersonal addresses (no-reply, bounces, ...) among new entries
    #[arg(long)]
    filter_new: bool,

    /// Remove impersonal addresses from the whole alias file
    #[arg(long)]
    filter_all: bool,

    /// Keep commas in stored display names
    #[arg(long)]
    keep_comma: bool,

    /// Do not keep a backup of the previous alias file
    #[arg(long)]
    no_backup: bool,

    /// Fail if the alias file does not exist
    #[arg(long)]
    no_create: bool,

    /// Start from an empty alias file; the old one becomes the backup
    #[arg(long)]
    fresh: bool,

    /// Print the resulting alias file instead of writing it
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: $MAILIAS_CONFIG or the user config dir)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List alias-file entries the impersonal filter would remove
    Check {
        /// Alias file (default: the configured one)
        file: Option<PathBuf>,
    },
    /// Show how an address-list header value is split, decoded and aliased
    Parse {
        /// Header value, e.g. '"Doe, John" <john@example.com>, jane@example.com'
        header: String,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => mailias::config::load_config_from(path),
        None => mailias::config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Check { ref file }) => cmd_check(file.as_deref(), cli.json, &config),
        Some(Commands::Parse { ref header }) => cmd_parse(header, cli.json),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => cmd_harvest(&cli, &config),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mailias::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailias.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Merge command-line flags over the configuration.
fn harvest_options(cli: &Cli, config: &Config) -> anyhow::Result<HarvestOptions> {
    let mut config = config.clone();
    let harvest = &mut config.harvest;
    if let Some(ref path) = cli.alias_file {
        harvest.alias_file = path.clone();
    }
    if !cli.sources.is_empty() {
        harvest.sources = cli.sources.clone();
    }
    if !cli.headers.is_empty() {
        harvest.headers = cli.headers.clone();
    }
    if let Some(days) = cli.max_age {
        harvest.max_age_days = days;
    }
    harvest.keep_comma_in_display_name |= cli.keep_comma;

    config.filter.purge |= cli.purge;
    config.filter.filter_new |= cli.filter_new;
    config.filter.filter_all |= cli.filter_all;
    config.store.backup &= !cli.no_backup;
    config.store.create &= !cli.no_create;
    config.store.fresh |= cli.fresh;

    let mut options = HarvestOptions::from_config(&config)?;
    options.dry_run = cli.dry_run;
    Ok(options)
}

/// Scan the mail directories and update the alias file.
fn cmd_harvest(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let options = harvest_options(cli, config)?;
    let merge = &options.merge;
    if options.sources.is_empty() && !(merge.purge || merge.filter_all || options.store.fresh) {
        anyhow::bail!(
            "No mail directories given. Pass DIR arguments or set `sources` in the [harvest] config section."
        );
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len} messages")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let outcome = harvest::run(
        &options,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let report = outcome.report();
    if options.dry_run && !cli.json {
        std::io::Write::write_all(&mut std::io::stdout(), &render(&report.lines))?;
    }

    if cli.json {
        print_report_json(&outcome, elapsed)?;
    } else if options.dry_run {
        // Keep stdout clean for the alias file content.
        eprint!("{}", report_table(&outcome, elapsed));
    } else {
        print!("{}", report_table(&outcome, elapsed));
    }

    Ok(())
}

/// List the entries of an alias file that look impersonal.
fn cmd_check(file: Option<&Path>, json: bool, config: &Config) -> anyhow::Result<()> {
    let path = match file {
        Some(p) => p.to_path_buf(),
        None => mailias::config::expand_home(&config.harvest.alias_file),
    };
    let options = StoreOptions {
        create: false,
        ..StoreOptions::default()
    };
    let store = AliasStore::load(&path, options)?;

    let flagged: Vec<(&str, &str, &str)> = store
        .lines()
        .iter()
        .flat_map(|line| {
            line.emails.iter().filter_map(|email| {
                impersonal_reason(email).map(|reason| (email.as_str(), reason, line.raw.as_str()))
            })
        })
        .collect();
    let doomed = store
        .lines()
        .iter()
        .filter(|l| l.emails.iter().any(|e| impersonal_reason(e).is_some()))
        .count();

    if json {
        let items: Vec<serde_json::Value> = flagged
            .iter()
            .map(|(email, reason, line)| {
                serde_json::json!({
                    "email": email,
                    "reason": reason,
                    "line": line,
                })
            })
            .collect();
        let out = serde_json::json!({
            "file": path.to_string_lossy(),
            "aliases": store.lines().iter().filter(|l| l.is_alias()).count(),
            "impersonal": items,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if flagged.is_empty() {
        println!("  No impersonal entries in {}", path.display());
        return Ok(());
    }
    for (email, reason, _) in &flagged {
        println!("  {email:<40} {reason}");
    }
    println!();
    println!(
        "  {} entr{} would be removed by --filter-all",
        doomed,
        if doomed == 1 { "y" } else { "ies" }
    );
    Ok(())
}

/// Show the address-list pipeline step by step for one header value.
fn cmd_parse(header: &str, json: bool) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for spec in AddressList::new(header) {
        let parsed = parse_spec(spec);
        let decoded = parsed
            .as_ref()
            .map(|p| decode_display_name(&p.display_name));
        let alias = parsed
            .as_ref()
            .zip(decoded.as_deref())
            .and_then(|(p, name)| name::build(name, p.local_part()));
        rows.push(serde_json::json!({
            "spec": spec,
            "email": parsed.as_ref().map(|p| p.email.as_str()),
            "display_name": decoded,
            "alias": alias,
            "impersonal": parsed.as_ref().and_then(|p| impersonal_reason(&p.email)),
        }));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        let field = |key: &str| row[key].as_str().unwrap_or("-").to_string();
        println!();
        println!("  {:<20} {}", "Spec", field("spec"));
        println!("  {:<20} {}", "Email", field("email"));
        println!("  {:<20} {}", "Display name", field("display_name"));
        println!("  {:<20} {}", "Alias", field("alias"));
        if let Some(reason) = row["impersonal"].as_str() {
            println!("  {:<20} {}", "Impersonal", reason);
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailias", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

// ── Output helpers ──────────────────────────────────────────────

fn report_table(outcome: &RunOutcome, elapsed: std::time::Duration) -> String {
    use std::fmt::Write;

    let report: &RunReport = outcome.report();
    let stats = &report.stats;
    let status = match outcome {
        RunOutcome::Updated(_) if report.published => "updated",
        RunOutcome::Updated(_) => "would be updated (dry run)",
        RunOutcome::Unchanged(_) => "unchanged",
        RunOutcome::NoCandidates(_) => "no addresses found, not written",
    };

    let mut out = String::new();
    let mut row = |label: &str, value: String| {
        let _ = writeln!(out, "  {label:<20} {value}");
    };
    row("Alias file", report.alias_file.display().to_string());
    row("Status", status.to_string());
    row("Sources", report.sources.to_string());
    row("Messages", report.messages.to_string());
    if report.unreadable > 0 {
        row("Unreadable", report.unreadable.to_string());
    }
    row("Addresses", stats.candidates.to_string());
    row("Added", stats.committed().to_string());
    row("Already known", stats.duplicates.to_string());
    if stats.too_old > 0 {
        row("Too old", stats.too_old.to_string());
    }
    if stats.unusable > 0 {
        row("No usable alias", stats.unusable.to_string());
    }
    if stats.purged > 0 {
        row("Purged", stats.purged.to_string());
    }
    if stats.filtered_new + stats.filtered_all > 0 {
        row(
            "Filtered",
            (stats.filtered_new + stats.filtered_all).to_string(),
        );
    }
    row("Time", format!("{elapsed:.2?}"));
    out
}

fn print_report_json(outcome: &RunOutcome, elapsed: std::time::Duration) -> anyhow::Result<()> {
    let report = outcome.report();
    let mut value = serde_json::to_value(report)?;
    value["outcome"] = serde_json::json!(outcome.label());
    value["elapsed_ms"] = serde_json::json!(elapsed.as_millis());
    if report.dry_run {
        value["content"] = serde_json::json!(String::from_utf8_lossy(&render(&report.lines)));
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
