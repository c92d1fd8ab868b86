//! Cadence CLI
//!
//! Command-line front end for the review scheduler: add study items, list
//! what is due, grade reviews and inspect schedules.

mod config;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use cadence_core::{
    Clock, FixedClock, Grade, LegacyTerm, NewItem, Storage, StorageError, StudyItem, SystemClock,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Cadence - review scheduling for study cards
#[derive(Debug, Parser)]
#[command(name = "cadence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Review scheduler for fill-in-the-blank study cards")]
#[command(long_about = "Cadence keeps a stability/difficulty record per study item and schedules \
the next review from how well you recalled it.\n\nGrades: again (1), hard (2), good (3), easy (4).")]
struct Cli {
    /// Directory holding the database (env: CADENCE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file (env: CADENCE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Evaluate the command at this instant (RFC 3339) instead of now
    #[arg(long, global = true, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add a study item
    Add {
        /// The term to learn
        term: String,
        /// Explanation shown after answering
        #[arg(long, default_value = "")]
        explanation: String,
        /// Exercise text, with ____ marking each blank
        #[arg(long, default_value = "")]
        exercise: String,
        /// Expected answer for the next blank (repeat in blank order)
        #[arg(long = "answer")]
        answers: Vec<String>,
        /// Group label
        #[arg(long)]
        group: Option<String>,
        /// Flag for extra practice
        #[arg(long)]
        difficult: bool,
    },

    /// List items due for review
    Due {
        /// Maximum number of items to list
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List every item, newest first
    List {
        /// Items per page
        #[arg(long, default_value = "50")]
        limit: i64,
        /// Items to skip
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Grade a review and schedule the next one
    Review {
        /// Item ID
        id: String,
        /// again, hard, good, easy (or 1-4)
        grade: Grade,
    },

    /// Show the schedule each grade would produce
    Preview {
        /// Item ID
        id: String,
    },

    /// Show one item
    Show {
        /// Item ID
        id: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the review history of an item
    History {
        /// Item ID
        id: String,
    },

    /// Show review workload statistics
    Stats {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an item and its history
    Delete {
        /// Item ID
        id: String,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Export all items in JSON or JSONL format
    Export {
        /// Output file path
        output: PathBuf,
        /// Export format: json or jsonl
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Import items from an export or a legacy JSON file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
}

/// Parse an RFC 3339 instant into UTC
fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", value, e))
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let clock: Box<dyn Clock> = match cli.at {
        Some(at) => Box::new(FixedClock::new(at)),
        None => Box::new(SystemClock),
    };

    run(cli, clock.as_ref())
}

/// Dispatch a parsed command
fn run(cli: Cli, clock: &dyn Clock) -> anyhow::Result<()> {
    let settings = Settings::resolve(cli.data_dir, cli.config)?;
    let storage = Storage::with_scheduler(settings.db_path, settings.scheduler)
        .context("Failed to open the item store")?;
    let now = clock.now();

    match cli.command {
        Commands::Add {
            term,
            explanation,
            exercise,
            answers,
            group,
            difficult,
        } => {
            let mut input = NewItem::new(term)
                .with_explanation(explanation)
                .with_exercise(exercise, answers);
            input.group_name = group;
            input.is_difficult = difficult;
            run_add(&storage, input, now)
        }
        Commands::Due { limit, json } => run_due(&storage, limit, json, now),
        Commands::List {
            limit,
            offset,
            json,
        } => run_list(&storage, limit, offset, json, now),
        Commands::Review { id, grade } => run_review(&storage, &id, grade, now),
        Commands::Preview { id } => run_preview(&storage, &id, now),
        Commands::Show { id, json } => run_show(&storage, &id, json, now),
        Commands::History { id } => run_history(&storage, &id),
        Commands::Stats { json } => run_stats(&storage, json, now),
        Commands::Delete { id, yes } => run_delete(&storage, &id, yes),
        Commands::Export { output, format } => run_export(&storage, output, format),
        Commands::Import { file } => run_import(&storage, file, now),
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn format_days(days: f64) -> String {
    if days == 1.0 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

fn fetch_item(storage: &Storage, id: &str) -> anyhow::Result<StudyItem> {
    storage
        .get_item(id)?
        .ok_or_else(|| anyhow::anyhow!("No item with id '{}'", id))
}

fn print_item_line(item: &StudyItem, now: DateTime<Utc>) {
    let status = item.describe_schedule(now);
    let status = if item.is_due(now) {
        status.yellow()
    } else {
        status.green()
    };
    println!("  {}  {}  {}", item.id.dimmed(), item.term.white().bold(), status);
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_add(storage: &Storage, input: NewItem, now: DateTime<Utc>) -> anyhow::Result<()> {
    let item = storage.add_item(input, now)?;
    println!("{} {}", "Added".green().bold(), item.term.white().bold());
    println!("{}: {}", "ID".white().bold(), item.id);
    if item.blank_count() != item.answer.len() {
        println!(
            "  {} exercise has {} blank(s) but {} answer(s)",
            "!".yellow().bold(),
            item.blank_count(),
            item.answer.len()
        );
    }
    Ok(())
}

fn run_due(storage: &Storage, limit: usize, json: bool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let items = storage.due_items(now, Some(limit))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!("{}", "=== Due for Review ===".cyan().bold());
    println!();
    if items.is_empty() {
        println!("{}", "Nothing is due.".dimmed());
        if let Some(next) = storage.summary(now)?.next_due_at {
            println!("{}: {}", "Next review".white().bold(), format_instant(next));
        }
        return Ok(());
    }
    for item in &items {
        print_item_line(item, now);
    }
    Ok(())
}

fn run_list(
    storage: &Storage,
    limit: i64,
    offset: i64,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if limit < 1 || offset < 0 {
        anyhow::bail!("--limit must be positive and --offset non-negative");
    }
    let items = storage.list_items(limit, offset)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let total = storage.count_items()?;
    println!("{}", "=== Study Items ===".cyan().bold());
    println!();
    if items.is_empty() {
        println!("{}", "No items on this page.".dimmed());
    }
    for item in &items {
        print_item_line(item, now);
    }
    println!();
    println!(
        "{}",
        format!("Showing {} of {} (offset {})", items.len(), total, offset).dimmed()
    );
    Ok(())
}

fn run_review(storage: &Storage, id: &str, grade: Grade, now: DateTime<Utc>) -> anyhow::Result<()> {
    let outcome = match storage.record_review(id, grade, now) {
        Ok(outcome) => outcome,
        Err(StorageError::NotFound(_)) => anyhow::bail!("No item with id '{}'", id),
        Err(StorageError::Conflict { .. }) => {
            anyhow::bail!("Item '{}' changed while grading; review it again", id)
        }
        Err(e) => return Err(e.into()),
    };

    let Some(state) = outcome.memory() else {
        anyhow::bail!("Review of '{}' produced no schedule", id);
    };

    let label = match grade {
        Grade::Again => grade.label().red().bold(),
        Grade::Hard => grade.label().yellow().bold(),
        Grade::Good => grade.label().green().bold(),
        Grade::Easy => grade.label().cyan().bold(),
    };
    println!("{} {}", outcome.item.term.white().bold(), label);
    println!(
        "{}: {} ({})",
        "Next review".white().bold(),
        format_instant(state.scheduled_at),
        format_days(state.stability_days)
    );
    println!("{}: {:.1}", "Difficulty".white(), state.difficulty);
    println!("{}: {} / {}", "Reps / Lapses".white(), state.reps, state.lapses);
    Ok(())
}

fn run_preview(storage: &Storage, id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    let item = fetch_item(storage, id)?;
    let preview = storage.preview_review(id, now)?;

    println!("{} {}", "Preview".cyan().bold(), item.term.white().bold());
    for (grade, days) in preview.intervals() {
        println!(
            "  {:>5} ({})  {:>10}  {}",
            grade.label(),
            grade.as_i32(),
            format_days(days),
            format_instant(preview.get(grade).scheduled_at).dimmed()
        );
    }
    Ok(())
}

fn run_show(storage: &Storage, id: &str, json: bool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let item = fetch_item(storage, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("{}", item.term.white().bold());
    println!("{}: {}", "ID".white().bold(), item.id);
    if !item.explanation.is_empty() {
        println!("{}: {}", "Explanation".white().bold(), item.explanation);
    }
    if !item.exercise.is_empty() {
        println!("{}: {}", "Exercise".white().bold(), item.exercise);
        for (blank, answer) in &item.answer {
            println!("  {} {}", format!("[{}]", blank).dimmed(), answer);
        }
    }
    if let Some(group) = &item.group_name {
        println!("{}: {}", "Group".white().bold(), group);
    }
    if item.is_difficult {
        println!("{}", "Marked difficult".yellow());
    }
    println!("{}: {}", "Status".white().bold(), item.describe_schedule(now));
    if let Some(memory) = item.memory {
        println!("{}: {}", "Stability".white(), format_days(memory.stability_days));
        println!("{}: {:.1}", "Difficulty".white(), memory.difficulty);
        println!("{}: {}", "Due".white(), format_instant(memory.scheduled_at));
        if let Some(last) = memory.last_reviewed_at {
            println!("{}: {}", "Last reviewed".white(), format_instant(last));
        }
        println!("{}: {} / {}", "Reps / Lapses".white(), memory.reps, memory.lapses);
    }
    Ok(())
}

fn run_history(storage: &Storage, id: &str) -> anyhow::Result<()> {
    let item = fetch_item(storage, id)?;
    let history = storage.review_history(id)?;

    println!("{} {}", "History".cyan().bold(), item.term.white().bold());
    if history.is_empty() {
        println!("{}", "Never reviewed.".dimmed());
        return Ok(());
    }
    for entry in &history {
        println!(
            "  {}  {:>5}  {:>10}  D {:.1}",
            format_instant(entry.reviewed_at),
            entry.grade.label(),
            format_days(entry.stability_after),
            entry.difficulty_after
        );
    }
    Ok(())
}

fn run_stats(storage: &Storage, json: bool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let summary = storage.summary(now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "=== Cadence Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Total Items".white().bold(), summary.total_items);
    println!("{}: {}", "Never Reviewed".white().bold(), summary.unscheduled);
    println!("{}: {}", "Due Now".white().bold(), summary.due_now);
    println!("{}: {}", "Due Within 24h".white().bold(), summary.upcoming_24h);
    println!("{}: {}", "Total Reps".white().bold(), summary.total_reps);
    println!("{}: {}", "Total Lapses".white().bold(), summary.total_lapses);
    if let Some(avg) = summary.average_difficulty {
        println!("{}: {:.2}", "Average Difficulty".white().bold(), avg);
    }
    if let Some(next) = summary.next_due_at {
        println!("{}: {}", "Next Review".white().bold(), format_instant(next));
    }
    Ok(())
}

fn run_delete(storage: &Storage, id: &str, yes: bool) -> anyhow::Result<()> {
    let item = fetch_item(storage, id)?;

    if !yes {
        print!("Delete '{}' and its history? [y/N] ", item.term);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("{}", "Aborted.".dimmed());
            return Ok(());
        }
    }

    if storage.delete_item(id)? {
        println!("{} {}", "Deleted".red().bold(), item.term);
    } else {
        println!("{}", "Item was already gone.".dimmed());
    }
    Ok(())
}

fn run_export(storage: &Storage, output: PathBuf, format: String) -> anyhow::Result<()> {
    if format != "json" && format != "jsonl" {
        anyhow::bail!("Invalid format '{}'. Must be 'json' or 'jsonl'.", format);
    }

    let items = storage.export_items()?;

    // Create parent directories if needed
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    match format.as_str() {
        "json" => {
            serde_json::to_writer_pretty(&mut writer, &items)?;
            writer.write_all(b"\n")?;
        }
        _ => {
            for item in &items {
                serde_json::to_writer(&mut writer, item)?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;

    println!(
        "{} {} item(s) to {}",
        "Exported".green().bold(),
        items.len(),
        output.display()
    );
    Ok(())
}

/// Import file contents: our own export, or the legacy answer-bag format
///
/// Export records must carry every [`StudyItem`] key including `version`
/// and nothing else; anything else is treated as legacy.
enum ImportPayload {
    Native(Vec<StudyItem>),
    Legacy(Vec<LegacyTerm>),
}

fn parse_import(raw: &str) -> anyhow::Result<ImportPayload> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Import file is not JSON")?;
    if let Ok(items) = serde_json::from_value::<Vec<StudyItem>>(value.clone()) {
        return Ok(ImportPayload::Native(items));
    }
    let terms = serde_json::from_value::<Vec<LegacyTerm>>(value)
        .context("Import file is neither an export nor a legacy term list")?;
    Ok(ImportPayload::Legacy(terms))
}

fn run_import(storage: &Storage, file: PathBuf, now: DateTime<Utc>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let report = match parse_import(&raw)? {
        ImportPayload::Native(items) => storage.import_items(items)?,
        ImportPayload::Legacy(terms) => storage.import_legacy(terms, now)?,
    };

    println!("{}", "=== Cadence Import ===".cyan().bold());
    println!();
    println!("{}: {}", "Imported".white().bold(), report.imported);
    println!("{}: {}", "With Schedule".white().bold(), report.scheduled);
    if report.skipped > 0 {
        println!("{}: {}", "Skipped".white().bold(), report.skipped);
    }
    if !report.rejected_states.is_empty() {
        println!();
        println!("{}", "Discarded scheduling state:".yellow().bold());
        for (term, reason) in &report.rejected_states {
            println!("  {} {}: {}", "!".yellow().bold(), term, reason);
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
