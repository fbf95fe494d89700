use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use roster_tally::{
    parse_thread_link, AutoColumn, Column, CsvWorkbook, Database, JsonChatSource, LogSink, Runner,
    ScheduleEntry, ScheduleStore, ScheduledRun, TallyConfig, WorkspaceConfig,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "roster-tally",
    about = "Reconcile chat check-in replies against a roster sheet",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (default: tally.toml)
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Debug logging
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one attendance thread into one column
    Check {
        #[arg(long, short = 'w')]
        workspace: String,

        /// Thread permalink or timestamp
        #[arg(long, short = 't')]
        thread: String,

        /// Column letters, e.g. K
        #[arg(long, short = 'c')]
        column: Column,
    },

    /// Check who posted in a submission thread
    Submissions {
        #[arg(long, short = 'w')]
        workspace: String,

        #[arg(long, short = 't')]
        thread: String,

        #[arg(long, short = 'c')]
        column: Column,
    },

    /// Run today's scheduled check and advance its column
    Scheduled {
        #[arg(long, short = 'w')]
        workspace: String,

        /// Run as if on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Pick one entry when a day has several (HH:MM)
        #[arg(long)]
        check_time: Option<String>,
    },

    /// Open today's scheduled tracking thread
    OpenThread {
        #[arg(long, short = 'w')]
        workspace: String,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        check_time: Option<String>,
    },

    /// Manage a workspace schedule
    Schedule {
        #[arg(long, short = 'w')]
        workspace: String,

        #[command(subcommand)]
        subcommand: ScheduleSubcommand,
    },

    /// Show recent runs, newest first
    History {
        #[arg(long, short = 'w')]
        workspace: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ScheduleSubcommand {
    /// Print the stored schedule
    Show,

    /// Add an entry
    Add {
        /// Weekday: mon, tue, ...
        day: String,

        /// Thread opening time (HH:MM)
        create_time: String,

        /// Check time (HH:MM)
        check_time: String,

        column: Column,
    },

    /// Remove an entry by position (0-based)
    Remove { index: usize },

    /// Flip the enabled flag
    Toggle,

    /// Set the auto-advance column range
    SetRange { start: Column, end: Column },

    /// Turn auto-advance off
    ClearRange,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        tracing::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = TallyConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let db = Database::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    let json = cli.json;

    match cli.command {
        Commands::Check {
            workspace,
            thread,
            column,
        } => {
            let thread_id = parse_thread_link(&thread)?;
            let (chat, sheet) = collaborators(&config, &workspace)?;
            let sink = LogSink::new();
            let runner = Runner::new(&config, &chat, &sheet, &sink, &db)?.with_journal(&db);
            let outcome = runner.run_attendance_check(&workspace, &thread_id, column)?;

            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "✓ {} present, {} absent, {} not on roster ({} cells written)",
                    outcome.summary.matched_count,
                    outcome.summary.absent_count,
                    outcome.summary.unmatched_names.len(),
                    outcome.write.written
                );
                print_failures(&outcome.write.failed);
            }
        }

        Commands::Submissions {
            workspace,
            thread,
            column,
        } => {
            let thread_id = parse_thread_link(&thread)?;
            let (chat, sheet) = collaborators(&config, &workspace)?;
            let sink = LogSink::new();
            let runner = Runner::new(&config, &chat, &sheet, &sink, &db)?.with_journal(&db);
            let outcome = runner.run_submission_check(&workspace, &thread_id, column)?;

            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "✓ {} submitted, {} missing ({} cells written)",
                    outcome.report.submitted_names.len(),
                    outcome.report.not_submitted_names.len(),
                    outcome.write.written
                );
                print_failures(&outcome.write.failed);
            }
        }

        Commands::Scheduled {
            workspace,
            date,
            check_time,
        } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let (chat, sheet) = collaborators(&config, &workspace)?;
            let sink = LogSink::new();
            let runner = Runner::new(&config, &chat, &sheet, &sink, &db)?.with_journal(&db);
            let run = runner.run_scheduled_check(&workspace, today, check_time.as_deref())?;

            if json {
                print_json(&run)?;
            } else {
                match run {
                    ScheduledRun::Disabled => println!("schedule is disabled"),
                    ScheduledRun::NoEntry { day } => println!("no entry scheduled for {}", day),
                    ScheduledRun::Completed { check, advance } => {
                        println!(
                            "✓ {} present, {} absent",
                            check.summary.matched_count, check.summary.absent_count
                        );
                        print_failures(&check.write.failed);
                        if let Some(advance) = advance {
                            println!("  {}", serde_json::to_string(&advance)?);
                        }
                    }
                }
            }
        }

        Commands::OpenThread {
            workspace,
            date,
            check_time,
        } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let (chat, sheet) = collaborators(&config, &workspace)?;
            let sink = LogSink::new();
            let runner = Runner::new(&config, &chat, &sheet, &sink, &db)?;
            match runner.open_scheduled_thread(&workspace, today, check_time.as_deref())? {
                Some(thread_id) => println!("✓ thread opened: {}", thread_id),
                None => println!("nothing scheduled"),
            }
        }

        Commands::Schedule {
            workspace,
            subcommand,
        } => {
            config.workspace(&workspace)?;
            run_schedule(&db, &workspace, subcommand, json)?;
        }

        Commands::History { workspace, limit } => {
            config.workspace(&workspace)?;
            let runs = db.recent_runs(&workspace, limit)?;
            if json {
                print_json(&runs)?;
            } else if runs.is_empty() {
                println!("no runs recorded");
            } else {
                for run in runs {
                    println!(
                        "{}  {:<10} {:>3}  thread {}  {}/{} present",
                        run.recorded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                        run.mode.as_str(),
                        run.column,
                        run.thread_id,
                        run.present_names.len(),
                        run.total
                    );
                }
            }
        }
    }

    Ok(())
}

fn run_schedule(db: &Database, workspace: &str, subcommand: ScheduleSubcommand, json: bool) -> Result<()> {
    let config = match subcommand {
        ScheduleSubcommand::Show => db.load(workspace)?,
        ScheduleSubcommand::Add {
            day,
            create_time,
            check_time,
            column,
        } => {
            let entry = ScheduleEntry::new(&day, &create_time, &check_time, column);
            db.update(workspace, &mut |config| config.add_entry(entry.clone()))?
        }
        ScheduleSubcommand::Remove { index } => db.update(workspace, &mut |config| {
            config.remove_entry(index).map(|_| ())
        })?,
        ScheduleSubcommand::Toggle => db.update(workspace, &mut |config| {
            config.toggle();
            Ok(())
        })?,
        ScheduleSubcommand::SetRange { start, end } => {
            let range = AutoColumn::new(start, end)?;
            db.update(workspace, &mut |config| config.set_auto_column(Some(range)))?
        }
        ScheduleSubcommand::ClearRange => {
            db.update(workspace, &mut |config| config.set_auto_column(None))?
        }
    };

    if json {
        return print_json(&config);
    }

    println!("enabled: {}", config.enabled);
    match config.auto_column {
        Some(range) => println!("auto column: {}..={}", range.start, range.end),
        None => println!("auto column: off"),
    }
    for (i, entry) in config.entries.iter().enumerate() {
        println!(
            "  [{}] {} open {} check {} column {}",
            i, entry.day, entry.create_time, entry.check_time, entry.column
        );
    }
    if let Some(thread) = &config.last_thread {
        println!("last thread: {} ({}, column {})", thread.thread_id, thread.date, thread.column);
    }
    Ok(())
}

/// Chat export and sheet directory configured for a workspace
fn collaborators(config: &TallyConfig, workspace: &str) -> Result<(JsonChatSource, CsvWorkbook)> {
    let ws: &WorkspaceConfig = config.workspace(workspace)?;

    let Some(chat_export) = &ws.chat_export else {
        bail!("workspace '{}' has no chat_export configured", workspace);
    };
    let Some(sheet_dir) = &ws.sheet_dir else {
        bail!("workspace '{}' has no sheet_dir configured", workspace);
    };

    Ok((JsonChatSource::new(chat_export), CsvWorkbook::new(sheet_dir)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_failures(failed: &[String]) {
    if !failed.is_empty() {
        println!("⚠️  not written: {}", failed.join(", "));
    }
}
