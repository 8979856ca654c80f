//! TaskTimer CLI
//!
//! Command-line front end for tracking time per task per day.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tasktimer_core::{
    export::ExportFormat,
    metrics::Metrics,
    Config, SavePolicy, Tracker,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "tasktimer")]
#[command(about = "Track how long you spend on each task, day by day")]
#[command(version)]
struct Cli {
    /// Directory holding tasks_data.json, error.log and exports
    #[arg(long, global = true, env = "TASKTIMER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Fail instead of only logging when an autosave cannot be written
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task to a day
    Add {
        name: String,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Delete a task and its recorded time from a day
    Delete {
        name: String,
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Set a task's description
    Describe {
        name: String,
        text: String,
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show or set the notepad text of a day
    Note {
        /// New text; an empty string clears the note
        text: Option<String>,
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show a day's tasks and totals
    Day {
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Time a task until Enter is pressed
    Track {
        name: String,
        #[arg(short, long)]
        date: Option<String>,
        /// Add the task first if it does not exist
        #[arg(long)]
        create: bool,
    },

    /// Show totals per task across all days
    Summary,

    /// Show chart data: hours per day and per-day task distribution
    Chart,

    /// Export the summary to CSV or JSON
    Export {
        /// Output format (csv or json)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file; defaults to tasks_aggregated.csv in the data
        /// directory for CSV, stdout for JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write to stdout
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
}

#[derive(Tabled)]
struct TaskRowView {
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Hours")]
    hours: String,
    #[tabled(rename = "Days")]
    days: usize,
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Hours")]
    hours: String,
}

#[derive(Tabled)]
struct SliceRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Hours")]
    hours: String,
    #[tabled(rename = "%")]
    percent: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tasktimer=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.data_dir {
        Some(dir) => Config::in_dir(dir),
        None => Config::default(),
    };
    if cli.strict {
        config = config.with_save_policy(SavePolicy::Strict);
    }
    debug!("Using data directory {:?}", config.data_dir);

    let mut tracker = Tracker::new(config);

    match cli.command {
        Commands::Add { name, date } => {
            let date = parse_date(date.as_deref())?;
            if tracker.add_task(date, &name)? {
                println!("{} {} on {}", "✓ Added".green(), name.trim().bold(), date);
            } else {
                println!("{}", format!("{} already exists on {}", name.trim(), date).yellow());
            }
            Ok(())
        }

        Commands::Delete { name, date } => {
            let date = parse_date(date.as_deref())?;
            tracker.delete_task(date, &name)?;
            println!("{} {} from {}", "✓ Deleted".green(), name.bold(), date);
            Ok(())
        }

        Commands::Describe { name, text, date } => {
            let date = parse_date(date.as_deref())?;
            tracker.edit_description(date, &name, &text)?;
            println!("{} description of {}", "✓ Updated".green(), name.bold());
            Ok(())
        }

        Commands::Note { text, date } => {
            let date = parse_date(date.as_deref())?;
            match text {
                Some(text) => {
                    tracker.set_note(date, &text)?;
                    println!("{} note for {}", "✓ Saved".green(), date);
                }
                None => match tracker.note(date)? {
                    Some(note) => println!("{}", note),
                    None => println!("{}", format!("No note for {}.", date).yellow()),
                },
            }
            Ok(())
        }

        Commands::Day { date } => show_day(&tracker, parse_date(date.as_deref())?),

        Commands::Track { name, date, create } => {
            let date = parse_date(date.as_deref())?;
            if create {
                tracker.add_task(date, &name)?;
            }
            track(&mut tracker, date, name.trim())
        }

        Commands::Summary => show_summary(&tracker),

        Commands::Chart => show_chart(&tracker),

        Commands::Export {
            format,
            output,
            stdout,
        } => {
            let Some(export_format) = ExportFormat::parse(&format) else {
                bail!("Unknown export format {:?} (expected csv or json)", format);
            };

            match (output, stdout, export_format) {
                (None, false, ExportFormat::Csv) => {
                    let path = tracker.export_csv()?;
                    println!("{} {}", "✓ Exported to".green(), path.display());
                }
                (Some(path), _, _) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    tracker.export_to(file, export_format)?;
                    println!("{} {}", "✓ Exported to".green(), path.display());
                }
                (None, _, _) => {
                    tracker.export_to(io::stdout(), export_format)?;
                }
            }
            Ok(())
        }
    }
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", s)),
        None => Ok(Local::now().date_naive()),
    }
}

fn show_day(tracker: &Tracker, date: NaiveDate) -> Result<()> {
    let rows = tracker.tasks_for_date(date)?;

    println!("\n{}", format!("📅 {}", date).bold().cyan());
    println!("{}", "─".repeat(40));

    if rows.is_empty() {
        println!("{}", "No tasks for this day.".yellow());
    } else {
        let views: Vec<TaskRowView> = rows
            .into_iter()
            .map(|row| TaskRowView {
                name: row.name,
                time: Metrics::format_hms(row.seconds),
                status: if row.running {
                    "running".green().to_string()
                } else {
                    String::new()
                },
                description: row.description,
            })
            .collect();
        println!("{}", Table::new(views).with(Style::rounded()));

        let total = tracker.day_total(date)?;
        println!(
            "Total (H:MM:SS): {} | Hours: {}",
            Metrics::format_hms(total).bold(),
            Metrics::format_hours(total)
        );
    }

    if let Some(note) = tracker.note(date)? {
        println!("\n{}\n{}", "Note".bold(), note);
    }

    Ok(())
}

/// Run a session in the foreground: redraw once a second, stop on Enter
fn track(tracker: &mut Tracker, date: NaiveDate, name: &str) -> Result<()> {
    if !tracker.start(date, name)? {
        bail!("{} is already running", name);
    }

    println!(
        "{} {} on {} {}",
        "▶ Tracking".green(),
        name.bold(),
        date,
        "(press Enter to stop)".dimmed()
    );

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        let _ = tx.send(());
    });

    // Confirmed seconds only change on stop, so one snapshot serves every tick
    let snapshot = tracker.snapshot()?;
    loop {
        let shown = tracker.live_seconds(&snapshot, date, name);
        print!("\r  {}  ", Metrics::format_hms(shown).cyan().bold());
        io::stdout().flush()?;

        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    let elapsed = tracker.stop(date, name)?.unwrap_or_default();
    let total = tracker.display_seconds(date, name)?;
    println!(
        "\n{} {} (+{}, total {})",
        "■ Stopped".green(),
        name.bold(),
        Metrics::format_hms(elapsed),
        Metrics::format_hms(total)
    );

    if tracker.pending_seconds() > 0 && tracker.flush().is_err() {
        println!(
            "{}",
            format!(
                "{} could not be saved; see {}",
                Metrics::format_hms(tracker.pending_seconds()),
                tracker.config().error_log_path().display()
            )
            .yellow()
        );
    }
    Ok(())
}

fn show_summary(tracker: &Tracker) -> Result<()> {
    let summary = tracker.all_summary()?;

    if summary.is_empty() {
        println!("\n{}", "No tasks recorded yet.".yellow());
        return Ok(());
    }

    println!("\n{}", "📊 Summary".bold().cyan());
    println!("{}", "─".repeat(50));

    let rows: Vec<SummaryRow> = summary
        .sorted()
        .into_iter()
        .map(|(name, task)| SummaryRow {
            task: name.to_string(),
            total: Metrics::format_hms(task.total_seconds),
            hours: Metrics::format_hours(task.total_seconds),
            days: task.days_count(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    for (name, task) in summary.sorted() {
        println!("\n{}", name.bold());
        if task.per_day.is_empty() {
            println!("  {}", "(no recorded days)".dimmed());
            continue;
        }
        let rows: Vec<DayRow> = task
            .per_day
            .iter()
            .map(|(date, secs)| DayRow {
                date: date.clone(),
                time: Metrics::format_hms(*secs),
                hours: format!("{} h", Metrics::format_hours(*secs)),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    Ok(())
}

fn show_chart(tracker: &Tracker) -> Result<()> {
    let series = tracker.chart_series()?;

    if series.hours.is_empty() {
        println!("\n{}", "No days recorded yet.".yellow());
        return Ok(());
    }

    println!("\n{}", "📈 Hours per Day".bold().cyan());
    println!("{}", "─".repeat(40));
    let rows: Vec<DayRow> = series
        .hours
        .iter()
        .map(|point| DayRow {
            date: point.date.clone(),
            time: Metrics::format_hms(point.seconds),
            hours: format!("{:.2}", point.hours),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    for dist in &series.distributions {
        println!("\n{}", format!("🥧 {}", dist.date).bold());
        let rows: Vec<SliceRow> = dist
            .legend()
            .into_iter()
            .map(|line| SliceRow {
                task: line.task,
                time: Metrics::format_hms(line.seconds),
                hours: format!("{:.2}", line.hours),
                percent: format!("{:.1}%", line.percent),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    Ok(())
}
