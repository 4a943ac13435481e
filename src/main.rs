mod app;
mod backup;
mod config;
mod domain;
mod ledger;
mod storage;
mod summary;
mod tracker;
mod ui;

use std::error::Error;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::backup::{BackupError, BackupOptions, ResticBackup, SnapshotStore};
use crate::config::{Config, ensure_store_folder, resolve_store_path};
use crate::domain::{Task, clock_now, format_clock, format_duration, parse_tags};
use crate::ledger::TaskLedger;
use crate::storage::{FolderStore, is_valid_code};
use crate::summary::generate_daily_summary;
use crate::tracker::{JiraClient, TrackerError, WorklogTracker};
use crate::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "clocked", about = "Terminal time tracker that clocks into one task at a time")]
struct Cli {
	/// Store folder; defaults to $CLOCKED_STORE, then ~/.clocked
	#[arg(long)]
	store: Option<PathBuf>,
	/// Append logs to this file
	#[arg(long)]
	log_file: Option<PathBuf>,
	#[arg(long)]
	verbose: bool,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Add {
		#[arg(long)]
		code: String,
		#[arg(long)]
		title: String,
		/// Space separated
		#[arg(long)]
		tags: Option<String>,
	},
	In {
		#[arg(long)]
		code: String,
	},
	Out,
	List {
		#[arg(long)]
		filter: Option<String>,
	},
	Summary {
		#[arg(long)]
		day: Option<String>,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	init_logging(cli.log_file.as_deref(), cli.verbose)?;

	let store_path = resolve_store_path(cli.store)?;
	ensure_store_folder(&store_path)?;
	info!(store = %store_path.display(), "using store folder");

	let config = Config::load(&store_path)?;
	let ledger = TaskLedger::load(Box::new(FolderStore::new(store_path.clone())))?;
	let backup = init_backup(&store_path, &config, &ledger)?;
	let tracker = init_tracker(&config)?;
	let mut context = AppContext::new(ledger, backup, tracker);

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut context)?;
		}
		Command::Add { code, title, tags } => {
			if !is_valid_code(&code) {
				return Err(format!("invalid task code {code:?}").into());
			}
			let tags = parse_tags(tags.as_deref().unwrap_or_default());
			context.ledger.add_task(Task::new(code.clone(), title, tags))?;
			context.snapshot_after_change();
			report_backup_error(&mut context);
			println!("created task {code}");
		}
		Command::In { code } => {
			context.ledger.clock_into(&code, clock_now())?;
			context.snapshot_after_change();
			report_backup_error(&mut context);
			println!("clocked into {code}");
		}
		Command::Out => {
			let code = context
				.ledger
				.active_code()
				.map(str::to_string)
				.ok_or("no task is clocked in")?;
			context.ledger.clock_out_of(&code, clock_now())?;
			println!("clocked out of {code}");
		}
		Command::List { filter } => {
			print_tasks(&context.ledger, filter.as_deref().unwrap_or_default());
		}
		Command::Summary { day } => {
			print_summary(&context.ledger, parse_day(day.as_deref())?);
		}
	}

	Ok(())
}

/// The terminal UI owns stdout, so logs go to a file or nowhere.
fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<(), Box<dyn Error>> {
	let default_level = if verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

	match log_file {
		Some(path) => {
			let file = OpenOptions::new().create(true).append(true).open(path)?;
			let _ = builder.with_writer(Mutex::new(file)).try_init();
		}
		None => {
			let _ = builder.with_writer(io::sink).try_init();
		}
	}
	Ok(())
}

fn init_backup(
	store_path: &Path,
	config: &Config,
	ledger: &TaskLedger,
) -> Result<Option<Box<dyn SnapshotStore>>, BackupError> {
	let mut backup = ResticBackup::new(BackupOptions {
		source_path: store_path.to_path_buf(),
		repository_path: config.backups_path.clone(),
		password_file: None,
	});
	if !backup.available() {
		warn!("restic not found in PATH, snapshots are disabled");
		return Ok(None);
	}

	backup.init()?;
	if backup.created() && !ledger.is_empty() {
		info!("taking initial snapshot of the store");
		backup.create_snapshot()?;
	}
	Ok(Some(Box::new(backup)))
}

fn init_tracker(config: &Config) -> Result<Option<Box<dyn WorklogTracker>>, TrackerError> {
	if !config.jira.is_complete() {
		debug!("JIRA settings incomplete, worklog sync is disabled");
		return Ok(None);
	}
	Ok(Some(Box::new(JiraClient::new(&config.jira)?)))
}

fn report_backup_error(context: &mut AppContext) {
	if let Some(message) = context.take_backup_error() {
		eprintln!("warning: {message}");
	}
}

fn parse_day(input: Option<&str>) -> Result<NaiveDate, Box<dyn Error>> {
	if let Some(raw) = input {
		Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
	} else {
		Ok(Local::now().date_naive())
	}
}

fn print_tasks(ledger: &TaskLedger, filter: &str) {
	let tasks = ledger.filtered_tasks(filter);
	if tasks.is_empty() {
		println!("no tasks yet");
		return;
	}

	for task in tasks {
		let marker = if ledger.active_code() == Some(task.code.as_str()) {
			"*"
		} else {
			" "
		};
		println!("{marker} {} | {} | {}", task.code, task.title, task.tags.join(" "));
	}
}

fn print_summary(ledger: &TaskLedger, day: NaiveDate) {
	let summary = generate_daily_summary(ledger, day);

	println!("summary for {}", day.format("%Y-%m-%d"));
	if summary.bookings.is_empty() {
		println!("no bookings on this day");
		return;
	}

	for booking in &summary.bookings {
		println!(
			"{} - {} {}",
			format_clock(booking.start),
			format_clock(booking.stop),
			booking.code
		);
	}

	println!("\nby task:");
	for (code, duration) in &summary.totals {
		println!("{} | {}", format_duration(*duration), code);
	}
	println!("\ntotal: {}", format_duration(summary.total));
}
