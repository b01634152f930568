//! Command-line commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::info;

use rollcall_core::cache::AssetCache;
use rollcall_core::control::ControlMessage;
use rollcall_core::fetch::{resolve_url, HttpFetcher, Request};
use rollcall_core::lifecycle::LifecycleError;
use rollcall_core::models::{AttendanceStatus, Dataset};
use rollcall_core::store::{AttendanceBook, DataStore, NewSubject};
use rollcall_core::worker::Startup;
use rollcall_core::{Config, Worker};

/// Subdirectory of the cache dir holding one bucket per version
const CACHES_DIR: &str = "caches";

pub const USAGE: &str = "\
Usage: rollcall <command> [args]

Attendance:
  subjects                              List subjects
  add-subject <name> [code] [color]     Add a subject
  delete-subject <id>                   Delete a subject (records are kept)
  mark <subject-id> present|absent      Mark today's attendance
  history                               List attendance, newest first
  clear-history                         Delete all attendance records
  clear-all                             Delete all subjects and records
  export [dir]                          Write the dataset to attendance-YYYY-MM-DD.json

Offline cache:
  install                               Install and activate the configured version
  fetch <url>                           Fetch through the offline cache
  clear-cache                           Delete the active cache generation
  cache-status                          Show cache generations and entries";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Subjects,
    AddSubject {
        name: String,
        code: Option<String>,
        color: Option<String>,
    },
    DeleteSubject {
        id: i64,
    },
    Mark {
        subject: i64,
        status: AttendanceStatus,
    },
    History,
    ClearHistory,
    ClearAll,
    Export {
        dir: Option<PathBuf>,
    },
    Install,
    Fetch {
        url: String,
    },
    ClearCache,
    CacheStatus,
}

fn parse_id(raw: Option<&String>) -> Result<i64, String> {
    let raw = raw.ok_or("Missing subject id")?;
    raw.trim()
        .parse()
        .map_err(|_| format!("Invalid subject id: {}", raw))
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let rest = &args[1..];

        let command = match name.as_str() {
            "help" | "-h" | "--help" => Command::Help,
            "subjects" => Command::Subjects,
            "add-subject" => Command::AddSubject {
                name: rest.first().cloned().ok_or("Missing subject name")?,
                code: rest.get(1).cloned(),
                color: rest.get(2).cloned(),
            },
            "delete-subject" => Command::DeleteSubject {
                id: parse_id(rest.first())?,
            },
            "mark" => {
                let subject = parse_id(rest.first())?;
                let raw = rest.get(1).ok_or("Missing status (present or absent)")?;
                let status = AttendanceStatus::parse(raw)
                    .ok_or_else(|| format!("Invalid status: {}", raw))?;
                Command::Mark { subject, status }
            }
            "history" => Command::History,
            "clear-history" => Command::ClearHistory,
            "clear-all" => Command::ClearAll,
            "export" => Command::Export {
                dir: rest.first().map(PathBuf::from),
            },
            "install" => Command::Install,
            "fetch" => Command::Fetch {
                url: rest.first().cloned().ok_or("Missing URL")?,
            },
            "clear-cache" => Command::ClearCache,
            "cache-status" => Command::CacheStatus,
            other => return Err(format!("Unknown command: {}", other)),
        };
        Ok(command)
    }
}

pub async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Help => println!("{}", USAGE),
        Command::Subjects => print_subjects(open_book(config)?.data()),
        Command::AddSubject { name, code, color } => {
            let mut book = open_book(config)?;
            let subject = book.add_subject(NewSubject { name, code, color })?;
            println!("Added {} [{}]", subject.label(), subject.id);
        }
        Command::DeleteSubject { id } => {
            let mut book = open_book(config)?;
            if book.delete_subject(id)? {
                println!("Deleted subject {}. Its attendance records are kept.", id);
            } else {
                println!("No subject with id {}", id);
            }
        }
        Command::Mark { subject, status } => {
            let mut book = open_book(config)?;
            let record = book.record_attendance(subject, status)?;
            println!(
                "{} - {} on {}",
                book.data().subject_name(record.subject),
                record.status.display_name(),
                record.date
            );
        }
        Command::History => print_history(open_book(config)?.data()),
        Command::ClearHistory => {
            open_book(config)?.clear_history()?;
            println!("Attendance history cleared");
        }
        Command::ClearAll => {
            open_book(config)?.clear_all()?;
            println!("All data has been cleared");
        }
        Command::Export { dir } => {
            let book = open_book(config)?;
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let path = book.export_to(&dir, Utc::now().date_naive())?;
            println!("Exported to {}", path.display());
        }
        Command::Install => install(config).await?,
        Command::Fetch { url } => fetch(config, &url).await?,
        Command::ClearCache => clear_cache(config).await?,
        Command::CacheStatus => cache_status(config).await?,
    }
    Ok(())
}

fn open_book(config: &Config) -> Result<AttendanceBook> {
    Ok(AttendanceBook::open(DataStore::new(config.data_dir()?)))
}

fn open_cache(config: &Config) -> Result<AssetCache> {
    Ok(AssetCache::new(config.cache_dir()?.join(CACHES_DIR))?)
}

fn print_subjects(data: &Dataset) {
    if data.subjects.is_empty() {
        println!("No subjects added yet. Create one with `rollcall add-subject <name>`.");
        return;
    }
    for subject in &data.subjects {
        println!("{:>14}  {}  {}", subject.id, subject.label(), subject.color);
    }
}

fn print_history(data: &Dataset) {
    let history = data.history();
    if history.is_empty() {
        println!("No attendance records yet");
        return;
    }
    for record in history {
        println!(
            "{}  {:<24}  {}",
            record.date,
            data.subject_name(record.subject),
            record.status.display_name()
        );
    }
}

fn print_startup(version: &str, startup: &Startup) {
    println!(
        "Installed {}: {} cached, {} skipped",
        version,
        startup.install.report.cached.len(),
        startup.install.report.failed.len()
    );
    for (url, reason) in &startup.install.report.failed {
        println!("  skipped {} ({})", url, reason);
    }
    for tag in &startup.activate.pruned {
        println!("  removed old generation {}", tag);
    }
}

async fn install(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let fetcher = Arc::new(HttpFetcher::new()?);
    let (worker, startup) = Worker::start(config.lifecycle_config()?, cache, fetcher).await?;
    print_startup(worker.version(), &startup);
    worker.shutdown().await;
    Ok(())
}

/// Attach to the active generation, installing it first if it is missing.
async fn worker(config: &Config) -> Result<Worker<HttpFetcher>> {
    let cache = open_cache(config)?;
    let fetcher = Arc::new(HttpFetcher::new()?);
    let lifecycle = config.lifecycle_config()?;

    match Worker::resume(lifecycle.clone(), cache.clone(), fetcher.clone()).await {
        Ok(worker) => Ok(worker),
        Err(LifecycleError::NotInstalled(version)) => {
            info!(version = %version, "No active cache generation, installing");
            let (worker, startup) = Worker::start(lifecycle, cache, fetcher).await?;
            print_startup(worker.version(), &startup);
            Ok(worker)
        }
        Err(e) => Err(e.into()),
    }
}

async fn fetch(config: &Config, raw: &str) -> Result<()> {
    let url = resolve_url(&config.origin()?, raw)?;
    let worker = worker(config).await?;

    let response = worker.fetch(Request::get(url)).await?;
    println!("{} {}", response.status, response.status_text);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!();
    println!("{}", response.text());

    worker.shutdown().await;
    Ok(())
}

async fn clear_cache(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let fetcher = Arc::new(HttpFetcher::new()?);

    let worker = match Worker::resume(config.lifecycle_config()?, cache, fetcher).await {
        Ok(worker) => worker,
        Err(LifecycleError::NotInstalled(version)) => {
            println!("Nothing to clear: {} is not cached", version);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let reply = worker
        .post_message(ControlMessage::ClearCache)
        .await
        .ok_or_else(|| anyhow!("Cache worker did not reply"))?;
    if reply.cleared {
        println!("Cache {} cleared", worker.version());
    } else {
        println!("Failed to clear cache {}", worker.version());
    }
    Ok(())
}

async fn cache_status(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let current = config.cache_version();
    let tags = cache.tags().await?;
    if tags.is_empty() {
        println!("No cache generations. Run `rollcall install`.");
        return Ok(());
    }

    for tag in tags {
        let marker = if tag == current { " (current)" } else { "" };
        println!("{}{}", tag, marker);
        let Ok(generation) = cache.generation(&tag) else {
            continue;
        };
        for entry in generation.entries().await? {
            println!(
                "  {} {:<60} {}",
                entry.data.response.status,
                entry.data.url,
                entry.age_display()
            );
        }
    }
    Ok(())
}
