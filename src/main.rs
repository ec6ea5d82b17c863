use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use maimai_playlog::config::Config;
use maimai_playlog::export::{self, ExportFormat};
use maimai_playlog::models::EnrichedRecord;
use maimai_playlog::pipeline::{IngestReport, Ingestor};
use maimai_playlog::progress::{format_duration, Progress};
use maimai_playlog::query;
use maimai_playlog::stats::summarize_records;
use maimai_playlog::store::Store;

/// Added records printed after an ingest
const PREVIEW_LIMIT: usize = 10;

#[derive(Parser)]
#[command(name = "maimai-playlog")]
#[command(about = "Ingest maimai DX play history pages into a deduplicated JSON store")]
struct Args {
    /// TOML config file
    #[arg(long, env = "PLAYLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Record store, overrides the config file
    #[arg(long, env = "PLAYLOG_STORE")]
    store: Option<PathBuf>,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest saved history pages, one ingest call per file
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Extract entry blocks on all cores
        #[arg(long)]
        parallel: bool,
    },
    /// Print statistics over the store as JSON
    Stats {
        /// Only records from the last N days
        #[arg(long)]
        days: Option<u32>,

        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export records as JSON (default) or CSV
    Export {
        #[arg(long)]
        csv: bool,

        #[arg(long)]
        days: Option<u32>,

        /// Output file, defaults to a timestamped file in the export directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Most recent plays
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Best achievement per chart
    Best {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Find plays by title
    Search { keyword: String },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn record_line(r: &EnrichedRecord) -> String {
    let r = &r.record;
    let mut line = format!(
        "{} ({}) - {}% {}",
        r.title,
        r.difficulty,
        if r.percentage.is_empty() { "?" } else { r.percentage.as_str() },
        r.rank.as_ref().map(|k| k.as_str()).unwrap_or("")
    );
    if let Some(tag) = r.combo {
        line.push_str(&format!(" [{}]", tag.as_str()));
    }
    if let Some(tag) = r.sync {
        line.push_str(&format!(" [{}]", tag.as_str()));
    }
    if !r.played_at.is_empty() {
        line.push_str(&format!(" @ {}", r.played_at));
    }
    line
}

fn print_records(records: &[&EnrichedRecord]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }
    for (i, r) in records.iter().enumerate() {
        println!("{:>3}. {}", i + 1, record_line(r));
    }
}

fn print_report(file: &Path, report: &IngestReport) {
    println!("\n{:=<60}", "");
    println!("{}", file.display());
    println!("  Parsed:     {}", report.parsed);
    if report.untitled + report.failed > 0 {
        println!("  Dropped:    {} untitled, {} malformed", report.untitled, report.failed);
    }
    println!("  Added:      {}", report.added.len());
    println!("  Duplicates: {}", report.duplicates);
    println!("  Store:      {} records, {} ingests", report.total_records, report.total_fetches);

    if !report.added.is_empty() {
        println!();
        let preview: Vec<&EnrichedRecord> = report.added.iter().take(PREVIEW_LIMIT).collect();
        print_records(&preview);
        if report.added.len() > PREVIEW_LIMIT {
            println!("  ... {} more", report.added.len() - PREVIEW_LIMIT);
        }
    }
}

fn run_ingest(config: &Config, files: &[PathBuf], progress: Progress) -> Result<()> {
    let start = Instant::now();
    let ingestor = Ingestor::new(config);
    info!("Store: {}", ingestor.store_path().display());

    let pb = progress.bar(files.len() as u64, "Ingesting");
    let mut last_report = None;
    for (i, file) in files.iter().enumerate() {
        let markup = match std::fs::read_to_string(file) {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                pb.inc(1);
                continue;
            }
        };

        let report = ingestor
            .ingest(&markup)
            .with_context(|| format!("Failed to save store after ingesting {}", file.display()))?;
        pb.suspend(|| print_report(file, &report));
        last_report = Some(report);

        pb.inc(1);
        progress.log("ingest", i as u64 + 1, files.len() as u64);
    }
    pb.finish_and_clear();

    if let Some(report) = last_report {
        println!("\n{}", report.stats.to_json_pretty()?);
    }
    info!("Elapsed: {}", format_duration(start.elapsed()));
    Ok(())
}

fn filtered(store: &Store, days: Option<u32>) -> Vec<&EnrichedRecord> {
    match days {
        Some(days) => export::within_days(&store.records, days, Utc::now()),
        None => store.records.iter().collect(),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(store) = args.store {
        config.store_path = store;
    }
    let progress = Progress::new(args.log_only);

    match args.command {
        Command::Ingest { files, parallel } => {
            if parallel {
                config.extractor.parallel = true;
            }
            run_ingest(&config, &files, progress)?;
        }
        Command::Stats { days, out } => {
            let store = Store::load(&config.store_path);
            let stats = summarize_records(filtered(&store, days));
            match out {
                Some(path) => {
                    stats
                        .write_to_file(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Stats written to {}", path.display());
                }
                None => println!("{}", stats.to_json_pretty()?),
            }
        }
        Command::Export { csv, days, out } => {
            let store = Store::load(&config.store_path);
            let records = filtered(&store, days);
            let format = if csv { ExportFormat::Csv } else { ExportFormat::Json };
            let path = out.unwrap_or_else(|| {
                config
                    .export_dir
                    .join(export::default_file_name(format, Utc::now()))
            });
            export::export_to_file(&records, format, &path, &config.store_path)
                .with_context(|| format!("Failed to export to {}", path.display()))?;
            println!("Exported {} records to {}", records.len(), path.display());
        }
        Command::Recent { limit } => {
            let store = Store::load(&config.store_path);
            print_records(&query::recent(&store.records, limit));
        }
        Command::Best { limit } => {
            let store = Store::load(&config.store_path);
            print_records(&query::best(&store.records, limit));
        }
        Command::Search { keyword } => {
            let store = Store::load(&config.store_path);
            print_records(&query::search(&store.records, &keyword));
        }
    }

    Ok(())
}
