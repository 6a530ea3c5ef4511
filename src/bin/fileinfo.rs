//! # fileinfo CLI
//!
//! Writes a metadata manifest of one or more directory trees.
//!
//! ## Usage
//! ```bash
//! # Snapshot the current directory to stdout
//! fileinfo
//!
//! # Snapshot a backup with 8 hashing workers, with progress and a summary
//! fileinfo -n 8 -p -s -o backup.fileinfo /mnt/backup
//!
//! # Compare two snapshots
//! diff before.fileinfo after.fileinfo
//! ```

use anyhow::Context;
use clap::Parser;
use colored::*;
use fileinfo::utils::format_bytes;
use fileinfo::{FileinfoError, ProgressInfo, SnapshotBuilder, SnapshotSummary};
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output file information
#[derive(Parser)]
#[command(name = "fileinfo")]
#[command(version)]
#[command(about = "Record file system metadata so later changes can be detected")]
#[command(long_about = None)]
struct Cli {
    /// Number of hashing workers (defaults to the number of cores)
    #[arg(short, long = "ncpus", value_name = "N")]
    ncpus: Option<usize>,

    /// File to write to (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// Show progress on stderr while recording
    #[arg(short, long)]
    progress: bool,

    /// Print summary information on stderr when complete
    #[arg(short, long)]
    summary: bool,

    /// Print the summary as JSON (implies --summary)
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directories to report on (defaults to the current directory)
    #[arg(value_name = "DIR")]
    directories: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // Logs always go to stderr; stdout may carry the manifest
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<FileinfoError>() {
            Some(err) => err.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let roots = if cli.directories.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.directories
    };

    let mut builder = SnapshotBuilder::new();
    if let Some(n) = cli.ncpus {
        builder = builder.parallelism(n);
    }
    let snapshotter = builder.build()?;

    let out: Box<dyn Write + Send> = match &cli.outfile {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let summary = if cli.progress {
        eprint!("Collecting file counts...");
        let survey = snapshotter.survey(&roots);
        eprintln!(
            "\rCollecting file counts... {} {} in {} {}",
            survey.files,
            plural(survey.files, "file", "files"),
            survey.directories,
            plural(survey.directories, "directory", "directories"),
        );

        // one tick per directory line and per entry
        let pb = ProgressBar::new(survey.total() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")?
                .progress_chars("#>-"),
        );
        let callback = |info: ProgressInfo| {
            pb.set_position((info.directories + info.processed) as u64);
            pb.set_message(format!(
                "{} {}",
                info.directories,
                plural(info.directories, "directory", "directories")
            ));
        };
        let summary = snapshotter.snapshot_with_progress(&roots, out, io::stderr(), Some(callback));
        pb.finish();
        summary?
    } else {
        snapshotter.snapshot(&roots, out, io::stderr())?
    };

    if cli.json {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    } else if cli.summary {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &SnapshotSummary) {
    let run_time = Duration::from_millis(summary.duration.as_millis() as u64);

    eprintln!("{}", "Summary".bold());
    eprintln!("Number of directories: {:>8}", summary.directories);
    eprintln!("Number of files:       {:>8}", summary.files);
    if summary.cached_references > 0 {
        eprintln!("  Hard links:          {:>8}", summary.cached_references);
    }
    eprintln!("Total run time: {:>15}", format_duration(run_time).to_string());
    match (summary.directories_per_second(), summary.files_per_second()) {
        (Some(dirs), Some(files)) => {
            eprintln!("  Directories / second:  {:8.1}", dirs);
            eprintln!("  Files / second:        {:8.1}", files);
        }
        _ => {
            eprintln!("  Directories / second:       -.-");
            eprintln!("  Files / second:             -.-");
        }
    }
    eprintln!("Bytes hashed:   {:>15} ({})", summary.bytes_hashed, format_bytes(summary.bytes_hashed));
    match summary.bytes_per_file() {
        Some(per_file) => eprintln!(
            "Size of output:        {:8} ({:.1} bytes/file)",
            summary.bytes_written, per_file
        ),
        None => eprintln!("Size of output:        {:8}", summary.bytes_written),
    }

    let problems = summary.stat_errors + summary.unreadable_directories;
    if problems > 0 || summary.hashing_errors > 0 {
        eprintln!(
            "{} {} unreadable {}, {} hashing {}",
            "Warning:".yellow().bold(),
            problems,
            plural(problems, "entry", "entries"),
            summary.hashing_errors,
            plural(summary.hashing_errors as usize, "error", "errors"),
        );
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
