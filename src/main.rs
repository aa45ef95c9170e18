//! doctor — rewrite documentation comments in header and Swift files.
//!
//! Two modes:
//!
//! - **inject** (default): `doctor -i src -l docs -w 80 -o` re-wraps every
//!   `/** ... */` comment and splices in the `doc://` fragments it references.
//! - **extract**: `doctor -e -i src -x docs -o` moves every comment body into
//!   a companion `.md` file and leaves a `doc://` reference in its place.
//!
//! Without `-o` nothing is written; the reports, and the diffs with `-d`,
//! show what would change.

use anyhow::{Context, Result};
use clap::Parser;
use doctor::cache::{walk_files, ContentCache};
use doctor::process::{common_root, JobReport, Options, Processor, Source};
use doctor::render::RenderOptions;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "doctor",
    about = "Rewrite documentation comments, resolving doc:// references"
)]
struct Cli {
    /// Source files, directories or glob patterns. Directories are walked
    /// for .h and .swift files.
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Replace the input files. Without this, only report.
    #[arg(short = 'o', long)]
    overwrite: bool,

    /// Maximum line width. 0 disables wrapping.
    #[arg(short = 'w', long, default_value_t = 0)]
    width: usize,

    /// Content files or directories to load before processing.
    #[arg(short = 'l', long = "load", num_args = 1..)]
    loads: Vec<PathBuf>,

    /// Extract comments into companion .md files instead of injecting.
    #[arg(short = 'e', long)]
    extract: bool,

    /// Root directory for extracted .md files.
    #[arg(short = 'x', long)]
    extract_dir: Option<PathBuf>,

    /// Bracket injected content with <doc> markers.
    #[arg(short = 'k', long)]
    markers: bool,

    /// Print a unified diff of each file that would change.
    #[arg(short = 'd', long)]
    diffs: bool,

    /// Print a JSON report for each file.
    #[arg(short = 'j', long)]
    json: bool,

    /// Logging threshold: off, error, warn, info, debug or trace.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = LevelFilter::from_str(&cli.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", cli.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    match run(&cli) {
        Ok(job) if job.failed == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<JobReport> {
    let mut cache = ContentCache::new();
    for path in &cli.loads {
        cache
            .load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }

    let sources = expand_inputs(&cli.inputs)?;
    let paths: Vec<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
    let options = Options {
        render: RenderOptions {
            width: cli.width,
            markers: cli.markers,
        },
        overwrite: cli.overwrite,
        extract: cli.extract,
        extract_dir: cli.extract_dir.clone(),
        diffs: cli.diffs,
    };
    let mut processor = Processor::new(cache, options, common_root(&paths));

    let mut job = JobReport::default();
    for source in &sources {
        match processor.process(source) {
            Ok(report) => {
                if let Some(diff) = &report.diff {
                    print!("{}", diff);
                }
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                job.record(&report);
            }
            Err(err) => {
                // Keep going; the file is untouched.
                let err = anyhow::Error::new(err);
                eprintln!("error: {}: {:#}", source.path.display(), err);
                job.record_failure();
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(job)
}

/// Expand inputs into the files to process, sorted and deduplicated.
/// Files found by walking a directory are marked for extension checks.
fn expand_inputs(patterns: &[String]) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            sources.push(Source {
                path: path.to_path_buf(),
                checked: false,
            });
            continue;
        }
        if path.is_dir() {
            let files = walk_files(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            sources.extend(files.into_iter().map(|path| Source {
                path,
                checked: true,
            }));
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            log::warn!("no files matched: {}", pattern);
        }
        sources.extend(matches.into_iter().map(|path| Source {
            path,
            checked: false,
        }));
    }
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    sources.dedup_by(|a, b| a.path == b.path);
    Ok(sources)
}
