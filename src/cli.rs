//! Command-line interface definition
//!
//! - `kodegen-threadscrape run` - crawl a site described by a JSON profile
//! - `kodegen-threadscrape parse-time` - check one relative timestamp
//! - `kodegen-threadscrape verify` - sanity-check a record store

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "kodegen-threadscrape",
    version,
    about = "Extract discussion threads into typed, resumable records"
)]
pub struct Cli {
    /// Debug-level logging for this crate
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl a site with a site profile
    ///
    /// Resumes from `<output>/checkpoint.json` when present. Ctrl-C stops
    /// after the current discussion and keeps the checkpoint.
    Run(RunArgs),

    /// Parse a relative timestamp such as "3 years ago"
    ParseTime(ParseTimeArgs),

    /// Read back a record store and check its threading invariants
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Site profile (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub profile: PathBuf,

    /// Directory for records.jsonl and checkpoint.json
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Start URL, overriding the profile's
    #[arg(long)]
    pub url: Option<String>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Ignore any existing checkpoint
    #[arg(long)]
    pub fresh: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Crawl saved HTML under DIR instead of a live browser
    ///
    /// Files map to URLs by their path below DIR, or through a
    /// `manifest.json` of `{"<url>": "<file>"}` pairs.
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ParseTimeArgs {
    /// Text to parse
    #[arg(required = true)]
    pub text: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Directory holding records.jsonl
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,
}

/// Install the global tracing subscriber.
///
/// `--verbose` and `--quiet` win over `RUST_LOG`; otherwise `RUST_LOG` is
/// honoured with `info` as the default.
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("kodegen_tools_threadscrape=debug,kodegen_threadscrape=debug,threadscrape=debug,info")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
