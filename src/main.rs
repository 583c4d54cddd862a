// Command-line entry point for discussion extraction.
//
// Exit codes: 0 clean end or cancellation, 1 error, 2 blocked by the site.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::{BTreeMap, HashSet};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cli::{Cli, Command, ParseTimeArgs, RunArgs, VerifyArgs};
use kodegen_tools_threadscrape::{
    BrowserDriver, ExtractionConfig, ExtractionSession, JsonCheckpointStore, JsonlRecordStore,
    Pacer, RecordStore, SessionReport, SiteProfile, SnapshotDriver, SnapshotSite, Termination,
    launch_browser, parse_relative_time,
};

const EXIT_BLOCKED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::init_logger(cli.verbose, cli.quiet);

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::ParseTime(args) => parse_time(&args),
        Command::Verify(args) => verify(args).await,
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &RunArgs) -> Result<ExtractionConfig> {
    let profile = SiteProfile::load(&args.profile)?;
    let start_url = args
        .url
        .clone()
        .or_else(|| profile.start_url.clone())
        .context("no start URL: pass --url or set start_url in the profile")?;

    let mut builder = ExtractionConfig::builder()
        .storage_dir(&args.output)
        .start_url(start_url)
        .apply_profile(&profile);
    if args.max_pages.is_some() {
        builder = builder.max_pages(args.max_pages);
    }
    if args.headed {
        builder = builder.headless(false);
    }
    builder.build()
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = load_config(&args)?;
    std::fs::create_dir_all(config.storage_dir()).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.storage_dir().display()
        )
    })?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current discussion");
            on_signal.cancel();
        }
    });

    let report = match &args.snapshot_dir {
        Some(dir) => {
            let site = SnapshotSite::from_dir(dir, config.start_url())?;
            info!(pages = site.len(), dir = %dir.display(), "offline run over saved pages");
            let driver = SnapshotDriver::new(site)
                .with_user_agent(config.user_agent_override().map(str::to_owned));
            drive(config, driver, args.fresh, Some(Pacer::disabled()), cancel).await?
        }
        None => {
            let browser = launch_browser(config.headless(), config.user_agent_override(), None).await?;
            let driver = match browser.open_driver(&config).await {
                Ok(driver) => driver,
                Err(e) => {
                    browser.shutdown().await;
                    return Err(e);
                }
            };
            let result = drive(config, driver, args.fresh, None, cancel).await;
            browser.shutdown().await;
            result?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(match report.termination {
        Termination::Blocked => ExitCode::from(EXIT_BLOCKED),
        _ => ExitCode::SUCCESS,
    })
}

async fn drive<D: BrowserDriver>(
    config: ExtractionConfig,
    driver: D,
    fresh: bool,
    pacer: Option<Pacer>,
    cancel: CancellationToken,
) -> Result<SessionReport> {
    let records = JsonlRecordStore::open(config.records_path()).await?;
    let checkpoints = JsonCheckpointStore::new(config.checkpoint_path());
    let mut session = ExtractionSession::new(config, driver, records, checkpoints).fresh(fresh);
    if let Some(pacer) = pacer {
        session = session.with_pacer(pacer);
    }
    Ok(session.run(cancel).await?)
}

fn parse_time(args: &ParseTimeArgs) -> Result<ExitCode> {
    let text = args.text.join(" ");
    match parse_relative_time(&text) {
        Ok(parsed) => {
            println!("{}", serde_json::to_string(&parsed)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn verify(args: VerifyArgs) -> Result<ExitCode> {
    let path = args.output.join(kodegen_tools_threadscrape::utils::RECORDS_FILE_NAME);
    let store = JsonlRecordStore::open(&path).await?;
    let records = store.read_all().await?;

    let mut per_discussion: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    let ids: HashSet<&str> = records.iter().map(|r| r.record_id.as_str()).collect();
    let mut dangling = 0usize;

    for record in &records {
        let entry = per_discussion.entry(record.discussion_id.as_str()).or_default();
        entry.0 += 1;
        if record.is_root {
            entry.1 += 1;
        }
        if let Some(parent) = record.parent_id.as_deref()
            && !ids.contains(parent)
        {
            dangling += 1;
        }
    }

    let mut bad_roots = 0usize;
    for (discussion, (count, roots)) in &per_discussion {
        println!("{count:>6} records  {roots} root  {discussion}");
        if *roots != 1 {
            bad_roots += 1;
        }
    }
    println!(
        "{} records in {} discussions, {} without exactly one root, {} dangling parents",
        records.len(),
        per_discussion.len(),
        bad_roots,
        dangling
    );

    Ok(if bad_roots == 0 && dangling == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
