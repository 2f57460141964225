use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use coub_archive::{Config, CoubArchiver, Error, Event, RunSummary, ToExitCode};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Downloads every public coub of a user into a local directory
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Username whose channel is archived
    #[arg(long, env = "COUB_USER")]
    user: Option<String>,

    /// Output directory [default: ./coubs]
    #[arg(long = "out-dir", alias = "outDir", env = "COUB_OUT_DIR")]
    out_dir: Option<String>,

    /// JSON config file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Timeline page size
    #[arg(long)]
    per_page: Option<u32>,

    /// Number of coubs processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Loop count for coubs with an audio track
    #[arg(long)]
    max_loops: Option<u32>,

    /// Path to the ffmpeg binary (searched in PATH if omitted)
    #[arg(long, env = "FFMPEG_PATH")]
    ffmpeg: Option<PathBuf>,

    /// Base URL of the platform
    #[arg(long)]
    api_base: Option<String>,
}

impl Args {
    fn into_config(self) -> coub_archive::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(out_dir) = self.out_dir {
            config.out_dir = PathBuf::from(out_dir);
        }
        if let Some(per_page) = self.per_page {
            config.api.per_page = per_page;
        }
        if let Some(concurrency) = self.concurrency {
            config.download.max_concurrent_downloads = concurrency;
        }
        if let Some(max_loops) = self.max_loops {
            config.download.max_loop_count = max_loops;
        }
        if let Some(ffmpeg) = self.ffmpeg {
            config.tools.ffmpeg_path = Some(ffmpeg);
        }
        if let Some(api_base) = self.api_base {
            config.api.base_url = api_base;
        }
        Ok(config)
    }
}

fn fail(error: &Error) -> ExitCode {
    tracing::error!(code = error.error_code(), "{}", error);
    eprintln!("Error: {}", error);
    ExitCode::from(error.exit_code())
}

/// Print progress events until the archiver is dropped
async fn report_progress(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event::MetadataPage { page, total_pages }) => {
                tracing::info!("Loading metadata ... ({}/{})", page, total_pages);
            }
            Ok(Event::MetadataLoaded { count, .. }) => {
                println!("✓ Metadata of {} coubs loaded.", count);
            }
            Ok(Event::Progress {
                succeeded, total, ..
            }) => {
                tracing::info!("Downloading coubs ... ({}/{})", succeeded, total);
            }
            Ok(Event::ItemFailed { permalink, error }) => {
                eprintln!("✗ {}: {}", permalink, error);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "✓ {} coubs are downloaded ({} already present).",
        summary.succeeded, summary.skipped
    );
    if summary.has_failures() {
        println!("{} coubs failed:", summary.failed.len());
        for failed in &summary.failed {
            println!("  {} ({})", failed.record.permalink, failed.error);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    let archiver = match CoubArchiver::new(config) {
        Ok(archiver) => archiver,
        Err(e) => return fail(&e),
    };
    let reporter = tokio::spawn(report_progress(archiver.subscribe()));

    let catalog = match archiver.load_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => return fail(&e),
    };

    // Per-coub failures are reported, not fatal
    let summary = archiver.download_all(catalog).await;

    drop(archiver);
    reporter.await.ok();
    print_summary(&summary);

    ExitCode::SUCCESS
}
