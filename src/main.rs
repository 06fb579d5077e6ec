use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{info, warn};

use lecture_collector::config::Config;
use lecture_collector::downloader::VideoDownloader;
use lecture_collector::fetch::YtDlpFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Lecture Collector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Educational video collection and transcript pipeline")
        .arg(
            Arg::new("csv")
                .short('c')
                .long("csv")
                .value_name("FILE")
                .help("CSV file of videos to download (url,subject,difficulty,source)"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for the collection"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logging
    let filter = if matches.get_flag("verbose") {
        "lecture_collector=debug,info"
    } else {
        "lecture_collector=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    if let Some(output_dir) = matches.get_one::<String>("output-dir") {
        config.output.base_dir = PathBuf::from(output_dir);
    }

    config.validate()?;

    info!("🚀 Lecture Collector starting...");
    info!("📂 Output directory: {}", config.output.base_dir.display());

    let fetcher = YtDlpFetcher::new(&config);
    let mut downloader = VideoDownloader::new(config, Box::new(fetcher)).await?;

    if let Some(csv) = matches.get_one::<String>("csv") {
        let report = downloader.download_batch(&PathBuf::from(csv)).await?;
        if report.interrupted {
            warn!(
                "Partial run: {}/{} rows processed before interrupt",
                report.succeeded + report.failed,
                report.total
            );
        }
    }

    downloader.generate_statistics().await?;

    Ok(())
}
