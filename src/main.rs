use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use eframe::egui;
use tracing::info;

use csvpix::app::CsvPixApp;
use csvpix::fetcher::ImageFetcher;
use csvpix::processor::{Pacer, RowProcessor};
use csvpix::search::DuckDuckGoImages;
use csvpix::{logging, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads `.env` first so RUST_LOG from it applies to the subscriber.
    let config = AppConfig::from_env().context("invalid configuration")?;
    logging::init().context("failed to install tracing subscriber")?;
    info!(output_dir = %config.output_dir.display(), "starting");

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .context("failed to build HTTP client")?;

    let search = DuckDuckGoImages::new(client.clone(), &config);
    let fetcher = ImageFetcher::new(search, client, config.download_timeout);
    let processor = RowProcessor::new(
        Arc::new(fetcher),
        Pacer::new(config.pause_min, config.pause_max),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 760.0])
            .with_min_inner_size([640.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let app = CsvPixApp::new(config, Arc::new(processor));
    eframe::run_native(
        "CSV Image Downloader",
        options,
        Box::new(|_cc| Box::new(app)),
    )
    .map_err(|e| anyhow!("window closed with an error: {e}"))
}
