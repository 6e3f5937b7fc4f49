use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use screenshot_reader::adapters::{JsonFileStorage, SimulatedBrowser, TesseractEngineFactory};
use screenshot_reader::core::models::{
    EncodedImage, ExtensionMessage, IslandSettings, MessageSender, SelectionRect,
};
use screenshot_reader::core::orchestrators::BackgroundCoordinator;
use screenshot_reader::global_constants::{APPLICATION_NAME, LOG_TAG_MAIN};

/// Runs one capture-to-OCR session against a simulated browser, using a
/// screenshot file as the visible tab.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Screenshot that stands in for the visible tab.
    image: PathBuf,

    /// URL of the simulated page; restricted URLs go through the backup tab.
    #[arg(long, default_value = "https://example.com/")]
    url: String,

    /// Selection as x,y,width,height in CSS pixels. Defaults to the whole page.
    #[arg(long, value_parser = parse_rect)]
    rect: Option<[f64; 4]>,

    #[arg(long, default_value_t = 1.0)]
    device_pixel_ratio: f64,

    /// Tesseract language code to store in the settings before running.
    #[arg(long)]
    language: Option<String>,

    #[arg(long, default_value = "en-US")]
    ui_language: String,

    /// Storage file. Defaults to the user's config directory.
    #[arg(long)]
    storage: Option<PathBuf>,
}

impl Cli {
    fn selection(&self, page_width: u32, page_height: u32) -> SelectionRect {
        let [x, y, width, height] = self.rect.unwrap_or([
            0.0,
            0.0,
            f64::from(page_width) / self.device_pixel_ratio,
            f64::from(page_height) / self.device_pixel_ratio,
        ]);
        SelectionRect::new(x, y, width, height, self.device_pixel_ratio)
    }
}

fn parse_rect(value: &str) -> std::result::Result<[f64; 4], String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|error| format!("{}: {}", part, error)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    <[f64; 4]>::try_from(parts).map_err(|parts| {
        format!("expected x,y,width,height but got {} values", parts.len())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    log::info!("{} Starting {}", LOG_TAG_MAIN, APPLICATION_NAME);

    let page = image::open(&cli.image)
        .with_context(|| format!("Failed to open screenshot {:?}", cli.image))?;
    let capture = EncodedImage::from_image(&page)?;

    let storage = Arc::new(match &cli.storage {
        Some(path) => JsonFileStorage::at(path),
        None => JsonFileStorage::in_config_dir()?,
    });

    if let Some(language) = &cli.language {
        let mut settings = IslandSettings::load(storage.as_ref()).await?;
        settings.language = language.clone();
        settings.save(storage.as_ref()).await?;
    }

    let browser = SimulatedBrowser::new(Arc::new(TesseractEngineFactory::build()));
    browser.set_ui_language(cli.ui_language.clone());
    browser.set_visible_capture(capture);
    let tab = browser.open_tab(&cli.url);

    let coordinator = BackgroundCoordinator::build(browser.ports(storage.clone()));
    let router = coordinator.router();

    let owner = coordinator.on_action_clicked(tab).await?;
    let reply = router
        .request(
            ExtensionMessage::CaptureSuccess(cli.selection(page.width(), page.height())),
            MessageSender::from_tab(owner),
        )
        .await
        .context("Coordinator closed the selection request without replying")?;

    let delivered = browser
        .messages_for(owner)
        .into_iter()
        .rev()
        .find_map(|message| match message {
            ExtensionMessage::OcrResult(payload) => Some(payload),
            _ => None,
        });

    if let Err(error) = coordinator.cleanup_storage().await {
        log::warn!("{} Could not clean up storage: {}", LOG_TAG_MAIN, error);
    }

    let result = delivered.with_context(|| {
        format!(
            "No OCR result was delivered: {}",
            reply.message.unwrap_or_default()
        )
    })?;

    if !result.success {
        anyhow::bail!("OCR failed: {}", result.text);
    }

    log::info!(
        "{} Recognized in '{}' at {:.1}% confidence",
        LOG_TAG_MAIN,
        result.language.unwrap_or_default(),
        result.confidence
    );
    println!("{}", result.text);
    Ok(())
}
