use std::{path::PathBuf, sync::Arc};

use {
    clap::Parser,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    driveferry_drive::DriveUploader,
    driveferry_telegram::{TelegramConfig, bot},
};

#[derive(Parser)]
#[command(name = "driveferry", about = "Telegram to Google Drive attachment relay")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Directory for transient attachment downloads (default: system temp dir).
    #[arg(long, env = "DRIVEFERRY_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// OAuth client secret JSON for the Drive API.
    #[arg(long, default_value = "credentials.json")]
    client_secret: PathBuf,

    /// File the installed-app flow persists Drive tokens to.
    #[arg(long, default_value = "token.json")]
    token_store: PathBuf,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "driveferry starting");

    // Missing BOT_TOKEN is fatal before any update is consumed.
    let download_dir = cli.download_dir.clone().unwrap_or_else(std::env::temp_dir);
    let config = TelegramConfig::from_env(download_dir)?;

    // Runs the interactive OAuth consent flow when no persisted token
    // exists, so first startup needs a browser-capable environment.
    let uploader = Arc::new(DriveUploader::connect(&cli.client_secret, &cli.token_store).await?);

    let cancel = bot::start_polling(config, uploader).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    Ok(())
}
