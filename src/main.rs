pub mod command;
pub mod config;
pub mod gesture;
pub mod input;

use crate::config::AppConfig;
use crate::gesture::FrameClock;
use crate::input::{InputPipeline, PipelineSettings, RawInputEvent};
use color_eyre::Result;
use tokio::sync::{mpsc, watch};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = setup_config().await?;
    info!(
        "Starting gimbal control for {} stream",
        config.stream.as_keyword()
    );

    let settings = PipelineSettings {
        stream: config.stream,
        gesture: config.gesture,
        speeds: config.speeds,
        wheel_throttle_ms: config.wheel_throttle_ms,
    };

    // Integration points for the host embedding this binary: the video
    // overlay feeds raw_tx, the video pipeline feeds frame_clock, and the
    // camera state owner publishes zoom_tx.
    let (raw_tx, raw_rx) = mpsc::channel::<RawInputEvent>(1000);
    let (command_tx, mut command_rx) = mpsc::channel(100);
    let (zoom_tx, zoom_rx) = watch::channel(0usize);
    let frame_clock = FrameClock::new();

    let _pipeline = InputPipeline::spawn(settings, raw_rx, command_tx, zoom_rx, frame_clock);

    // Outbound commands go to the transport layer; until one is wired up
    // they are logged as they would leave the process.
    let _drain_handle = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            info!("Outbound command: {:?}", command);
        }
        info!("Command channel closed, stopping drain");
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, closing input channel");
    drop(raw_tx);
    drop(zoom_tx);

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> Result<AppConfig> {
    let path = AppConfig::config_path();
    AppConfig::ensure_default(&path).await?;
    let config = AppConfig::load(&path).await?;
    Ok(config)
}
