use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use channel_filter::{
    config::{defaults::DEFAULT_CONFIG_FILE, Config},
    job::FilterJob,
    run::{Phase, ProgressEvent, RunController, RunMode},
};

#[derive(Parser)]
#[command(name = "channel-filter")]
#[command(version)]
#[command(about = "Filter an M3U playlist and XMLTV guide into kept and removed copies")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Playlist to filter (overrides config file)
    #[arg(short, long, value_name = "FILE")]
    playlist: Option<PathBuf>,

    /// Guide to filter, plain or gzip compressed (overrides config file)
    #[arg(short, long, value_name = "FILE")]
    guide: Option<PathBuf>,

    /// Directory for the kept/removed outputs (overrides config file)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Directory the kept outputs are copied to after a successful run
    #[arg(short, long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Run mode, selects the throttle tier
    #[arg(short, long, value_enum)]
    mode: Option<RunMode>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("channel_filter={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting channel filter v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(playlist) = cli.playlist {
        config.paths.playlist = Some(playlist);
    }
    if let Some(guide) = cli.guide {
        config.paths.guide = Some(guide);
    }
    if let Some(output_dir) = cli.output_dir {
        config.paths.output_dir = output_dir;
    }
    if let Some(export_dir) = cli.export_dir {
        config.paths.export_dir = Some(export_dir);
    }
    if let Some(mode) = cli.mode {
        config.run.mode = mode;
    }

    info!(
        "Inputs: playlist={:?} guide={:?} output_dir={}",
        config.paths.playlist,
        config.paths.guide,
        config.paths.output_dir.display()
    );

    let job = FilterJob::new(&config)?;
    let events = job.subscribe();
    let progress_logger = tokio::spawn(log_progress(events));
    spawn_signal_handlers(job.controller());

    let summary = job.run().await;
    if let Err(e) = progress_logger.await {
        warn!("Progress logger ended abnormally: {}", e);
    }

    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if summary.phase == Phase::Failed {
        anyhow::bail!(summary.describe());
    }
    Ok(())
}

async fn log_progress(mut events: tokio::sync::broadcast::Receiver<ProgressEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                info!(
                    "[{}] {} ({:.1}%)",
                    event.phase, event.message, event.percentage
                );
                if event.terminal {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Progress display fell behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn spawn_signal_handlers(controller: RunController) {
    let on_interrupt = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut toggles = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot install pause signal handler: {}", e);
                return;
            }
        };
        while toggles.recv().await.is_some() {
            if controller.toggle_pause() {
                info!("Run paused (send SIGUSR1 again to resume)");
            } else {
                info!("Run resumed");
            }
        }
    });
}
