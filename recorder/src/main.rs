use screen_sieve_common::config::Config;
use screen_sieve_recorder::CaptureSession;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        dir = %config.capture.output_dir.display(),
        fps = config.capture.fps,
        interval_secs = config.dedup.interval_secs,
        threshold = config.dedup.threshold,
        policy = config.dedup.policy.as_str(),
        storage = ?config.storage.kind,
        "starting screen-sieve"
    );

    let duration_secs = config.session.duration_secs;
    let mut session = CaptureSession::new(config);
    if let Err(e) = session.start().await {
        error!(error = %e, "failed to start capture session");
        std::process::exit(1);
    }

    if duration_secs > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {
                info!(duration_secs, "session duration reached");
            }
            _ = tokio::signal::ctrl_c() => info!("interrupted"),
        }
    } else if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c, stopping");
    } else {
        info!("interrupted");
    }

    match session.stop().await {
        Ok(summary) => info!(
            session = summary.session_id,
            captured = summary.producer.captured,
            dropped = summary.producer.dropped,
            written = summary.writer.written,
            cycles = summary.dedup.cycles,
            handed_off = summary.dedup.handed_off,
            deleted = summary.dedup.deleted,
            work_dir_removed = summary.work_dir_removed,
            "session summary"
        ),
        Err(e) => {
            error!(error = %e, "failed to stop capture session");
            std::process::exit(1);
        }
    }
}
