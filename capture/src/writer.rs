use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, RgbaImage};
use screen_sieve_common::frame::{Frame, PersistedImage};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::WriteError;

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub output_dir: PathBuf,
    pub jpeg_quality: u8,
    /// Bounded wait for the next frame before re-checking cancellation.
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: u64,
    pub failed: u64,
    /// Frames whose timestamp was older than the previously written one.
    pub out_of_order: u64,
}

/// Drain the frame queue into JPEG files until cancelled and empty.
///
/// Once cancellation is observed the queue is closed to new frames and the
/// remaining buffered frames are written before returning, so nothing that
/// was accepted into the queue is lost.
pub async fn run_writer(
    mut frame_rx: mpsc::Receiver<Frame>,
    cancel: watch::Receiver<bool>,
    config: WriterConfig,
) -> WriterStats {
    let mut stats = WriterStats::default();
    let mut last_ts = f64::NEG_INFINITY;
    let mut draining = false;

    info!(
        dir = %config.output_dir.display(),
        quality = config.jpeg_quality,
        "frame writer started"
    );

    loop {
        if !draining && *cancel.borrow() {
            frame_rx.close();
            draining = true;
            debug!(pending = frame_rx.len(), "cancellation observed, draining frame queue");
        }

        let frame = match tokio::time::timeout(config.poll_interval, frame_rx.recv()).await {
            Ok(Some(frame)) => frame,
            // Closed and fully drained.
            Ok(None) => break,
            Err(_) => continue,
        };

        if frame.captured_at < last_ts {
            stats.out_of_order += 1;
            warn!(
                captured_at = frame.captured_at,
                previous = last_ts,
                "frame older than previous write"
            );
        }
        last_ts = frame.captured_at;

        let seq = frame.seq;
        match write_frame(&config, frame).await {
            Ok(image) => {
                stats.written += 1;
                debug!(seq, path = %image.path.display(), "frame written");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, seq, "failed to write frame, dropping");
            }
        }
    }

    info!(
        written = stats.written,
        failed = stats.failed,
        "frame writer stopped"
    );
    stats
}

/// Encode one frame and move it into place under its timestamped name.
///
/// The JPEG is written to a `.part` file first and renamed, so a concurrent
/// directory scan only ever sees complete images. An existing frame with the
/// same name is never replaced.
pub async fn write_frame(config: &WriterConfig, frame: Frame) -> Result<PersistedImage, WriteError> {
    let path = config.output_dir.join(frame.file_name());
    let captured_at = frame.captured_at;
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(WriteError::Exists(path.display().to_string()));
    }
    let quality = config.jpeg_quality;

    let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(frame.pixels, quality))
        .await
        .map_err(|e| WriteError::Encode(e.to_string()))??;

    let tmp = path.with_extension("jpg.part");
    tokio::fs::write(&tmp, &jpeg)
        .await
        .map_err(|e| WriteError::Io(tmp.display().to_string(), e))?;
    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(WriteError::Io(path.display().to_string(), e));
    }

    Ok(PersistedImage { path, captured_at })
}

/// Encode RGBA pixels as a baseline JPEG. Alpha is discarded.
pub fn encode_jpeg(pixels: RgbaImage, quality: u8) -> Result<Vec<u8>, WriteError> {
    let rgb = DynamicImage::ImageRgba8(pixels).into_rgb8();
    let mut buf = Vec::with_capacity(rgb.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| WriteError::Encode(e.to_string()))?;
    Ok(buf)
}
