pub mod producer;
pub mod source;
pub mod writer;

use screen_sieve_common::frame::Frame;
use tokio::sync::mpsc;

/// Bounded FIFO between the capture producer and the frame writer.
pub fn frame_queue(capacity: usize) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(capacity)
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to acquire capture source: {0}")]
    Acquire(String),
    #[error("frame grab failed: {0}")]
    Grab(String),
    #[error("capture source '{0}' is not available in this build")]
    Unsupported(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to encode JPEG: {0}")]
    Encode(String),
    #[error("failed to write {0}: {1}")]
    Io(String, std::io::Error),
    #[error("frame {0} already exists")]
    Exists(String),
}
