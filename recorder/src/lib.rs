pub mod catalog;
pub mod report;
pub mod session;
pub mod storage;

pub use session::{CaptureSession, SessionError, SessionState, SessionSummary};
