use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Working directory for transient frames. Removed when the session stops.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Upper bound on how long producer and writer go without checking for cancellation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Test-pattern source only: frames rendered before the scene changes.
    #[serde(default = "default_scene_frames")]
    pub scene_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    TestPattern,
    Screen,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum hamming distance for two frames to count as duplicates.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_hash_size")]
    pub hash_size: u32,
    #[serde(default)]
    pub policy: SelectionPolicy,
    /// Run one last cycle after the writer drained so pending frames reach storage.
    #[serde(default = "default_true")]
    pub flush_on_stop: bool,
}

/// How the representative of a duplicate group is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    First,
    Random,
    #[default]
    HighestRes,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::First => "first",
            SelectionPolicy::Random => "random",
            SelectionPolicy::HighestRes => "highest_res",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// Archive root for the directory sink; also holds `catalog.db`.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Directory,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_s3_bucket")]
    pub bucket: String,
    #[serde(default = "default_s3_prefix")]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Stop automatically after this many seconds. 0 runs until Ctrl-C.
    #[serde(default)]
    pub duration_secs: u64,
    /// Optional JSON stats file rewritten after each dedup cycle.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            fps: default_fps(),
            queue_capacity: default_queue_capacity(),
            jpeg_quality: default_jpeg_quality(),
            poll_interval_ms: default_poll_interval_ms(),
            source: SourceKind::default(),
            width: default_width(),
            height: default_height(),
            scene_frames: default_scene_frames(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            threshold: default_threshold(),
            hash_size: default_hash_size(),
            policy: SelectionPolicy::default(),
            flush_on_stop: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            dir: default_storage_dir(),
            batch_size: default_batch_size(),
            s3: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 0,
            report_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            dedup: DedupConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.capture;
        if !(c.fps > 0.0 && c.fps <= 1000.0) {
            return Err(ConfigError::Invalid(format!(
                "capture.fps must be in (0, 1000], got {}",
                c.fps
            )));
        }
        if c.queue_capacity == 0 {
            return Err(ConfigError::Invalid("capture.queue_capacity must be > 0".into()));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "capture.jpeg_quality must be in 1..=100, got {}",
                c.jpeg_quality
            )));
        }
        if c.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("capture.poll_interval_ms must be > 0".into()));
        }
        if c.width == 0 || c.height == 0 {
            return Err(ConfigError::Invalid("capture.width and capture.height must be > 0".into()));
        }
        if self.dedup.hash_size < 2 {
            return Err(ConfigError::Invalid(format!(
                "dedup.hash_size must be >= 2, got {}",
                self.dedup.hash_size
            )));
        }
        if self.dedup.interval_secs == 0 {
            return Err(ConfigError::Invalid("dedup.interval_secs must be > 0".into()));
        }
        if self.storage.batch_size == 0 {
            return Err(ConfigError::Invalid("storage.batch_size must be > 0".into()));
        }
        if self.storage.kind == StorageKind::Directory
            && normalize(&self.storage.dir).starts_with(normalize(&c.output_dir))
        {
            return Err(ConfigError::Invalid(format!(
                "storage.dir {} must not be inside capture.output_dir {}, which is removed on stop",
                self.storage.dir.display(),
                c.output_dir.display()
            )));
        }
        if self.storage.kind == StorageKind::S3 && self.storage.s3.is_none() {
            return Err(ConfigError::Invalid(
                "storage.kind = \"s3\" requires a [storage.s3] section".into(),
            ));
        }
        Ok(())
    }
}

/// Absolute, lexically normalized form of `path`. Does not touch the
/// filesystem, so it works for directories that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("./frames")
}
fn default_fps() -> f64 {
    20.0
}
fn default_queue_capacity() -> usize {
    30
}
fn default_jpeg_quality() -> u8 {
    95
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    360
}
fn default_scene_frames() -> u64 {
    40
}
fn default_interval_secs() -> u64 {
    5
}
fn default_threshold() -> u32 {
    10
}
fn default_hash_size() -> u32 {
    8
}
fn default_true() -> bool {
    true
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("./archive")
}
fn default_batch_size() -> usize {
    16
}
fn default_s3_bucket() -> String {
    "screen-frames".into()
}
fn default_s3_prefix() -> String {
    "frames/".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_log_level() -> String {
    "info".into()
}
