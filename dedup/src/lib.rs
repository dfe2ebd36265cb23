pub mod grouping;
pub mod hash;
pub mod scan;

use rand::Rng;
use screen_sieve_common::config::{DedupConfig, SelectionPolicy};
use screen_sieve_common::frame::PersistedImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use grouping::{group_and_select, DeduplicationReport, Group, HashRecord};
use hash::{fingerprint_file, HashError};

/// Groups near-duplicate images and picks a representative for each group.
#[derive(Debug, Clone)]
pub struct DedupEngine {
    threshold: u32,
    hash_size: u32,
    policy: SelectionPolicy,
}

/// Result of one deduplication pass.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub groups: Vec<Group>,
    /// Images that failed to decode. They are in no group.
    pub unreadable: Vec<PathBuf>,
    pub report: DeduplicationReport,
}

impl DedupOutcome {
    pub fn representatives(&self) -> impl Iterator<Item = &HashRecord> + '_ {
        self.groups.iter().map(Group::representative)
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &HashRecord> + '_ {
        self.groups.iter().flat_map(Group::duplicates)
    }

    /// Members grouped with `representative`, excluding itself.
    pub fn group_members(&self, representative: &Path) -> Vec<&HashRecord> {
        self.groups
            .iter()
            .find(|g| g.representative().image_id == representative)
            .map(|g| g.duplicates().collect())
            .unwrap_or_default()
    }
}

impl DedupEngine {
    pub fn new(threshold: u32, hash_size: u32, policy: SelectionPolicy) -> Self {
        Self {
            threshold,
            hash_size,
            policy,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.threshold, config.hash_size, config.policy)
    }

    /// Hash every image in order. Unreadable images are returned separately
    /// instead of failing the pass.
    pub fn hash_images(&self, paths: &[PathBuf]) -> (Vec<HashRecord>, Vec<PathBuf>) {
        let mut records = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();

        for path in paths {
            match fingerprint_file(path, self.hash_size) {
                Ok(fp) => {
                    let captured_at = PersistedImage::from_path(path.clone())
                        .ok()
                        .map(|image| image.captured_at);
                    records.push(HashRecord {
                        image_id: path.clone(),
                        captured_at,
                        hash: fp.hash,
                        width: fp.width,
                        height: fp.height,
                    });
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to hash image, excluding it");
                    unreadable.push(path.clone());
                }
            }
        }
        (records, unreadable)
    }

    /// Deduplicate an explicit, ordered list of images.
    pub fn run_on_paths<R: Rng + ?Sized>(
        &self,
        paths: &[PathBuf],
        rng: &mut R,
    ) -> Result<DedupOutcome, DedupError> {
        let (records, unreadable) = self.hash_images(paths);
        let groups = group_and_select(records, self.threshold, self.policy, rng)?;
        let report = DeduplicationReport::from_groups(&groups, unreadable.len());

        debug!(
            total = report.total_images,
            groups = report.group_count,
            removed = report.duplicates_removed,
            unreadable = report.unreadable_images,
            "grouping complete"
        );

        Ok(DedupOutcome {
            groups,
            unreadable,
            report,
        })
    }

    /// Deduplicate the images currently in `dir`.
    pub fn run_on_dir<R: Rng + ?Sized>(
        &self,
        dir: &Path,
        rng: &mut R,
    ) -> Result<DedupOutcome, DedupError> {
        let paths = scan::scan_images(dir)?;
        let outcome = self.run_on_paths(&paths, rng)?;
        info!(
            dir = %dir.display(),
            total = outcome.report.total_images,
            groups = outcome.report.group_count,
            removed = outcome.report.duplicates_removed,
            policy = self.policy.as_str(),
            threshold = self.threshold,
            "deduplication pass complete"
        );
        Ok(outcome)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("failed to scan {0}: {1}")]
    Scan(String, std::io::Error),
    #[error(transparent)]
    Hash(#[from] HashError),
}
