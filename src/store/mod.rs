//! Durable home of the [`ProgressStore`]: a local JSON file, optionally
//! mirrored to a GitHub repository.

mod github;

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::ProgressStore;
use crate::utils::file::{read_optional, write_atomic};

pub use github::GitHubMirror;

pub struct StateStore {
    path: PathBuf,
    mirror: Option<GitHubMirror>,
}

impl StateStore {
    pub fn new(path: PathBuf, mirror: Option<GitHubMirror>) -> Self {
        Self { path, mirror }
    }

    /// Loads the last saved state: the local file when there is one, then the
    /// remote copy, then a fresh record.
    ///
    /// The remote is read even when the local file wins so the mirror knows
    /// the revision it will overwrite on the next push.
    pub async fn load(&mut self) -> Result<ProgressStore, StoreError> {
        let remote = match self.mirror.as_mut() {
            Some(mirror) => match mirror.fetch().await {
                Ok(document) => document,
                Err(e) => {
                    warn!("⚠️ Could not read remote state: {}", e);
                    None
                }
            },
            None => None,
        };

        if let Some(document) = read_optional(&self.path)? {
            let progress = ProgressStore::from_json(&document)?;
            info!("✅ Loaded state from {}: {} channels", self.path.display(), progress.mappings.len());
            return Ok(progress);
        }

        if let Some(document) = remote {
            match ProgressStore::from_json(&document) {
                Ok(progress) => {
                    info!("✅ Loaded state from GitHub: {} channels", progress.mappings.len());
                    return Ok(progress);
                }
                Err(e) => warn!("⚠️ Remote state is unreadable, starting fresh: {}", e),
            }
        }

        info!("📝 First run, no state at {}", self.path.display());
        Ok(ProgressStore::default())
    }

    /// Rewrites the whole local document.
    pub fn save(&self, progress: &ProgressStore) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(progress)?;
        write_atomic(&self.path, &json)
    }

    /// Pushes the document to the remote mirror. Failures are only logged.
    pub async fn push_remote(&mut self, progress: &ProgressStore) {
        let Some(mirror) = self.mirror.as_mut() else {
            return;
        };

        let document = match serde_json::to_string_pretty(progress) {
            Ok(document) => document,
            Err(e) => {
                warn!("⚠️ Could not serialize state for GitHub: {}", e);
                return;
            }
        };
        let message = format!(
            "Update: {} msgs, {} files ({})",
            progress.stats.messages,
            progress.stats.files,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        match mirror.push(&document, &message).await {
            Ok(()) => info!("✅ GitHub saved"),
            Err(e) => warn!("⚠️ GitHub error: {}", e),
        }
    }
}
