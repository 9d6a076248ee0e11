use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shared::domain::AccountRecord;
use tokio::fs;

/// Whole-file credential store: a JSON array of account records, rewritten in
/// full on every mutation. A missing file reads as an empty pool; a corrupt
/// file is surfaced as an error so a later save cannot silently wipe it.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<AccountRecord>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("reading credential store {}", self.path.display()))
            }
        };
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing credential store {}", self.path.display()))
    }

    pub async fn save(&self, records: &[AccountRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating store directory {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_vec_pretty(records).context("serializing credential store")?;
        fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing credential store {}", self.path.display()))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
