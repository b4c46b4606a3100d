//! Snapshot cache persistence
//!
//! Saves and restores the raw snapshot history as zstd-compressed JSON so a
//! restarted engine can rebuild its windows without waiting for fresh data.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::types::Snapshot;

/// Load a previously saved snapshot history. A missing file is not an error;
/// it just means there is nothing to restore.
pub fn load_snapshot_cache(path: &Path) -> Result<Vec<Snapshot>> {
    if !path.exists() {
        return Ok(vec![]);
    }

    let compressed = std::fs::read(path)
        .with_context(|| format!("reading snapshot cache {}", path.display()))?;
    let json = zstd::decode_all(&compressed[..])
        .with_context(|| format!("decompressing snapshot cache {}", path.display()))?;
    let snapshots: Vec<Snapshot> = serde_json::from_slice(&json)
        .with_context(|| format!("parsing snapshot cache {}", path.display()))?;

    info!("Loaded {} snapshots from {}", snapshots.len(), path.display());
    Ok(snapshots)
}

/// Persist the snapshot history, creating parent directories as needed
pub fn save_snapshot_cache(path: &Path, snapshots: &[Snapshot]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory {}", parent.display()))?;
    }

    let json = serde_json::to_vec(snapshots)?;
    let compressed = zstd::encode_all(&json[..], 3)?;
    std::fs::write(path, &compressed)
        .with_context(|| format!("writing snapshot cache {}", path.display()))?;

    info!(
        "Saved {} snapshots to {} ({} bytes compressed)",
        snapshots.len(),
        path.display(),
        compressed.len()
    );
    Ok(())
}
