//! The permutation manifest (`results/perms.json`).
//!
//! Written before execution begins, the manifest maps every permutation
//! digest to its `{parameter: value}` bindings so results directories can be
//! traced back to the configuration that produced them.

use super::error::JobError;
use super::permutation::Permutation;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Digest → `{parameter: value}` map, ordered for deterministic output.
pub type Manifest = BTreeMap<String, BTreeMap<String, String>>;

/// Writes the manifest for the given permutations to `path`.
pub fn write_manifest(perms: &[Arc<Permutation>], path: &Path) -> Result<(), JobError> {
    let mut manifest = Manifest::new();
    for perm in perms {
        let params: BTreeMap<String, String> = perm
            .params()
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        manifest.insert(perm.digest().to_string(), params);
    }

    let encoded = serde_json::to_string_pretty(&manifest)?;

    debug!(path = %path.display(), entries = manifest.len(), "writing permutation manifest");
    fs::write(path, encoded).map_err(|source| JobError::ManifestIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a manifest back from disk.
pub fn read_manifest(path: &Path) -> Result<Manifest, JobError> {
    let raw = fs::read_to_string(path).map_err(|source| JobError::ManifestIo {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_json::from_str(&raw)?)
}
