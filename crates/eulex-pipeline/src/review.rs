//! The human-editable concept review artifact.
//!
//! Phase one writes every concept the thesaurus matched for each keyword.
//! The user may delete entries or add concept URIs by hand; phase two reads
//! back whatever URIs remain. Only the URI keys matter on read, so label
//! lists may be edited freely or left empty.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use eulex_cellar::ConceptLabels;
use eulex_core::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const INSTRUCTIONS: &str = "Review the EuroVoc concepts below. Remove unwanted entries, or add \
new ones by inserting the concept URI under a keyword. Save this file and resume the run.";

#[derive(Debug, Serialize)]
struct ArtifactOut<'a> {
    instructions: &'a str,
    labels: &'a ConceptLabels,
}

#[derive(Debug, Deserialize)]
struct ArtifactIn {
    #[serde(default)]
    labels: Option<BTreeMap<String, Option<BTreeMap<String, serde_yaml::Value>>>>,
}

/// Write the artifact for review. Overwrites any previous one.
pub fn write_artifact(path: &Path, labels: &ConceptLabels) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(&ArtifactOut {
        instructions: INSTRUCTIONS,
        labels,
    })
    .map_err(|e| artifact_error(path, e.to_string()))?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| artifact_error(path, e.to_string()))?;
    }
    std::fs::write(path, yaml).map_err(|e| artifact_error(path, e.to_string()))?;

    let concepts: usize = labels.values().map(BTreeMap::len).sum();
    info!(path = %path.display(), keywords = labels.len(), concepts, "wrote concept review artifact");
    Ok(())
}

/// Concept URIs confirmed in a (possibly edited) artifact.
///
/// A missing or unparsable file is a configuration error: the run cannot
/// guess what the reviewer meant.
pub fn read_confirmed(path: &Path) -> Result<BTreeSet<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| artifact_error(path, e.to_string()))?;
    let parsed: ArtifactIn = serde_yaml::from_str(&text).map_err(|e| artifact_error(path, e.to_string()))?;

    let confirmed: BTreeSet<String> = parsed
        .labels
        .unwrap_or_default()
        .into_values()
        .flatten()
        .flat_map(BTreeMap::into_keys)
        .map(|uri| uri.trim().to_string())
        .filter(|uri| !uri.is_empty())
        .collect();
    info!(path = %path.display(), concepts = confirmed.len(), "loaded reviewed concepts");
    Ok(confirmed)
}

fn artifact_error(path: &Path, reason: String) -> ConfigError {
    ConfigError::ReviewArtifact {
        path: PathBuf::from(path),
        reason,
    }
}
