//! serde model of the job YAML document.
//!
//! A job has four top-level keys: `params`, `inputs`, `outputs` and `runs`.
//! All numeric range fields on parameters are carried as strings and parsed
//! during expansion, so a malformed value surfaces as a preparation error
//! rather than a YAML type mismatch.

use super::error::JobError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A single parameter declaration.
///
/// Exactly one value specification is honored: `only` (explicit ordered
/// list, wins over everything), a `min`/`max` range (integer parameters
/// only), or `default` (single value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    /// `string` or `integer` (`int` is accepted as an alias).
    #[serde(rename = "type")]
    pub ptype: String,

    #[serde(default)]
    pub default: Option<String>,

    /// Explicit ordered value list; takes precedence over `default` and the
    /// range fields.
    #[serde(default)]
    pub only: Vec<String>,

    #[serde(default)]
    pub min: Option<String>,

    #[serde(default)]
    pub max: Option<String>,

    #[serde(default)]
    pub step: Option<String>,

    /// `increment` (default) or `power`.
    #[serde(default)]
    pub step_mode: Option<String>,
}

/// A host path bind-mounted into every stage container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub source: String,
    pub destination: String,

    /// Mount-option tokens (`ro`, `rbind`, ...); empty means read-only bind.
    #[serde(default)]
    pub options: Vec<String>,
}

/// A path inside the container copied back into the permutation's results
/// directory after each stage, and re-seeded into the next stage's rootfs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub path: String,
}

/// One run stage of the job pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunSpec {
    pub name: String,

    /// Container image reference.
    #[serde(default)]
    pub image: String,

    /// Required core count; `0` (or absent) is normalized to 1.
    #[serde(default)]
    pub cores: usize,

    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Shell snippet synthesised into an entrypoint script.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Executable already present in the image.
    #[serde(default)]
    pub path: Option<String>,
}

/// Top-level job description. Immutable after loading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub params: Vec<ParamSpec>,

    #[serde(default)]
    pub inputs: Vec<InputSpec>,

    #[serde(default)]
    pub outputs: Vec<OutputSpec>,

    #[serde(default)]
    pub runs: Vec<RunSpec>,
}

impl JobSpec {
    /// Loads a job description from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| JobError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Err(JobError::EmptyFile(path.to_path_buf()));
        }

        tracing::debug!(path = %path.display(), "read job configuration");

        Self::from_str(&raw)
    }

    /// Parses a job description from YAML text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(raw: &str) -> Result<Self, JobError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Validates the stage list against the configured CPU set and returns a
    /// normalized copy: every stage requesting `0` cores is bumped to 1.
    ///
    /// A stage requesting more cores than the CPU set holds, or declaring
    /// both `path` and `cmd`, rejects the whole job.
    pub fn normalized_runs(&self, total_cores: usize) -> Result<Vec<RunSpec>, JobError> {
        let mut runs = self.runs.clone();

        for run in &mut runs {
            if run.cores > total_cores {
                return Err(JobError::TooManyCores {
                    run: run.name.clone(),
                    requested: run.cores,
                    available: total_cores,
                });
            }

            if run.cores == 0 {
                run.cores = 1;
            }

            if run.path.is_some() && run.cmd.is_some() {
                return Err(JobError::AmbiguousEntrypoint {
                    run: run.name.clone(),
                });
            }
        }

        Ok(runs)
    }
}
