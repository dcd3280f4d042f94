//! Error types for job loading, expansion and preparation.
//!
//! Everything here is fatal during preparation: the job is rejected before
//! any stage is scheduled.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a job description or expanding it into
/// permutations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job file could not be read
    #[error("could not read job file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Job file exists but contains nothing
    #[error("job file is empty: {0}")]
    EmptyFile(PathBuf),

    /// Job YAML failed to parse
    #[error("could not parse job description: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Parameter declares a type the expander does not know
    #[error("unknown parameter type \"{ptype}\" for {param}")]
    UnknownParamType { param: String, ptype: String },

    /// `min`, `max` or `step` did not parse as an integer
    #[error("malformed {field} for {param}: \"{value}\"")]
    MalformedNumber {
        param: String,
        field: &'static str,
        value: String,
    },

    /// Range declares `min` without a `max`
    #[error("missing max for ranged parameter {param}")]
    MissingMax { param: String },

    /// Range is impossible to iterate
    #[error("min can't be greater than max for {param}: {max} < {min}")]
    InvalidRange { param: String, min: i64, max: i64 },

    /// Step value cannot produce a terminating sequence
    #[error("invalid step for {param}: {step}")]
    InvalidStep { param: String, step: i64 },

    /// `step_mode` is neither `increment` nor `power`
    #[error("unknown step mode for param {param}: {mode}")]
    UnknownStepMode { param: String, mode: String },

    /// The job declares no parameters (or every parameter expanded to
    /// nothing), so there is nothing to permute
    #[error("job declares no usable parameters")]
    NoParams,

    /// A stage requests more cores than the configured CPU set holds
    #[error("run has too many cores: {run}: {requested} > {available}")]
    TooManyCores {
        run: String,
        requested: usize,
        available: usize,
    },

    /// A stage declares both `path` and `cmd`
    #[error("run declares both path and cmd: {run}")]
    AmbiguousEntrypoint { run: String },

    /// The permutation manifest could not be encoded
    #[error("could not encode permutation manifest: {0}")]
    ManifestEncode(#[from] serde_json::Error),

    /// The permutation manifest could not be written or read back
    #[error("could not access permutation manifest {path}: {source}")]
    ManifestIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Working-directory bootstrap failed
    #[error("could not prepare working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },
}
