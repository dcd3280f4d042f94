//! The scheduler's only inward interface to container execution.
//!
//! A [`Runner`] executes one stage of one permutation inside an isolated
//! environment: the permutation's parameters arrive as environment
//! variables, CPU affinity is restricted to the assigned core ids via a
//! cpuset, declared inputs are bind-mounted, and declared outputs are copied
//! back into the permutation's results directory on exit. How that isolation
//! is built (images, namespaces, cgroups, bridges) is entirely the runner's
//! business.
//!
//! Runners are produced per attempt through a [`RunnerFactory`], so the
//! scheduler never learns which container implementation it is driving.

mod null;

pub use null::{NullRunner, NullRunnerFactory};

use crate::job::{InputSpec, OutputSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced across the runner boundary.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The stage declares neither `path` nor `cmd`, so there is nothing to
    /// execute. Terminal for the permutation.
    #[error("run did not specify path or cmd: {0}")]
    MissingEntrypoint(String),

    /// The runner could not be constructed (image pull, rootfs, container
    /// setup).
    #[error("could not initialise runner: {0}")]
    Init(String),

    /// The stage process could not be executed or awaited.
    #[error("could not run stage process: {0}")]
    Execution(String),
}

/// What a stage executes: an executable already present in the image, or a
/// shell snippet the runner synthesises into an entrypoint script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entrypoint {
    Path(String),
    Cmd(String),
}

/// Everything a runner needs to execute one stage of one permutation.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Stage name within the job.
    pub name: String,

    /// `<digest>-<stage>`: logger prefix, container name, cgroup name.
    pub label: String,

    /// Container image reference.
    pub image: String,

    /// Runner scratch space (image tarballs, rootfs trees).
    pub cache_dir: PathBuf,

    /// The permutation's results directory; outputs land here and are
    /// re-seeded into the next stage's rootfs.
    pub results_dir: PathBuf,

    /// This stage's working directory under the results directory.
    pub work_dir: PathBuf,

    /// Exact core ids the stage is pinned to.
    pub core_ids: Vec<u32>,

    pub devices: Vec<String>,
    pub capabilities: Vec<String>,
    pub entrypoint: Entrypoint,

    /// Environment for the stage process: one entry per job parameter plus
    /// the synthetic `UKBENCH_*` core descriptors.
    pub env: Vec<(String, String)>,

    pub inputs: Arc<[InputSpec]>,
    pub outputs: Arc<[OutputSpec]>,

    pub allow_override: bool,
}

impl RunnerConfig {
    /// The assigned core ids as a cpuset list (`"1,3,5"`).
    pub fn cpuset(&self) -> String {
        self.core_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Result of one stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code of the stage process.
    pub exit_code: i32,

    /// Wall time from the runner's pre-exec commit point until the stage
    /// process terminated. A zero duration marks an attempt that never
    /// reached user code.
    pub elapsed: Duration,
}

impl RunOutcome {
    /// An attempt counts as successful when the process ran (`elapsed > 0`)
    /// and exited cleanly.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.elapsed > Duration::ZERO
    }
}

/// Executes one configured stage inside isolation.
///
/// `run` blocks until the stage process has terminated. `destroy` must be
/// idempotent and safe to call whether or not `run` was ever invoked.
pub trait Runner: Send {
    fn run(&mut self) -> Result<RunOutcome, RunnerError>;
    fn destroy(&mut self) -> Result<(), RunnerError>;
}

/// Builds a fresh [`Runner`] for every attempt of a stage.
pub trait RunnerFactory: Send + Sync {
    fn create(&self, config: RunnerConfig) -> Result<Box<dyn Runner>, RunnerError>;
}
