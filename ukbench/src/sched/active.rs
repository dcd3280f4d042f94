//! Active runs and their supervisors.
//!
//! An [`ActiveRun`] is one committed `(permutation, stage)` pair together
//! with the cores reserved for it. Its supervisor drives the Runner through
//! the retry policy, cancels the permutation on terminal failure, and always
//! hands the cores back.

use super::coremap::CoreMap;
use crate::job::{Permutation, RunSpec};
use crate::runner::{Entrypoint, RunnerConfig, RunnerError, RunnerFactory};
use crate::settings::WorkspaceLayout;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// One scheduled stage of one permutation, pinned to a set of cores.
#[derive(Debug)]
pub struct ActiveRun {
    permutation: Arc<Permutation>,
    stage: RunSpec,
    cores: Vec<u32>,
    max_retries: u32,
    started_at: Instant,
    label: String,
}

impl ActiveRun {
    pub(crate) fn new(
        permutation: Arc<Permutation>,
        stage: RunSpec,
        cores: Vec<u32>,
        max_retries: u32,
    ) -> Arc<Self> {
        let label = format!("{}-{}", permutation.digest(), stage.name);
        Arc::new(Self {
            permutation,
            stage,
            cores,
            max_retries,
            started_at: Instant::now(),
            label,
        })
    }

    /// `<digest>-<stage>`: the identity carried through logs and handed to
    /// the Runner.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Digest of the owning permutation - the at-most-one-active-stage key.
    pub fn digest(&self) -> &str {
        self.permutation.digest()
    }

    /// The exact core ids this run holds.
    pub fn cores(&self) -> &[u32] {
        &self.cores
    }

    pub fn stage(&self) -> &RunSpec {
        &self.stage
    }

    /// When the scheduler committed this run. The authoritative stage timing
    /// comes from the Runner, not from this timestamp.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Environment for the stage process: one entry per bound parameter plus
    /// the synthetic core descriptors.
    fn environment(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .permutation
            .params()
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();

        env.push((
            "UKBENCH_TOTAL_CORES".to_string(),
            self.cores.len().to_string(),
        ));
        env.push((
            "UKBENCH_CORES".to_string(),
            self.cores
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        ));
        for (k, id) in self.cores.iter().enumerate() {
            env.push((format!("UKBENCH_CORE_ID{k}"), id.to_string()));
        }

        env
    }

    /// Builds the Runner configuration for this run and creates the stage
    /// working directory.
    ///
    /// A stage declaring neither `path` nor `cmd` is unrunnable; that error
    /// is terminal for the permutation.
    pub(crate) fn runner_config(
        &self,
        layout: &WorkspaceLayout,
        allow_override: bool,
    ) -> Result<RunnerConfig, RunnerError> {
        let entrypoint = match (&self.stage.path, &self.stage.cmd) {
            (Some(path), _) => Entrypoint::Path(path.clone()),
            (None, Some(cmd)) => Entrypoint::Cmd(cmd.clone()),
            (None, None) => return Err(RunnerError::MissingEntrypoint(self.stage.name.clone())),
        };

        let work_dir = layout.stage_dir(self.digest(), &self.stage.name);
        fs::create_dir_all(&work_dir).map_err(|err| {
            RunnerError::Init(format!(
                "could not create stage directory {}: {err}",
                work_dir.display()
            ))
        })?;

        Ok(RunnerConfig {
            name: self.stage.name.clone(),
            label: self.label.clone(),
            image: self.stage.image.clone(),
            cache_dir: layout.cache_dir(),
            results_dir: layout.permutation_dir(self.digest()),
            work_dir,
            core_ids: self.cores.clone(),
            devices: self.stage.devices.clone(),
            capabilities: self.stage.capabilities.clone(),
            entrypoint,
            env: self.environment(),
            inputs: Arc::clone(self.permutation.inputs()),
            outputs: Arc::clone(self.permutation.outputs()),
            allow_override,
        })
    }

    /// Supervises this run to completion.
    ///
    /// Per attempt a fresh Runner is created, run and destroyed; an attempt
    /// succeeds when the process ran and exited cleanly. After
    /// `max_retries + 1` failed attempts the permutation is cancelled. Every
    /// reserved core is released on the way out, whatever happened.
    pub(crate) async fn supervise(
        self: Arc<Self>,
        factory: Arc<dyn RunnerFactory>,
        core_map: Arc<CoreMap>,
        layout: WorkspaceLayout,
        allow_override: bool,
    ) {
        let config = match self.runner_config(&layout, allow_override) {
            Ok(config) => config,
            Err(err) => {
                error!(run = %self.label, %err, "could not initialise run");
                self.permutation.cancel();
                self.release_cores(&core_map);
                return;
            }
        };

        let mut succeeded = false;

        for attempt in 0..=self.max_retries {
            let factory = Arc::clone(&factory);
            let config = config.clone();
            let label = self.label.clone();

            let attempt_result = tokio::task::spawn_blocking(move || {
                let mut runner = factory.create(config)?;
                let outcome = runner.run();
                if let Err(err) = runner.destroy() {
                    warn!(run = %label, %err, "could not destroy runner");
                }
                outcome
            })
            .await;

            let outcome = match attempt_result {
                Ok(Ok(outcome)) => Some(outcome),
                Ok(Err(err)) => {
                    error!(run = %self.label, %err, "could not complete run");
                    None
                }
                Err(err) => {
                    error!(run = %self.label, %err, "run supervisor task failed");
                    None
                }
            };

            match outcome {
                Some(outcome) if outcome.is_success() => {
                    info!(run = %self.label, elapsed = ?outcome.elapsed, "run finished");
                    succeeded = true;
                    break;
                }
                Some(outcome) if outcome.exit_code != 0 => {
                    error!(
                        run = %self.label,
                        exit_code = outcome.exit_code,
                        "run exited with failure"
                    );
                }
                Some(_) => {
                    error!(run = %self.label, "run finished without reaching user code");
                }
                None => {}
            }

            if attempt < self.max_retries {
                info!(
                    run = %self.label,
                    attempt = attempt + 1,
                    max_retries = self.max_retries,
                    "trying run again"
                );
            }
        }

        if !succeeded {
            self.permutation.cancel();
        }

        self.release_cores(&core_map);
    }

    fn release_cores(&self, core_map: &CoreMap) {
        for &core in &self.cores {
            core_map.release(core);
        }
    }
}
