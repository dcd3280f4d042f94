//! Dry-run collaborator: reports success without touching the host.

use super::{RunOutcome, Runner, RunnerConfig, RunnerError, RunnerFactory};
use std::time::Duration;
use tracing::{debug, info};

/// A runner that logs what it would execute and immediately succeeds.
///
/// Selected in dry-run mode so a job can be validated end to end - expansion,
/// scheduling, core accounting, directory layout - without building a single
/// container.
pub struct NullRunner {
    config: RunnerConfig,
    destroyed: bool,
}

impl NullRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            destroyed: false,
        }
    }
}

impl Runner for NullRunner {
    fn run(&mut self) -> Result<RunOutcome, RunnerError> {
        info!(
            run = %self.config.label,
            image = %self.config.image,
            cpuset = %self.config.cpuset(),
            "dry run: skipping execution"
        );

        // Report the smallest positive elapsed time so the attempt counts as
        // having reached user code.
        Ok(RunOutcome {
            exit_code: 0,
            elapsed: Duration::from_nanos(1),
        })
    }

    fn destroy(&mut self) -> Result<(), RunnerError> {
        if !self.destroyed {
            debug!(run = %self.config.label, "dry run: destroying runner");
            self.destroyed = true;
        }
        Ok(())
    }
}

/// Factory producing [`NullRunner`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRunnerFactory;

impl RunnerFactory for NullRunnerFactory {
    fn create(&self, config: RunnerConfig) -> Result<Box<dyn Runner>, RunnerError> {
        Ok(Box::new(NullRunner::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Entrypoint;

    fn config() -> RunnerConfig {
        RunnerConfig {
            name: "measure".into(),
            label: "deadbeef-measure".into(),
            image: "scratch".into(),
            cache_dir: "/tmp/.cache".into(),
            results_dir: "/tmp/results/deadbeef".into(),
            work_dir: "/tmp/results/deadbeef/measure".into(),
            core_ids: vec![0],
            devices: Vec::new(),
            capabilities: Vec::new(),
            entrypoint: Entrypoint::Path("/bin/true".into()),
            env: Vec::new(),
            inputs: Vec::new().into(),
            outputs: Vec::new().into(),
            allow_override: false,
        }
    }

    #[test]
    fn test_null_runner_succeeds() {
        let mut runner = NullRunner::new(config());
        let outcome = runner.run().unwrap();
        assert!(outcome.is_success());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut runner = NullRunner::new(config());
        runner.destroy().unwrap();
        runner.destroy().unwrap();

        // destroy without run is also fine
        let mut fresh = NullRunner::new(config());
        fresh.destroy().unwrap();
    }

    #[test]
    fn test_factory_builds_runners() {
        let factory = NullRunnerFactory;
        let mut runner = factory.create(config()).unwrap();
        assert!(runner.run().unwrap().is_success());
    }
}
