//! The round-robin admission loop.

use super::active::ActiveRun;
use super::coremap::CoreMap;
use super::error::SchedError;
use super::waitlist::WaitList;
use crate::job::{expand_permutations, write_manifest, JobError, JobSpec, Permutation, RunSpec};
use crate::runner::{NullRunnerFactory, RunnerFactory};
use crate::settings::{Settings, WorkspaceLayout};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Final accounting of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Stages committed to supervisors.
    pub scheduled: usize,

    /// Stages the prepared job declared (`permutations × stages`).
    pub total: usize,
}

/// Drives every permutation of a prepared job through its run stages.
///
/// One loop task walks the wait list; one supervisor task per committed
/// stage runs in parallel on the reserved cores. The loop owns the
/// [`CoreMap`] and the wait list outright, so cleanup is deterministic and
/// nothing scheduler-shaped lives in process-wide state.
pub struct Scheduler {
    settings: Settings,
    layout: WorkspaceLayout,
    cores: Arc<CoreMap>,
    wait_list: WaitList,
    factory: Arc<dyn RunnerFactory>,
    total_stages: usize,
    scheduled: usize,
    supervisors: JoinSet<()>,
}

impl Scheduler {
    /// Creates a scheduler over the configured CPU set.
    ///
    /// In dry-run mode the provided factory is substituted with the no-op
    /// [`NullRunnerFactory`].
    pub fn new(settings: Settings, factory: Arc<dyn RunnerFactory>) -> Result<Self, SchedError> {
        if settings.cpus.is_empty() {
            return Err(SchedError::NoCpus);
        }

        let factory: Arc<dyn RunnerFactory> = if settings.dry_run {
            Arc::new(NullRunnerFactory)
        } else {
            factory
        };

        Ok(Self {
            layout: settings.layout(),
            cores: Arc::new(CoreMap::new(&settings.cpus)),
            wait_list: WaitList::new(),
            factory,
            total_stages: 0,
            scheduled: 0,
            supervisors: JoinSet::new(),
            settings,
        })
    }

    /// Expands the job, writes the permutation manifest and fills the wait
    /// list. Must run before [`run`](Self::run).
    ///
    /// All validation lives here: an empty parameter list, an impossible
    /// range, a stage requesting more cores than the CPU set holds, or a
    /// stage declaring both `path` and `cmd` rejects the job before anything
    /// is scheduled.
    pub fn prepare(&mut self, job: &JobSpec) -> Result<(), JobError> {
        if job.params.is_empty() {
            return Err(JobError::NoParams);
        }

        let stages = job.normalized_runs(self.cores.len())?;

        self.layout.bootstrap().map_err(|source| JobError::WorkDir {
            path: self.layout.work_dir().to_path_buf(),
            source,
        })?;

        let perms = expand_permutations(job, &stages)?;
        write_manifest(&perms, &self.layout.manifest_path())?;

        for perm in perms {
            self.admit(perm);
        }

        self.total_stages = self.wait_list.len() * stages.len();
        info!(
            permutations = self.wait_list.len(),
            runs = self.total_stages,
            "job prepared"
        );

        Ok(())
    }

    /// Adds a permutation to the wait list after preparing its results
    /// directory.
    ///
    /// A non-empty directory from an earlier session blocks the permutation
    /// unless `allow_override` is set; the permutation is skipped, not
    /// fatal.
    fn admit(&self, perm: Arc<Permutation>) {
        let dir = self.layout.permutation_dir(perm.digest());

        if dir.exists() {
            match dir_is_empty(&dir) {
                Ok(true) => {}
                Ok(false) if self.settings.allow_override => {}
                Ok(false) => {
                    error!(
                        digest = %perm.digest(),
                        dir = %dir.display(),
                        "results directory not empty, skipping permutation"
                    );
                    return;
                }
                Err(err) => {
                    error!(
                        digest = %perm.digest(),
                        %err,
                        "could not inspect results directory, skipping permutation"
                    );
                    return;
                }
            }
        } else if let Err(err) = fs::create_dir_all(&dir) {
            error!(
                digest = %perm.digest(),
                %err,
                "could not create results directory, skipping permutation"
            );
            return;
        }

        self.wait_list.add(perm);
    }

    /// Runs the prepared job to completion.
    ///
    /// The loop keeps revisiting the wait list in order until it drains,
    /// then joins every outstanding supervisor. Cancelled permutations do
    /// not fail the run; the report carries the final accounting.
    pub async fn run(&mut self) -> SchedulerReport {
        let grace = self.settings.schedule_grace;
        let mut cursor = 0usize;

        while !self.wait_list.is_empty() {
            let free = self.cores.free();
            if free.is_empty() {
                sleep(grace).await;
                continue;
            }

            let Some(perm) = self.wait_list.get(cursor) else {
                // The cursor drifted past a removal; jump back to the front.
                cursor = 0;
                continue;
            };

            // Peek without dequeueing so a stage that cannot be admitted yet
            // keeps its place at the head of the queue.
            if let Some(stage) = perm.runs().peek() {
                if free.len() >= stage.cores && !self.cores.holds_digest(perm.digest()) {
                    self.try_commit(&perm, stage, &free);
                }
            }

            // Cooperative yield: supervisors make progress during the grace
            // interval.
            sleep(grace).await;

            // A permutation leaves the wait list only once its queue is
            // drained AND its last supervisor has released its cores.
            let mut removed = false;
            if perm.runs().is_empty()
                && !self.cores.holds_digest(perm.digest())
                && self.wait_list.remove(cursor).is_some()
            {
                debug!(digest = %perm.digest(), "permutation complete");
                removed = true;
            }

            let len = self.wait_list.len();
            if len == 0 {
                break;
            }
            if !removed {
                cursor += 1;
            }
            if cursor >= len {
                cursor = 0;
            }
        }

        while self.supervisors.join_next().await.is_some() {}

        info!(
            scheduled = self.scheduled,
            total = self.total_stages,
            "job complete"
        );

        SchedulerReport {
            scheduled: self.scheduled,
            total: self.total_stages,
        }
    }

    /// Reserves cores for the permutation's next stage and hands it to a
    /// supervisor.
    ///
    /// Cores are taken from the tail of the ascending free snapshot so that
    /// low-indexed cores stay available for later admissions. The stage is
    /// dequeued only after the whole reservation holds; any conflict rolls
    /// the iteration back without partial commits.
    fn try_commit(&mut self, perm: &Arc<Permutation>, stage: RunSpec, free: &[u32]) {
        let needed = stage.cores;
        let selection: Vec<u32> = free[free.len() - needed..].to_vec();
        let active = ActiveRun::new(
            Arc::clone(perm),
            stage,
            selection.clone(),
            self.settings.max_retries,
        );

        let mut reserved: Vec<u32> = Vec::with_capacity(needed);
        for &core in &selection {
            match self.cores.reserve(core, &active) {
                Ok(()) => reserved.push(core),
                Err(err) => warn!(core, %err, "could not reserve core"),
            }
        }

        if reserved.len() < needed {
            for &core in &reserved {
                self.cores.release(core);
            }
            return;
        }

        if perm.runs().dequeue().is_none() {
            // The queue emptied underneath us (cancellation); give the
            // cores back.
            for &core in &reserved {
                self.cores.release(core);
            }
            return;
        }

        self.scheduled += 1;
        info!(
            run = %active.label(),
            "scheduling run ({}/{})",
            self.scheduled,
            self.total_stages
        );

        self.supervisors.spawn(active.supervise(
            Arc::clone(&self.factory),
            Arc::clone(&self.cores),
            self.layout.clone(),
            self.settings.allow_override,
        ));
    }
}

fn dir_is_empty(path: &Path) -> std::io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ParamSpec;
    use std::time::Duration;

    fn job(values: &[&str], stages: usize, cores: usize) -> JobSpec {
        JobSpec {
            params: vec![ParamSpec {
                name: "x".into(),
                ptype: "integer".into(),
                only: values.iter().map(|v| v.to_string()).collect(),
                ..Default::default()
            }],
            runs: (0..stages)
                .map(|i| RunSpec {
                    name: format!("stage{i}"),
                    cores,
                    cmd: Some("./bench".into()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn settings(dir: &Path, cpus: Vec<u32>) -> Settings {
        Settings::new(cpus, dir)
            .with_schedule_grace(Duration::from_millis(5))
            .with_dry_run(true)
    }

    fn scheduler(dir: &Path, cpus: Vec<u32>) -> Scheduler {
        Scheduler::new(settings(dir, cpus), Arc::new(NullRunnerFactory)).unwrap()
    }

    #[test]
    fn test_empty_cpu_set_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Scheduler::new(settings(dir.path(), vec![]), Arc::new(NullRunnerFactory));
        assert!(matches!(result.err(), Some(SchedError::NoCpus)));
    }

    #[test]
    fn test_prepare_rejects_empty_params() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path(), vec![0]);

        let empty = JobSpec::default();
        assert!(matches!(sched.prepare(&empty), Err(JobError::NoParams)));
    }

    #[test]
    fn test_prepare_rejects_oversubscribed_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path(), vec![0, 1]);

        let err = sched.prepare(&job(&["1"], 1, 3)).unwrap_err();
        assert!(matches!(
            err,
            JobError::TooManyCores {
                requested: 3,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_prepare_writes_manifest_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path(), vec![0, 1]);

        sched.prepare(&job(&["1", "2", "3"], 2, 1)).unwrap();

        assert_eq!(sched.total_stages, 6);
        assert!(sched.layout.manifest_path().is_file());

        let manifest = crate::job::read_manifest(&sched.layout.manifest_path()).unwrap();
        assert_eq!(manifest.len(), 3);
        for digest in manifest.keys() {
            assert!(sched.layout.permutation_dir(digest).is_dir());
        }
    }

    #[test]
    fn test_prepare_skips_permutation_with_dirty_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let spec = job(&["1", "2"], 1, 1);

        // Pre-populate one permutation's results directory.
        let stages = spec.normalized_runs(1).unwrap();
        let perms = expand_permutations(&spec, &stages).unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        let dirty = layout.permutation_dir(perms[0].digest());
        fs::create_dir_all(&dirty).unwrap();
        fs::write(dirty.join("stale.csv"), "old").unwrap();

        let mut sched = scheduler(dir.path(), vec![0]);
        sched.prepare(&spec).unwrap();
        assert_eq!(sched.wait_list.len(), 1);
        assert_eq!(sched.total_stages, 1);

        // allow_override admits it again
        let mut sched = Scheduler::new(
            settings(dir.path(), vec![0]).with_allow_override(true),
            Arc::new(NullRunnerFactory),
        )
        .unwrap();
        sched.prepare(&spec).unwrap();
        assert_eq!(sched.wait_list.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dry_run_drains_the_wait_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path(), vec![0]);

        sched.prepare(&job(&["1"], 1, 1)).unwrap();
        let report = sched.run().await;

        assert_eq!(
            report,
            SchedulerReport {
                scheduled: 1,
                total: 1
            }
        );
        assert!(sched.wait_list.is_empty());
        assert_eq!(sched.cores.free(), vec![0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_without_prepare_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path(), vec![0]);

        let report = sched.run().await;
        assert_eq!(
            report,
            SchedulerReport {
                scheduled: 0,
                total: 0
            }
        );
    }
}
