//! Authoritative registry of CPU-core ownership.

use super::active::ActiveRun;
use super::error::SchedError;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};
use tracing::debug;

/// Map from CPU id to the run currently pinned to it.
///
/// The id set is fixed at construction and never grows. Entries hold weak
/// back-references so a cancelled permutation's [`ActiveRun`] can be dropped
/// without waiting on map iteration.
#[derive(Debug)]
pub struct CoreMap {
    slots: RwLock<BTreeMap<u32, Option<Weak<ActiveRun>>>>,
}

impl CoreMap {
    /// Creates a map over the given CPU ids, all free.
    pub fn new(cores: &[u32]) -> Self {
        Self {
            slots: RwLock::new(cores.iter().map(|&id| (id, None)).collect()),
        }
    }

    /// Snapshot of the currently free ids, ascending.
    pub fn free(&self) -> Vec<u32> {
        let slots = self.slots.read().unwrap();
        slots
            .iter()
            .filter(|(_, owner)| owner.is_none())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Assigns `core` to `owner`, failing when the slot is already held.
    pub fn reserve(&self, core: u32, owner: &Arc<ActiveRun>) -> Result<(), SchedError> {
        let mut slots = self.slots.write().unwrap();
        match slots.get_mut(&core) {
            None => Err(SchedError::UnknownCore { core }),
            Some(slot) if slot.is_some() => Err(SchedError::CoreConflict { core }),
            Some(slot) => {
                debug!(core, run = %owner.label(), "reserving core");
                *slot = Some(Arc::downgrade(owner));
                Ok(())
            }
        }
    }

    /// Frees `core`. Idempotent; releasing an id outside the set is a no-op.
    pub fn release(&self, core: u32) {
        let mut slots = self.slots.write().unwrap();
        if let Some(slot) = slots.get_mut(&core) {
            if slot.is_some() {
                debug!(core, "releasing core");
            }
            *slot = None;
        }
    }

    /// Read-locked view of every slot. The caller holds the guard for the
    /// duration of inspection.
    pub fn all(&self) -> RwLockReadGuard<'_, BTreeMap<u32, Option<Weak<ActiveRun>>>> {
        self.slots.read().unwrap()
    }

    /// True while any live run with the given permutation digest holds a
    /// core.
    pub fn holds_digest(&self, digest: &str) -> bool {
        let slots = self.all();
        slots
            .values()
            .flatten()
            .any(|owner| owner.upgrade().is_some_and(|run| run.digest() == digest))
    }

    /// Number of ids in the configured set.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{expand_permutations, JobSpec, ParamSpec, RunSpec};

    fn active_run(value: &str) -> Arc<ActiveRun> {
        let job = JobSpec {
            params: vec![ParamSpec {
                name: "x".into(),
                ptype: "integer".into(),
                only: vec![value.into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let stage = RunSpec {
            name: "run".into(),
            cores: 1,
            ..Default::default()
        };
        let perm = expand_permutations(&job, &[stage.clone()])
            .unwrap()
            .remove(0);
        ActiveRun::new(perm, stage, vec![0], 0)
    }

    #[test]
    fn test_all_cores_start_free() {
        let map = CoreMap::new(&[4, 2, 7]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.free(), vec![2, 4, 7]); // ascending snapshot
    }

    #[test]
    fn test_reserve_and_release() {
        let map = CoreMap::new(&[0, 1]);
        let run = active_run("1");

        map.reserve(0, &run).unwrap();
        assert_eq!(map.free(), vec![1]);

        map.release(0);
        assert_eq!(map.free(), vec![0, 1]);
    }

    #[test]
    fn test_reserve_conflict() {
        let map = CoreMap::new(&[0]);
        let first = active_run("1");
        let second = active_run("2");

        map.reserve(0, &first).unwrap();
        assert!(matches!(
            map.reserve(0, &second),
            Err(SchedError::CoreConflict { core: 0 })
        ));
    }

    #[test]
    fn test_reserve_unknown_core() {
        let map = CoreMap::new(&[0]);
        let run = active_run("1");

        assert!(matches!(
            map.reserve(9, &run),
            Err(SchedError::UnknownCore { core: 9 })
        ));
    }

    #[test]
    fn test_release_is_idempotent() {
        let map = CoreMap::new(&[0]);
        let run = active_run("1");

        map.reserve(0, &run).unwrap();
        map.release(0);
        map.release(0);
        map.release(42); // outside the set: no-op

        assert_eq!(map.free(), vec![0]);
    }

    #[test]
    fn test_holds_digest_tracks_live_owners() {
        let map = CoreMap::new(&[0, 1]);
        let run = active_run("1");
        let digest = run.digest().to_string();

        assert!(!map.holds_digest(&digest));

        map.reserve(0, &run).unwrap();
        assert!(map.holds_digest(&digest));
        assert!(!map.holds_digest("00000000000000000000000000000000"));

        map.release(0);
        assert!(!map.holds_digest(&digest));
    }

    #[test]
    fn test_dead_owner_does_not_count_as_active() {
        let map = CoreMap::new(&[0]);
        let run = active_run("1");
        let digest = run.digest().to_string();

        map.reserve(0, &run).unwrap();
        drop(run);

        // The weak entry is stale: the digest is no longer live even though
        // the slot has not been released yet.
        assert!(!map.holds_digest(&digest));
        assert!(map.free().is_empty());
    }
}
