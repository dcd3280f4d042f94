//! Ordered collection of permutations with remaining stages.

use crate::job::Permutation;
use std::sync::{Arc, RwLock};

/// Indexable list of pending permutations.
///
/// The scheduler loop is the only writer; indices are invalidated by
/// removal, and the loop defends against that by resetting its cursor when a
/// lookup fails.
#[derive(Debug, Default)]
pub struct WaitList {
    items: RwLock<Vec<Arc<Permutation>>>,
}

impl WaitList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a permutation to the end of the list.
    pub fn add(&self, perm: Arc<Permutation>) {
        self.items.write().unwrap().push(perm);
    }

    /// Returns the permutation at `index`, if it is still there.
    pub fn get(&self, index: usize) -> Option<Arc<Permutation>> {
        self.items.read().unwrap().get(index).cloned()
    }

    /// Removes and returns the permutation at `index`.
    pub fn remove(&self, index: usize) -> Option<Arc<Permutation>> {
        let mut items = self.items.write().unwrap();
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{expand_permutations, JobSpec, ParamSpec, RunSpec};

    fn perms(values: &[&str]) -> Vec<Arc<Permutation>> {
        let job = JobSpec {
            params: vec![ParamSpec {
                name: "x".into(),
                ptype: "integer".into(),
                only: values.iter().map(|v| v.to_string()).collect(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let stage = RunSpec {
            name: "run".into(),
            cores: 1,
            ..Default::default()
        };
        expand_permutations(&job, &[stage]).unwrap()
    }

    #[test]
    fn test_add_get_len() {
        let list = WaitList::new();
        assert!(list.is_empty());

        for perm in perms(&["1", "2", "3"]) {
            list.add(perm);
        }

        assert_eq!(list.len(), 3);
        assert!(list.get(0).is_some());
        assert!(list.get(2).is_some());
        assert!(list.get(3).is_none());
    }

    #[test]
    fn test_remove_shifts_indices() {
        let list = WaitList::new();
        let all = perms(&["1", "2", "3"]);
        for perm in &all {
            list.add(Arc::clone(perm));
        }

        let removed = list.remove(1).unwrap();
        assert_eq!(removed.digest(), all[1].digest());
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().digest(), all[2].digest());
    }

    #[test]
    fn test_remove_out_of_bounds_is_none() {
        let list = WaitList::new();
        assert!(list.remove(0).is_none());
    }
}
