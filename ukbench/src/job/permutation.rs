//! Permutations: fully-bound parameter assignments and their identity.
//!
//! The permutation generator walks the Cartesian product of the expanded
//! parameters in declaration order (leftmost parameter varies slowest). Each
//! permutation's identity is the 128-bit MD5 digest of the canonical
//! `name=value\n` serialization, which doubles as its results-directory name
//! and as the at-most-one-active-stage key in the scheduler.

use super::error::JobError;
use super::param::{expand_param, ParamType};
use super::queue::RunQueue;
use super::spec::{InputSpec, JobSpec, OutputSpec, RunSpec};
use md5::{Digest, Md5};
use std::sync::Arc;
use tracing::{debug, warn};

/// One bound parameter: `(name, type, value-as-string)`.
///
/// The type is advisory for downstream consumers; the value always travels
/// as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue {
    pub name: String,
    pub ptype: ParamType,
    pub value: String,
}

/// Computes the permutation digest over `(name, value)` pairs in declaration
/// order.
///
/// The digest is a deterministic function of the pairs alone: recomputing it
/// in another process yields bit-identical output.
pub fn digest_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = Md5::new();
    for (name, value) in pairs {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// One fully-bound assignment of all declared parameters - the unit the
/// scheduler moves through the job's stages.
///
/// Immutable after expansion, except for its run queue, which drains as
/// stages are committed and empties at once on [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct Permutation {
    params: Vec<ParamValue>,
    digest: String,
    runs: RunQueue,
    inputs: Arc<[InputSpec]>,
    outputs: Arc<[OutputSpec]>,
}

impl Permutation {
    pub(crate) fn new(
        params: Vec<ParamValue>,
        stages: &[RunSpec],
        inputs: Arc<[InputSpec]>,
        outputs: Arc<[OutputSpec]>,
    ) -> Self {
        let digest = digest_pairs(params.iter().map(|p| (p.name.as_str(), p.value.as_str())));

        let runs = RunQueue::new(stages.len());
        for stage in stages {
            runs.enqueue(stage.clone())
                .expect("run queue sized to the stage count");
        }

        Self {
            params,
            digest,
            runs,
            inputs,
            outputs,
        }
    }

    /// The bound parameter values, in declaration order.
    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }

    /// Stable 128-bit identity as lowercase hex.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The remaining run stages of this permutation.
    pub fn runs(&self) -> &RunQueue {
        &self.runs
    }

    /// Inputs shared read-only with every stage.
    pub fn inputs(&self) -> &Arc<[InputSpec]> {
        &self.inputs
    }

    /// Outputs shared read-only with every stage.
    pub fn outputs(&self) -> &Arc<[OutputSpec]> {
        &self.outputs
    }

    /// Cancels the permutation by dropping every remaining stage.
    ///
    /// Idempotent. An already-running supervisor is allowed to complete; the
    /// scheduler removes the permutation once its cores are released.
    pub fn cancel(&self) {
        warn!(digest = %self.digest, "cancelling permutation and all subsequent runs");
        self.runs.clear();
    }
}

/// Expands the job's parameters into the full permutation list.
///
/// The product is walked in lexicographic order over parameter-declaration
/// order, so the output is stable and reproducible across runs of the same
/// input. Parameters that expand to no values are dropped from the product;
/// a job left with no usable parameters is rejected.
pub fn expand_permutations(
    job: &JobSpec,
    stages: &[RunSpec],
) -> Result<Vec<Arc<Permutation>>, JobError> {
    let mut axes: Vec<Vec<ParamValue>> = Vec::with_capacity(job.params.len());
    for spec in &job.params {
        let values = expand_param(spec)?;
        if values.is_empty() {
            debug!(param = %spec.name, "dropping parameter from the permutation product");
            continue;
        }
        axes.push(values);
    }

    if axes.is_empty() {
        return Err(JobError::NoParams);
    }

    let inputs: Arc<[InputSpec]> = job.inputs.clone().into();
    let outputs: Arc<[OutputSpec]> = job.outputs.clone().into();

    let total: usize = axes.iter().map(Vec::len).product();
    let mut perms = Vec::with_capacity(total);
    let mut cursor = vec![0usize; axes.len()];

    loop {
        let params: Vec<ParamValue> = axes
            .iter()
            .zip(&cursor)
            .map(|(axis, &i)| axis[i].clone())
            .collect();

        perms.push(Arc::new(Permutation::new(
            params,
            stages,
            Arc::clone(&inputs),
            Arc::clone(&outputs),
        )));

        // Odometer increment: rightmost axis varies fastest.
        let mut axis = axes.len();
        loop {
            if axis == 0 {
                return Ok(perms);
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < axes[axis].len() {
                break;
            }
            cursor[axis] = 0;
        }
    }
}
