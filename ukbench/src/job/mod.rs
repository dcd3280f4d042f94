//! Job descriptions and their expansion into permutations.
//!
//! A job is a YAML document declaring parameters, inputs, outputs and an
//! ordered list of run stages. Expansion turns the parameters into a
//! deterministic list of [`Permutation`]s - one fully-bound assignment of all
//! parameters each - and every permutation carries its own FIFO [`RunQueue`]
//! of the job's stages.

mod error;
mod manifest;
mod param;
mod permutation;
mod queue;
mod spec;

pub use error::JobError;
pub use manifest::{read_manifest, write_manifest, Manifest};
pub use param::{expand_param, ParamType};
pub use permutation::{digest_pairs, expand_permutations, ParamValue, Permutation};
pub use queue::{QueueFull, RunQueue};
pub use spec::{InputSpec, JobSpec, OutputSpec, ParamSpec, RunSpec};
