//! Scheduler error types.

use thiserror::Error;

/// Errors raised by the scheduler and its core accounting.
#[derive(Debug, Error)]
pub enum SchedError {
    /// The scheduler was constructed without any CPUs to hand out
    #[error("no CPUs provided")]
    NoCpus,

    /// A reservation lost the race for a core; recovered by the loop
    #[error("core {core} already in use")]
    CoreConflict { core: u32 },

    /// A reservation targeted an id outside the configured CPU set
    #[error("core {core} is not part of the configured CPU set")]
    UnknownCore { core: u32 },
}
