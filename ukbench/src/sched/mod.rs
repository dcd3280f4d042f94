//! The core-pinned run scheduler.
//!
//! One cooperative loop task walks the wait list round-robin and admits run
//! stages onto free CPU cores; one supervisor task per admitted stage drives
//! the Runner, applies the retry policy and releases the cores. The
//! [`CoreMap`] is the single authority for CPU ownership and doubles as the
//! at-most-one-active-stage guard: a permutation is admitted only while no
//! live run carries its digest.

mod active;
mod coremap;
mod error;
mod scheduler;
mod waitlist;

pub use active::ActiveRun;
pub use coremap::CoreMap;
pub use error::SchedError;
pub use scheduler::{Scheduler, SchedulerReport};
pub use waitlist::WaitList;
