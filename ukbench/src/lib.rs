//! ukbench - parameter-permutation benchmarking harness
//!
//! This library turns a declarative job description (parameters × run stages)
//! into a bounded execution plan and drives it through a core-pinned
//! scheduler: every permutation of the declared parameters runs its stages in
//! order, each stage pinned to a reserved set of CPU cores, with at most one
//! stage of any permutation active at a time.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use ukbench::job::JobSpec;
//! use ukbench::runner::NullRunnerFactory;
//! use ukbench::sched::Scheduler;
//! use ukbench::settings::Settings;
//!
//! let job = JobSpec::from_path("job.yaml")?;
//! let settings = Settings::new(Settings::parse_cpu_list("2-5")?, "/var/lib/ukbench");
//!
//! let mut scheduler = Scheduler::new(settings, Arc::new(NullRunnerFactory::default()))?;
//! scheduler.prepare(&job)?;
//! let report = scheduler.run().await;
//! println!("{}/{} runs scheduled", report.scheduled, report.total);
//! ```
//!
//! Container construction, image pulling and host tuning are external
//! collaborators reached only through [`runner::Runner`] and
//! [`runner::RunnerFactory`].

pub mod job;
pub mod logging;
pub mod runner;
pub mod sched;
pub mod settings;

/// Version of the ukbench library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
