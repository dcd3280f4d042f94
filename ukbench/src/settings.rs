//! Runtime settings and the on-disk workspace layout.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error raised when a CPU list fails to parse.
#[derive(Debug, Error)]
#[error("invalid syntax for CPU sets: {0}")]
pub struct CpuListError(pub String);

/// Runtime configuration for a benchmark session.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Physical CPU ids the scheduler may hand out.
    pub cpus: Vec<u32>,

    /// Working directory holding `.cache/` and `results/`.
    pub work_dir: PathBuf,

    /// Cooperative yield interval of the scheduler loop.
    pub schedule_grace: Duration,

    /// Extra attempts granted to a failing stage; `0` means exactly one
    /// attempt.
    pub max_retries: u32,

    /// Permit reuse of a non-empty permutation results directory.
    pub allow_override: bool,

    /// Substitute the no-op runner: log what would execute without touching
    /// the host.
    pub dry_run: bool,
}

impl Settings {
    /// Creates settings with the default grace interval (1s) and no retries.
    pub fn new(cpus: Vec<u32>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            cpus,
            work_dir: work_dir.into(),
            schedule_grace: Duration::from_secs(1),
            max_retries: 0,
            allow_override: false,
            dry_run: false,
        }
    }

    pub fn with_schedule_grace(mut self, grace: Duration) -> Self {
        self.schedule_grace = grace;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Parses a CPU list: comma-separated ids and inclusive ranges, e.g.
    /// `"2-6"`, `"0,2,4"` or `"0,4-7"`. The result is sorted and
    /// deduplicated.
    pub fn parse_cpu_list(raw: &str) -> Result<Vec<u32>, CpuListError> {
        let mut cpus = Vec::new();

        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            match token.split_once('-') {
                Some((start, end)) => {
                    let start: u32 = start
                        .trim()
                        .parse()
                        .map_err(|_| CpuListError(raw.to_string()))?;
                    let end: u32 = end
                        .trim()
                        .parse()
                        .map_err(|_| CpuListError(raw.to_string()))?;
                    if end < start {
                        return Err(CpuListError(raw.to_string()));
                    }
                    cpus.extend(start..=end);
                }
                None => {
                    cpus.push(token.parse().map_err(|_| CpuListError(raw.to_string()))?);
                }
            }
        }

        cpus.sort_unstable();
        cpus.dedup();
        Ok(cpus)
    }

    /// The workspace layout rooted at this configuration's working
    /// directory.
    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(&self.work_dir)
    }
}

/// Filesystem layout under the configured working directory.
///
/// ```text
/// <work_dir>/
///   .cache/                 runner scratch (image tarballs, rootfs trees)
///   results/perms.json      permutation manifest
///   results/<digest>/       one directory per permutation
///   results/<digest>/<stage>/
/// ```
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    work_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.work_dir.join(".cache")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.work_dir.join("results")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.results_dir().join("perms.json")
    }

    /// Results directory of one permutation.
    pub fn permutation_dir(&self, digest: &str) -> PathBuf {
        self.results_dir().join(digest)
    }

    /// Working directory of one stage within a permutation.
    pub fn stage_dir(&self, digest: &str, stage: &str) -> PathBuf {
        self.permutation_dir(digest).join(stage)
    }

    /// Creates the working, cache and results directories.
    pub fn bootstrap(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(self.cache_dir())?;
        std::fs::create_dir_all(self.results_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list_range_is_inclusive() {
        assert_eq!(Settings::parse_cpu_list("2-6").unwrap(), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_parse_cpu_list_commas() {
        assert_eq!(Settings::parse_cpu_list("0,2,4").unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn test_parse_cpu_list_mixed_and_deduplicated() {
        assert_eq!(
            Settings::parse_cpu_list("0,4-7,5").unwrap(),
            vec![0, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_parse_cpu_list_rejects_garbage() {
        assert!(Settings::parse_cpu_list("two-six").is_err());
        assert!(Settings::parse_cpu_list("4-2").is_err());
        assert!(Settings::parse_cpu_list("1-2-3").is_err());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::new(vec![0, 1], "/tmp/bench");
        assert_eq!(settings.schedule_grace, Duration::from_secs(1));
        assert_eq!(settings.max_retries, 0);
        assert!(!settings.allow_override);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_builders() {
        let settings = Settings::new(vec![0], "/tmp/bench")
            .with_schedule_grace(Duration::from_millis(10))
            .with_max_retries(2)
            .with_allow_override(true)
            .with_dry_run(true);

        assert_eq!(settings.schedule_grace, Duration::from_millis(10));
        assert_eq!(settings.max_retries, 2);
        assert!(settings.allow_override);
        assert!(settings.dry_run);
    }

    #[test]
    fn test_layout_paths() {
        let layout = WorkspaceLayout::new("/srv/bench");

        assert_eq!(layout.cache_dir(), PathBuf::from("/srv/bench/.cache"));
        assert_eq!(
            layout.manifest_path(),
            PathBuf::from("/srv/bench/results/perms.json")
        );
        assert_eq!(
            layout.permutation_dir("abc123"),
            PathBuf::from("/srv/bench/results/abc123")
        );
        assert_eq!(
            layout.stage_dir("abc123", "measure"),
            PathBuf::from("/srv/bench/results/abc123/measure")
        );
    }

    #[test]
    fn test_layout_bootstrap_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path().join("bench"));

        layout.bootstrap().unwrap();
        assert!(layout.cache_dir().is_dir());
        assert!(layout.results_dir().is_dir());

        // bootstrap over an existing tree is fine
        layout.bootstrap().unwrap();
    }
}
