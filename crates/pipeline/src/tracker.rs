//! Process-wide job registry: progress values and completed artifacts.
//!
//! Modeled as an explicit service object injected into both the submission
//! handler and the pipeline controller, rather than ambient module state.
//! Jobs whose artifact is never downloaded leak their two entries and the
//! underlying file; that is an accepted operational constraint (operator
//! sweep), not something the tracker solves.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

/// Terminal failure sentinel, distinct from the 0..=100 range.
pub const FAILED: i8 = -1;
/// Terminal success value.
pub const COMPLETE: i8 = 100;

/// Concurrent job-id keyed registries. Cheap to clone; clones share state.
///
/// Per job the value moves `0 -> 1..99 -> {100 | -1}` in practice, but the
/// tracker itself is a last-write-wins store: monotonicity comes from the
/// controller being the only writer for a given job.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    progress: Arc<DashMap<String, i8>>,
    outputs: Arc<DashMap<String, PathBuf>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job at progress 0. Must happen before the pipeline task
    /// is spawned so early pollers never observe a missing entry.
    pub fn create(&self, job_id: &str) {
        self.progress.insert(job_id.to_string(), 0);
    }

    pub fn update(&self, job_id: &str, percent: i8) {
        self.progress.insert(job_id.to_string(), percent);
    }

    pub fn fail(&self, job_id: &str) {
        self.progress.insert(job_id.to_string(), FAILED);
    }

    /// Mark the job complete and record where its artifact lives. The two
    /// registries are kept consistent by the controller; there is no
    /// atomic transaction across them.
    pub fn complete(&self, job_id: &str, output: PathBuf) {
        self.outputs.insert(job_id.to_string(), output);
        self.progress.insert(job_id.to_string(), COMPLETE);
    }

    pub fn progress(&self, job_id: &str) -> Option<i8> {
        self.progress.get(job_id).map(|p| *p)
    }

    /// Completed artifact path without retiring the job. Lets delivery be
    /// staged: retire only once the artifact is actually readable, so a
    /// transient read failure does not strand a finished dub.
    pub fn output(&self, job_id: &str) -> Option<PathBuf> {
        self.outputs.get(job_id).map(|p| p.clone())
    }

    /// Take the completed artifact path, removing both registry entries.
    ///
    /// At-most-once: a second call for the same job returns `None`. The
    /// caller owns deleting the underlying file once delivered.
    pub fn fetch_and_retire(&self, job_id: &str) -> Option<PathBuf> {
        let (_, path) = self.outputs.remove(job_id)?;
        self.progress.remove(job_id);
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_created_running_complete() {
        let tracker = JobTracker::new();
        tracker.create("j1");
        assert_eq!(tracker.progress("j1"), Some(0));

        tracker.update("j1", 40);
        assert_eq!(tracker.progress("j1"), Some(40));

        tracker.complete("j1", PathBuf::from("/tmp/j1.mp4"));
        assert_eq!(tracker.progress("j1"), Some(COMPLETE));
    }

    #[test]
    fn failure_sentinel() {
        let tracker = JobTracker::new();
        tracker.create("j1");
        tracker.update("j1", 25);
        tracker.fail("j1");
        assert_eq!(tracker.progress("j1"), Some(FAILED));
    }

    #[test]
    fn fetch_and_retire_is_at_most_once() {
        let tracker = JobTracker::new();
        tracker.create("j1");
        tracker.complete("j1", PathBuf::from("/tmp/j1.mp4"));

        assert_eq!(
            tracker.fetch_and_retire("j1"),
            Some(PathBuf::from("/tmp/j1.mp4"))
        );
        assert_eq!(tracker.fetch_and_retire("j1"), None);
        assert_eq!(tracker.progress("j1"), None);
    }

    #[test]
    fn output_peek_does_not_retire() {
        let tracker = JobTracker::new();
        tracker.create("j1");
        tracker.complete("j1", PathBuf::from("/tmp/j1.mp4"));

        assert_eq!(tracker.output("j1"), Some(PathBuf::from("/tmp/j1.mp4")));
        // still fully collectable afterwards
        assert_eq!(tracker.progress("j1"), Some(COMPLETE));
        assert_eq!(
            tracker.fetch_and_retire("j1"),
            Some(PathBuf::from("/tmp/j1.mp4"))
        );
    }

    #[test]
    fn fetch_before_completion_is_none() {
        let tracker = JobTracker::new();
        tracker.create("j1");
        tracker.update("j1", 70);
        assert_eq!(tracker.fetch_and_retire("j1"), None);
        // an unfinished fetch must not disturb the running job
        assert_eq!(tracker.progress("j1"), Some(70));
    }

    #[test]
    fn unknown_job_is_none() {
        let tracker = JobTracker::new();
        assert_eq!(tracker.progress("nope"), None);
        assert_eq!(tracker.fetch_and_retire("nope"), None);
    }

    #[test]
    fn clones_share_state() {
        let tracker = JobTracker::new();
        let clone = tracker.clone();
        tracker.create("j1");
        clone.update("j1", 55);
        assert_eq!(tracker.progress("j1"), Some(55));
    }
}
