/// Trait for handling progress events during a matching run
pub trait ProgressHandler: Send + Sync {
    /// Called when a pipeline stage starts
    fn on_start_stage(&self, stage: &str);

    /// Called when a pipeline stage finishes
    fn on_finish_stage(&self, stage: &str);

    /// Set total number of trip groups to match
    fn set_total_groups(&self, count: usize);

    /// Increment matching progress by one trip group
    fn increment_group_progress(&self);
}

/// A no-op progress handler
pub struct NoOpProgressHandler;

impl ProgressHandler for NoOpProgressHandler {
    fn on_start_stage(&self, _stage: &str) {}
    fn on_finish_stage(&self, _stage: &str) {}
    fn set_total_groups(&self, _count: usize) {}
    fn increment_group_progress(&self) {}
}
