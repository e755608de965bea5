use async_trait::async_trait;

/// Receives progress updates for the job currently being processed.
///
/// Values are percentages. Implementations clamp to `0..=100` and ignore values lower
/// than the last one reported, so callers may report freely.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, percent: u8);
}

/// Reporter that discards updates.
pub struct NoopProgress;

#[async_trait]
impl ProgressReporter for NoopProgress {
    async fn report(&self, _percent: u8) {}
}
