//! Timed waits used for pacing requests against the remote service.
//!
//! The scheduler and the batch runner never call `tokio::time::sleep`
//! directly; they go through [`Delay`] so tests can substitute a recorder
//! that returns immediately.

use std::time::Duration;

/// A capability to wait for a fixed duration.
pub trait Delay {
    async fn wait(&self, duration: Duration);
}

/// Real wall-clock waits backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
