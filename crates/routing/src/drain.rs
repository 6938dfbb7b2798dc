//! Channel disposal
//!
//! Two forms: [`dispose_all`] disposes immediately, [`drain_and_dispose`]
//! first gives every flush-capable channel a bounded chance to transmit.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::Channel;

/// Outcome of a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Flushes that finished before the deadline
    pub flushed: usize,
    /// Channels disposed
    pub disposed: usize,
    /// Every flush finished in time
    pub completed: bool,
}

/// Dispose every channel immediately
pub fn dispose_all(channels: &[Arc<dyn Channel>]) -> usize {
    for channel in channels {
        channel.dispose();
    }
    channels.len()
}

/// Flush all flush-capable channels concurrently, then dispose everything
///
/// Non-flushable channels are disposed before waiting. Waiting stops when
/// every flush has finished, the deadline passes, or `cancel` fires. Stopping
/// early does not abort in-flight flushes: they keep running detached and
/// may race with disposal.
pub async fn drain_and_dispose(
    channels: Vec<Arc<dyn Channel>>,
    deadline: Duration,
    cancel: CancellationToken,
) -> DrainReport {
    let mut report = DrainReport::default();
    let (flushable, immediate): (Vec<_>, Vec<_>) =
        channels.into_iter().partition(|c| c.can_flush());

    report.disposed += dispose_all(&immediate);

    let mut flushes = JoinSet::new();
    for channel in &flushable {
        let channel = Arc::clone(channel);
        flushes.spawn(async move {
            channel.flush().await;
        });
    }

    let mut flushed = 0;
    let wait_all = async {
        while let Some(result) = flushes.join_next().await {
            match result {
                Ok(()) => flushed += 1,
                Err(e) => tracing::warn!(error = %e, "channel flush task failed"),
            }
        }
    };

    report.completed = tokio::select! {
        _ = wait_all => true,
        _ = tokio::time::sleep(deadline) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "channel drain deadline reached");
            false
        }
        _ = cancel.cancelled() => {
            tracing::debug!("channel drain cancelled");
            false
        }
    };
    report.flushed = flushed;

    if !report.completed {
        flushes.detach_all();
    }

    report.disposed += dispose_all(&flushable);
    report
}
