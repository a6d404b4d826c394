//! Waiting on the previous frame's GPU fence.
//!
//! Instance and indirect buffers are rewritten every frame, so the fills
//! must not start while the GPU may still read last frame's contents. The
//! wait is bounded: a fence that never signals, or a poll that fails, is
//! treated as signaled and the frame goes ahead.

use std::time::Duration;

/// Result of a single fence poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    Pending,
    Failed,
}

/// How a wait ended. Every outcome lets the frame proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceOutcome {
    /// Signaled before the first timed poll.
    AlreadySignaled,
    Signaled { polls: u32 },
    TimedOut { polls: u32 },
    Failed { polls: u32 },
}

impl FenceOutcome {
    /// The CPU had to wait on the GPU.
    pub fn stalled(&self) -> bool {
        !matches!(self, FenceOutcome::AlreadySignaled)
    }

    /// The fence was not observed and only assumed signaled.
    pub fn assumed(&self) -> bool {
        matches!(self, FenceOutcome::TimedOut { .. } | FenceOutcome::Failed { .. })
    }
}

/// Bounded poll-with-yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceWaitPolicy {
    poll_interval: Duration,
    max_wait: Duration,
}

impl FenceWaitPolicy {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Timed polls before giving up.
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_micros().max(1);
        let polls = (self.max_wait.as_micros() / interval).max(1);
        u32::try_from(polls).unwrap_or(u32::MAX)
    }

    /// Poll until the fence signals or the budget runs out.
    ///
    /// `poll` receives the timeout it may block for. The first call always
    /// gets a zero timeout.
    pub fn wait(&self, mut poll: impl FnMut(Duration) -> FenceStatus) -> FenceOutcome {
        match poll(Duration::ZERO) {
            FenceStatus::Signaled => return FenceOutcome::AlreadySignaled,
            FenceStatus::Failed => {
                tracing::warn!("fence wait failed, assuming signaled");
                return FenceOutcome::Failed { polls: 0 };
            }
            FenceStatus::Pending => {}
        }

        let max_polls = self.max_polls();
        for polls in 1..=max_polls {
            match poll(self.poll_interval) {
                FenceStatus::Signaled => return FenceOutcome::Signaled { polls },
                FenceStatus::Failed => {
                    tracing::warn!(polls, "fence wait failed, assuming signaled");
                    return FenceOutcome::Failed { polls };
                }
                FenceStatus::Pending => std::thread::yield_now(),
            }
        }

        tracing::warn!(
            polls = max_polls,
            max_wait_ms = self.max_wait.as_millis() as u64,
            "fence wait timed out, assuming signaled"
        );
        FenceOutcome::TimedOut { polls: max_polls }
    }
}

impl Default for FenceWaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1), Duration::from_millis(100))
    }
}
