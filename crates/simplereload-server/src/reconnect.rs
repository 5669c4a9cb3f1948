//! Client reconnect protocol.
//!
//! The browser script and the `watch` command follow the same state machine:
//!
//! ```text
//!              open                 error
//! Connecting ───────► Open ─────────────────► Backoff
//!     ▲  │                                      │
//!     │  └──────────────── error ──────────────►│
//!     └──────────────── retry (after delay) ────┘
//! ```
//!
//! A lost connection is the only observable sign that the backend restarted,
//! so an error arms a one-shot reload flag and the next successful open
//! consumes it. Retry delays start at the policy floor and double up to the
//! ceiling; every successful open resets them.

use std::time::Duration;

/// Retry delay bounds for reconnect attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first reconnect attempt after a failure.
    pub floor: Duration,
    /// Largest delay between attempts.
    pub ceiling: Duration,
}

impl RetryPolicy {
    /// Create a policy. A ceiling below the floor is raised to the floor.
    #[must_use]
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_millis(1000))
    }
}

/// Connection phase of a reconnecting client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// A connection attempt is in flight.
    Connecting,
    /// The heartbeat stream is open.
    Open,
    /// Waiting for the retry delay to elapse.
    Backoff,
}

/// What a client should do after a successful open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// First connection, or the page is already current.
    Fresh,
    /// The connection came back after a failure: reload.
    Reload,
}

/// Retry state of one client.
#[derive(Clone, Debug)]
pub struct ReconnectState {
    policy: RetryPolicy,
    interval: Duration,
    reload_pending: bool,
    phase: Phase,
}

impl ReconnectState {
    /// Start in [`Phase::Connecting`] with the interval at the floor.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            interval: policy.floor,
            reload_pending: false,
            phase: Phase::Connecting,
        }
    }

    /// The stream opened. Resets the interval and consumes the reload flag.
    pub fn on_open(&mut self) -> OpenOutcome {
        self.phase = Phase::Open;
        self.interval = self.policy.floor;

        if std::mem::take(&mut self.reload_pending) {
            OpenOutcome::Reload
        } else {
            OpenOutcome::Fresh
        }
    }

    /// The stream failed or could not be opened.
    ///
    /// Arms the reload flag and returns the delay to wait before the next
    /// attempt. The following delay doubles, capped at the ceiling.
    pub fn on_error(&mut self) -> Duration {
        self.phase = Phase::Backoff;
        self.reload_pending = true;

        let delay = self.interval;
        self.interval = self.interval.saturating_mul(2).min(self.policy.ceiling);
        delay
    }

    /// The retry delay elapsed and a new attempt starts.
    pub fn on_retry(&mut self) {
        self.phase = Phase::Connecting;
    }

    /// Delay the next failure will wait.
    #[must_use]
    pub fn current_interval(&self) -> Duration {
        self.interval
    }

    /// Whether the next successful open triggers a reload.
    #[must_use]
    pub fn reload_pending(&self) -> bool {
        self.reload_pending
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
}
