//! Bounded, cancellable waiting
//!
//! Settle delays and repeat-until-predicate loops both suspend the procedure;
//! both stop early when the engine's cancellation token fires.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a poll loop is paced and bounded
#[derive(Debug, Clone, Default)]
pub struct PollPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Stop after this many attempts
    pub max_attempts: Option<u32>,
    /// Stop once this much time has passed since the first attempt
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    /// Whether neither bound is set
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.deadline.is_none()
    }
}

/// Why a poll loop stopped without success
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("deadline of {deadline:?} passed after {attempts} attempts")]
    DeadlineExceeded { attempts: u32, deadline: Duration },
}

impl PollError {
    /// Attempts made before stopping
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            PollError::Cancelled { attempts }
            | PollError::Exhausted { attempts }
            | PollError::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }
}

/// Hands out attempt numbers, sleeping between them
///
/// ```ignore
/// let mut poller = Poller::new(&policy, &cancel);
/// loop {
///     poller.next_attempt().await?;
///     if check().await { break; }
/// }
/// ```
#[derive(Debug)]
pub struct Poller<'a> {
    policy: &'a PollPolicy,
    cancel: &'a CancellationToken,
    attempts: u32,
    started: Instant,
}

impl<'a> Poller<'a> {
    pub fn new(policy: &'a PollPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            policy,
            cancel,
            attempts: 0,
            started: Instant::now(),
        }
    }

    /// Attempts handed out so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait for the next attempt slot; the first one is immediate
    ///
    /// # Errors
    /// Returns `PollError` once cancelled or a bound is reached
    pub async fn next_attempt(&mut self) -> Result<u32, PollError> {
        if self.cancel.is_cancelled() {
            return Err(PollError::Cancelled {
                attempts: self.attempts,
            });
        }
        if let Some(max) = self.policy.max_attempts
            && self.attempts >= max
        {
            return Err(PollError::Exhausted {
                attempts: self.attempts,
            });
        }

        if self.attempts > 0 {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Err(PollError::Cancelled { attempts: self.attempts });
                }
                () = tokio::time::sleep(self.policy.interval) => {}
            }
        }

        if let Some(deadline) = self.policy.deadline
            && self.attempts > 0
            && self.started.elapsed() >= deadline
        {
            return Err(PollError::DeadlineExceeded {
                attempts: self.attempts,
                deadline,
            });
        }

        self.attempts += 1;
        debug!(attempt = self.attempts, "poll attempt");
        Ok(self.attempts)
    }
}

/// Sleep for a settle delay unless cancelled first
///
/// # Errors
/// Returns `PollError::Cancelled` if the token fires before the delay elapses
pub async fn settle(delay: Duration, cancel: &CancellationToken) -> Result<(), PollError> {
    if cancel.is_cancelled() {
        return Err(PollError::Cancelled { attempts: 0 });
    }
    if delay.is_zero() {
        return Ok(());
    }
    debug!(delay = ?delay, "settling");
    tokio::select! {
        () = cancel.cancelled() => Err(PollError::Cancelled { attempts: 0 }),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
