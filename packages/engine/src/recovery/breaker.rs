//! Per-category circuit breaker.
//!
//! A pure state machine: callers pass the current instant, so the transitions
//! can be driven deterministically.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::classify::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    category: ErrorCategory,
    state: BreakerState,
    opened_at: Option<Instant>,
    failures: VecDeque<Instant>,
    threshold: usize,
    recovery_timeout: Duration,
    window: Duration,
    trial_in_flight: bool,
}

/// Serializable view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub category: ErrorCategory,
    pub state: BreakerState,
    /// Milliseconds since the breaker last opened.
    pub opened_ms_ago: Option<u64>,
    pub failure_count: usize,
}

impl CircuitBreaker {
    pub fn new(
        category: ErrorCategory,
        threshold: usize,
        recovery_timeout: Duration,
        window: Duration,
    ) -> Self {
        Self {
            category,
            state: BreakerState::Closed,
            opened_at: None,
            failures: VecDeque::new(),
            threshold: threshold.max(1),
            recovery_timeout,
            window,
            trial_in_flight: false,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether a call may run now. In half-open state exactly one trial is
    /// admitted until its outcome is recorded.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let cooled = self
                    .opened_at
                    .map(|at| now.saturating_duration_since(at) >= self.recovery_timeout)
                    .unwrap_or(true);
                if cooled {
                    self.state = BreakerState::HalfOpen;
                    self.trial_in_flight = true;
                }
                cooled
            }
            BreakerState::HalfOpen => {
                if self.trial_in_flight {
                    false
                } else {
                    self.trial_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.prune(now);
        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Closed;
            self.opened_at = None;
            self.failures.clear();
        }
        self.trial_in_flight = false;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failures.push_back(now);
        self.prune(now);
        match self.state {
            BreakerState::HalfOpen => self.open(now),
            BreakerState::Closed if self.failures.len() >= self.threshold => self.open(now),
            _ => {}
        }
    }

    pub fn snapshot(&self, now: Instant) -> CircuitBreakerState {
        CircuitBreakerState {
            category: self.category,
            state: self.state,
            opened_ms_ago: self
                .opened_at
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            failure_count: self.failures.len(),
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }

    fn prune(&mut self, now: Instant) {
        while let Some(first) = self.failures.front() {
            if now.saturating_duration_since(*first) > self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}
