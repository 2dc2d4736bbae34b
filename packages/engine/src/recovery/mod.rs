//! Error handling and recovery
//!
//! Failures are classified into categories, each category has a primary and a
//! secondary recovery strategy, and each category has its own circuit breaker
//! over a rolling failure window.
//!
//! [`ErrorHandler::execute`] drives an operation through that machinery and
//! always terminates in exactly one [`Outcome`].

mod breaker;
mod classify;
mod resources;
mod strategy;

#[cfg(test)]
mod test;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RecoveryConfig;
use crate::error::EngineError;

pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerState};
pub use classify::{classify, classify_message, ErrorCategory, Severity};
pub use resources::{FixedProbe, ResourceLimits, ResourceProbe, ResourceSnapshot, SystemProbe};
pub use strategy::{plan_for, Backoff, FallbackAction, RecoveryStrategy, StrategyPlan};

/// What was being attempted when an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Breaker the failure is charged to. Defaults to the classified category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<ErrorCategory>,
    #[serde(default)]
    pub retry_count: u32,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category_hint = Some(category);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub error_id: Uuid,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub context: ErrorContext,
    pub retry_count: u32,
    pub recovery_strategy: RecoveryStrategy,
    pub resolved: bool,
    /// Epoch milliseconds.
    pub occurred_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Retried,
    RecoveredViaFallback,
    Skipped,
    Aborted,
    Escalated,
}

/// Terminal result of [`ErrorHandler::execute`].
#[derive(Debug)]
pub enum Execution<T> {
    /// The operation succeeded, on the first attempt or after retries.
    Retried { value: T, attempts: u32 },
    RecoveredViaFallback { value: T, record: ErrorRecord },
    Skipped { record: ErrorRecord, error: EngineError },
    /// Also returned when an open breaker rejects the call.
    Aborted { record: ErrorRecord, error: EngineError },
    /// Manual intervention terminates here too.
    Escalated { record: ErrorRecord, error: EngineError },
}

impl<T> Execution<T> {
    pub fn outcome(&self) -> Outcome {
        match self {
            Execution::Retried { .. } => Outcome::Retried,
            Execution::RecoveredViaFallback { .. } => Outcome::RecoveredViaFallback,
            Execution::Skipped { .. } => Outcome::Skipped,
            Execution::Aborted { .. } => Outcome::Aborted,
            Execution::Escalated { .. } => Outcome::Escalated,
        }
    }

    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Execution::Retried { .. } => None,
            Execution::RecoveredViaFallback { record, .. }
            | Execution::Skipped { record, .. }
            | Execution::Aborted { record, .. }
            | Execution::Escalated { record, .. } => Some(record),
        }
    }

    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            Execution::Retried { value, .. } | Execution::RecoveredViaFallback { value, .. } => {
                Ok(value)
            }
            Execution::Skipped { error, .. }
            | Execution::Aborted { error, .. }
            | Execution::Escalated { error, .. } => Err(error),
        }
    }
}

/// Window counts and breaker states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub unresolved: usize,
    pub breakers: Vec<CircuitBreakerState>,
}

#[derive(Default)]
struct HandlerState {
    window: VecDeque<(Instant, ErrorRecord)>,
    breakers: HashMap<ErrorCategory, CircuitBreaker>,
}

pub struct ErrorHandler {
    config: RecoveryConfig,
    backoff: Backoff,
    probe: Arc<dyn ResourceProbe>,
    state: Mutex<HandlerState>,
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ErrorHandler {
    pub fn new(config: RecoveryConfig) -> Self {
        Self::with_probe(config, Arc::new(SystemProbe))
    }

    pub fn with_probe(config: RecoveryConfig, probe: Arc<dyn ResourceProbe>) -> Self {
        Self {
            backoff: Backoff::new(config.base_delay_ms, config.max_delay_ms),
            config,
            probe,
            state: Mutex::new(HandlerState::default()),
        }
    }

    /// Classify an error, charge it to its breaker and record it in the
    /// window. Returns the record with the strategy that applies at
    /// `context.retry_count`.
    pub fn handle_error(&self, error: &EngineError, context: &ErrorContext) -> ErrorRecord {
        let category = classify(error);
        let strategy = self.select_strategy(category, context.retry_count);
        self.record(error, context, category, strategy, true)
    }

    /// Run `operation` under the retry, fallback and breaker machinery.
    /// The operation receives the 0-based attempt number.
    pub fn execute<T, F, G>(
        &self,
        category: ErrorCategory,
        context: ErrorContext,
        mut operation: F,
        fallback: Option<G>,
    ) -> Execution<T>
    where
        F: FnMut(u32) -> crate::error::Result<T>,
        G: FnOnce(&ErrorRecord) -> crate::error::Result<T>,
    {
        let context = context.with_category(category);
        if !self.acquire(category) {
            let error = EngineError::CircuitOpen { category };
            let record = self.record(&error, &context, category, RecoveryStrategy::Abort, false);
            return Execution::Aborted { record, error };
        }

        let mut fallback = fallback;
        let mut attempt = 0u32;
        loop {
            let error = match operation(attempt) {
                Ok(value) => {
                    self.record_success(category);
                    return Execution::Retried {
                        value,
                        attempts: attempt + 1,
                    };
                }
                Err(error) => error,
            };

            let attempt_context = ErrorContext {
                retry_count: attempt,
                ..context.clone()
            };
            let mut record = self.handle_error(&error, &attempt_context);
            let plan = plan_for(record.category);

            match record.recovery_strategy {
                RecoveryStrategy::Retry { .. } => {
                    if self.breaker_state(category) == BreakerState::Open {
                        return Execution::Aborted { record, error };
                    }
                    let delay = self.backoff.delay(attempt);
                    debug!(
                        category = %category,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying {}",
                        context.operation
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                RecoveryStrategy::Fallback { action } => match fallback.take() {
                    Some(run_fallback) => match run_fallback(&record) {
                        Ok(value) => {
                            debug!(category = %category, ?action, "recovered {} via fallback", context.operation);
                            record.resolved = true;
                            self.mark_resolved(record.error_id);
                            return Execution::RecoveredViaFallback { value, record };
                        }
                        Err(fallback_error) => {
                            let mut fallback_record =
                                self.handle_error(&fallback_error, &attempt_context);
                            fallback_record.recovery_strategy = plan.secondary;
                            return Self::terminal(plan.secondary, fallback_record, fallback_error);
                        }
                    },
                    None => {
                        record.recovery_strategy = plan.secondary;
                        return Self::terminal(plan.secondary, record, error);
                    }
                },
                strategy => return Self::terminal(strategy, record, error),
            }
        }
    }

    /// [`execute`](Self::execute) without a fallback action.
    pub fn run<T, F>(&self, category: ErrorCategory, context: ErrorContext, operation: F) -> Execution<T>
    where
        F: FnMut(u32) -> crate::error::Result<T>,
    {
        self.execute(
            category,
            context,
            operation,
            None::<fn(&ErrorRecord) -> crate::error::Result<T>>,
        )
    }

    pub fn breaker_state(&self, category: ErrorCategory) -> BreakerState {
        self.lock()
            .breakers
            .get(&category)
            .map(CircuitBreaker::state)
            .unwrap_or(BreakerState::Closed)
    }

    pub fn stats(&self) -> ErrorStats {
        let now = Instant::now();
        let mut state = self.lock();
        Self::prune(&mut state, now, &self.config);

        let mut by_category = BTreeMap::new();
        for (_, record) in &state.window {
            *by_category.entry(record.category).or_insert(0) += 1;
        }
        let mut breakers: Vec<_> = state
            .breakers
            .values()
            .map(|breaker| breaker.snapshot(now))
            .collect();
        breakers.sort_by_key(|b| b.category);

        ErrorStats {
            total: state.window.len(),
            unresolved: state.window.iter().filter(|(_, r)| !r.resolved).count(),
            by_category,
            breakers,
        }
    }

    fn select_strategy(&self, category: ErrorCategory, retry_count: u32) -> RecoveryStrategy {
        let plan = plan_for(category);
        match plan.primary {
            RecoveryStrategy::Retry { max_attempts } if retry_count < max_attempts => {
                let snapshot = self.probe.sample();
                if snapshot.is_healthy(&self.config.resource_limits) {
                    plan.primary
                } else {
                    warn!(category = %category, ?snapshot, "resource pressure, downgrading retry to fallback");
                    RecoveryStrategy::Fallback {
                        action: FallbackAction::for_category(category),
                    }
                }
            }
            RecoveryStrategy::Retry { .. } => plan.secondary,
            primary => primary,
        }
    }

    fn terminal<T>(strategy: RecoveryStrategy, record: ErrorRecord, error: EngineError) -> Execution<T> {
        match strategy {
            RecoveryStrategy::Skip => Execution::Skipped { record, error },
            RecoveryStrategy::Abort => Execution::Aborted { record, error },
            RecoveryStrategy::Escalate
            | RecoveryStrategy::ManualIntervention
            | RecoveryStrategy::Retry { .. }
            | RecoveryStrategy::Fallback { .. } => Execution::Escalated { record, error },
        }
    }

    fn record(
        &self,
        error: &EngineError,
        context: &ErrorContext,
        category: ErrorCategory,
        strategy: RecoveryStrategy,
        charge_breaker: bool,
    ) -> ErrorRecord {
        let record = ErrorRecord {
            error_id: Uuid::new_v4(),
            category,
            severity: category.severity(),
            message: error.to_string(),
            context: context.clone(),
            retry_count: context.retry_count,
            recovery_strategy: strategy,
            resolved: false,
            occurred_at: epoch_millis(),
        };
        warn!(
            category = %category,
            severity = %record.severity,
            strategy = %strategy,
            operation = %context.operation,
            "{}",
            record.message
        );

        let now = Instant::now();
        let key = context.category_hint.unwrap_or(category);
        let mut state = self.lock();
        if charge_breaker {
            self.breaker_mut(&mut state, key).record_failure(now);
        }
        state.window.push_back((now, record.clone()));
        Self::prune(&mut state, now, &self.config);
        record
    }

    fn acquire(&self, category: ErrorCategory) -> bool {
        let mut state = self.lock();
        self.breaker_mut(&mut state, category)
            .try_acquire(Instant::now())
    }

    fn record_success(&self, category: ErrorCategory) {
        let mut state = self.lock();
        self.breaker_mut(&mut state, category)
            .record_success(Instant::now());
    }

    fn mark_resolved(&self, error_id: Uuid) {
        let mut state = self.lock();
        if let Some((_, record)) = state.window.iter_mut().find(|(_, r)| r.error_id == error_id) {
            record.resolved = true;
        }
    }

    fn breaker_mut<'s>(
        &self,
        state: &'s mut HandlerState,
        category: ErrorCategory,
    ) -> &'s mut CircuitBreaker {
        state.breakers.entry(category).or_insert_with(|| {
            CircuitBreaker::new(
                category,
                self.config.failure_threshold,
                self.config.recovery_timeout(),
                self.config.monitoring_window(),
            )
        })
    }

    fn prune(state: &mut HandlerState, now: Instant, config: &RecoveryConfig) {
        let window = config.monitoring_window();
        while let Some((at, _)) = state.window.front() {
            if now.saturating_duration_since(*at) > window {
                state.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
