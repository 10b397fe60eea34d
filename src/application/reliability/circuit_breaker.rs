use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{info, warn};

use super::clock::Clock;
use crate::domain::value_objects::ingestion_errors::IngestionError;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerMode {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker open for {dependency}")]
pub struct BreakerOpenError {
    pub dependency: String,
}

impl From<BreakerOpenError> for IngestionError {
    fn from(err: BreakerOpenError) -> Self {
        IngestionError::BreakerOpen {
            dependency: err.dependency,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CircuitBreakerState {
    mode: BreakerMode,
    consecutive_failures: u32,
    last_transition: Instant,
    probe_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    pub mode: BreakerMode,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Pass,
    Probe,
    Reject,
}

/// Protects one remote dependency. Share a single instance (behind an `Arc`)
/// between every caller of that dependency.
///
/// State is only touched under the mutex and the lock is never held across an
/// await, so concurrent callers always observe a consistent mode. In half-open
/// exactly one probe is admitted; everyone else is rejected as if open.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            name: name.into(),
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                cooldown: config.cooldown,
            },
            clock,
            state: Mutex::new(CircuitBreakerState {
                mode: BreakerMode::Closed,
                consecutive_failures: 0,
                last_transition: now,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.lock_state();
        CircuitBreakerSnapshot {
            mode: state.mode,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Runs `operation` unless the breaker is open. Any failure, including a
    /// fast rejection, is passed to `on_failure` before being returned.
    pub async fn call<T, E, F, Fut, C>(&self, operation: F, on_failure: C) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BreakerOpenError>,
        C: FnOnce(&E),
    {
        let admission = self.admit();
        if admission == Admission::Reject {
            let err = E::from(BreakerOpenError {
                dependency: self.name.clone(),
            });
            on_failure(&err);
            return Err(err);
        }

        let mut probe = (admission == Admission::Probe).then(|| ProbeGuard {
            breaker: self,
            settled: false,
        });

        let result = operation().await;

        match &result {
            Ok(_) => self.record_success(admission),
            Err(_) => self.record_failure(admission),
        }
        if let Some(guard) = probe.as_mut() {
            guard.settled = true;
        }

        if let Err(err) = &result {
            on_failure(err);
        }
        result
    }

    fn admit(&self) -> Admission {
        let now = self.clock.now();
        let mut state = self.lock_state();

        match state.mode {
            BreakerMode::Closed => Admission::Pass,
            BreakerMode::Open => {
                let elapsed = now.saturating_duration_since(state.last_transition);
                if elapsed < self.config.cooldown {
                    return Admission::Reject;
                }
                state.mode = BreakerMode::HalfOpen;
                state.last_transition = now;
                state.probe_in_flight = true;
                info!(
                    breaker = %self.name,
                    cooldown_ms = self.config.cooldown.as_millis() as u64,
                    "circuit_breaker: cooldown elapsed; admitting probe"
                );
                Admission::Probe
            }
            BreakerMode::HalfOpen if state.probe_in_flight => Admission::Reject,
            BreakerMode::HalfOpen => {
                state.probe_in_flight = true;
                Admission::Probe
            }
        }
    }

    fn record_success(&self, admission: Admission) {
        let now = self.clock.now();
        let mut state = self.lock_state();

        match admission {
            Admission::Probe => {
                state.mode = BreakerMode::Closed;
                state.consecutive_failures = 0;
                state.last_transition = now;
                state.probe_in_flight = false;
                info!(breaker = %self.name, "circuit_breaker: probe succeeded; closed");
            }
            Admission::Pass if state.mode == BreakerMode::Closed => {
                state.consecutive_failures = 0;
            }
            // Late result of a call admitted before the breaker tripped.
            Admission::Pass | Admission::Reject => {}
        }
    }

    fn record_failure(&self, admission: Admission) {
        let now = self.clock.now();
        let mut state = self.lock_state();

        match admission {
            Admission::Probe => {
                state.mode = BreakerMode::Open;
                state.last_transition = now;
                state.probe_in_flight = false;
                warn!(
                    breaker = %self.name,
                    cooldown_ms = self.config.cooldown.as_millis() as u64,
                    "circuit_breaker: probe failed; reopened"
                );
            }
            Admission::Pass if state.mode == BreakerMode::Closed => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.mode = BreakerMode::Open;
                    state.last_transition = now;
                    warn!(
                        breaker = %self.name,
                        consecutive_failures = state.consecutive_failures,
                        cooldown_ms = self.config.cooldown.as_millis() as u64,
                        "circuit_breaker: failure threshold reached; opened"
                    );
                }
            }
            Admission::Pass | Admission::Reject => {}
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reopens the breaker if a probe is dropped before it settles, so a
/// cancelled probe cannot leave the breaker stuck in half-open.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_failure(Admission::Probe);
        }
    }
}
