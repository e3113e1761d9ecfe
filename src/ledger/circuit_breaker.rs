//! Count-based circuit breaker guarding ledger calls
//!
//! ```text
//!            failure rate >= threshold
//!  CLOSED ───────────────────────────────▶ OPEN
//!    ▲                                      │ open duration elapsed
//!    │ trial failure rate < threshold       ▼
//!    └──────────────────────────────── HALF_OPEN
//!                                           │ trial failure rate >= threshold
//!                                           └──────▶ OPEN
//! ```
//!
//! While closed, the last `sliding_window_size` outcomes are kept; once at
//! least `minimum_number_of_calls` are recorded and the failure rate reaches
//! the threshold, the circuit opens. An open circuit rejects calls until
//! `open_duration` elapses, then admits `half_open_permitted_calls` trial calls
//! and decides on their combined outcome.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Circuit breaker tuning
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failure percentage (0-100] at which the circuit opens
    pub failure_rate_threshold: f64,
    /// Number of most recent outcomes considered while closed
    pub sliding_window_size: usize,
    /// Outcomes required before the failure rate is evaluated
    pub minimum_number_of_calls: usize,
    /// How long the circuit stays open before probing
    pub open_duration: Duration,
    /// Trial calls admitted while half-open
    pub half_open_permitted_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            open_duration: Duration::from_secs(30),
            half_open_permitted_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Build a config, replacing out-of-range values with defaults
    pub fn new(
        failure_rate_threshold: f64,
        sliding_window_size: usize,
        minimum_number_of_calls: usize,
        open_duration: Duration,
        half_open_permitted_calls: usize,
    ) -> Self {
        let default = Self::default();

        let failure_rate_threshold =
            if failure_rate_threshold > 0.0 && failure_rate_threshold <= 100.0 {
                failure_rate_threshold
            } else {
                warn!(
                    "Invalid failure_rate_threshold ({}), using default ({})",
                    failure_rate_threshold, default.failure_rate_threshold
                );
                default.failure_rate_threshold
            };

        let sliding_window_size = if sliding_window_size == 0 {
            warn!(
                "Invalid sliding_window_size (0), using default ({})",
                default.sliding_window_size
            );
            default.sliding_window_size
        } else {
            sliding_window_size
        };

        let minimum_number_of_calls = minimum_number_of_calls.clamp(1, sliding_window_size);

        let half_open_permitted_calls = if half_open_permitted_calls == 0 {
            warn!(
                "Invalid half_open_permitted_calls (0), using default ({})",
                default.half_open_permitted_calls
            );
            default.half_open_permitted_calls
        } else {
            half_open_permitted_calls
        };

        Self {
            failure_rate_threshold,
            sliding_window_size,
            minimum_number_of_calls,
            open_duration,
            half_open_permitted_calls,
        }
    }
}

#[derive(Debug)]
enum State {
    Closed {
        /// `true` marks a failure
        window: VecDeque<bool>,
    },
    Open {
        until: Instant,
    },
    HalfOpen {
        admitted: usize,
        successes: usize,
        failures: usize,
    },
}

/// Thread-safe circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let window = VecDeque::with_capacity(config.sliding_window_size);
        Self {
            name: name.into(),
            config,
            state: Mutex::new(State::Closed { window }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, moving an expired OPEN circuit to HALF_OPEN first
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.expire_open(&mut state);
        match *state {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Ask permission to make a call
    ///
    /// Returns `None` when the call must short-circuit to the fallback. The
    /// permit settles the call: dropping it without recording an outcome, as
    /// happens when the caller's future is cancelled, counts as a failure.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut state = self.lock();
        self.expire_open(&mut state);
        let admitted = match &mut *state {
            State::Closed { .. } => true,
            State::Open { .. } => false,
            State::HalfOpen { admitted, .. } => {
                if *admitted < self.config.half_open_permitted_calls {
                    *admitted += 1;
                    true
                } else {
                    false
                }
            }
        };

        admitted.then(|| CallPermit {
            breaker: self,
            settled: false,
        })
    }

    pub fn record_success(&self) {
        self.record(false);
    }

    pub fn record_failure(&self) {
        self.record(true);
    }

    fn record(&self, failed: bool) {
        let mut state = self.lock();
        let next = match &mut *state {
            State::Closed { window } => {
                if window.len() == self.config.sliding_window_size {
                    window.pop_front();
                }
                window.push_back(failed);

                let failures = window.iter().filter(|f| **f).count();
                if window.len() >= self.config.minimum_number_of_calls
                    && self.exceeds_threshold(failures, window.len())
                {
                    warn!(
                        circuit = %self.name,
                        failures,
                        calls = window.len(),
                        "Circuit breaker transition CLOSED -> OPEN"
                    );
                    Some(self.open())
                } else {
                    None
                }
            }
            // Late completion of a call admitted before the circuit opened
            State::Open { .. } => None,
            State::HalfOpen {
                successes,
                failures,
                ..
            } => {
                if failed {
                    *failures += 1;
                } else {
                    *successes += 1;
                }

                let completed = *successes + *failures;
                if completed < self.config.half_open_permitted_calls {
                    None
                } else if self.exceeds_threshold(*failures, completed) {
                    warn!(
                        circuit = %self.name,
                        failures = *failures,
                        "Circuit breaker transition HALF_OPEN -> OPEN"
                    );
                    Some(self.open())
                } else {
                    info!(circuit = %self.name, "Circuit breaker transition HALF_OPEN -> CLOSED");
                    Some(State::Closed {
                        window: VecDeque::with_capacity(self.config.sliding_window_size),
                    })
                }
            }
        };

        if let Some(next) = next {
            *state = next;
        }
    }

    fn open(&self) -> State {
        State::Open {
            until: Instant::now() + self.config.open_duration,
        }
    }

    fn expire_open(&self, state: &mut State) {
        if let State::Open { until } = state {
            if Instant::now() >= *until {
                info!(circuit = %self.name, "Circuit breaker transition OPEN -> HALF_OPEN");
                *state = State::HalfOpen {
                    admitted: 0,
                    successes: 0,
                    failures: 0,
                };
            }
        }
    }

    fn exceeds_threshold(&self, failures: usize, calls: usize) -> bool {
        calls > 0 && (failures as f64 * 100.0 / calls as f64) >= self.config.failure_rate_threshold
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to make one guarded call
///
/// Consumed by `record_success` or `record_failure`. A permit dropped
/// unsettled records a failure so half-open trials always complete.
#[derive(Debug)]
#[must_use = "an unsettled permit records a failure when dropped"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(circuit = %self.breaker.name, "Guarded call abandoned before completion");
            self.breaker.record_failure();
        }
    }
}
