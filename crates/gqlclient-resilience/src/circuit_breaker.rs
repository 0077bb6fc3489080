//! Circuit breaker with class-specific delay shapes.
//!
//! The breaker stops calling a failing dependency for a cooldown period.
//! Progressive policies escalate that cooldown geometrically with each
//! open/half-open cycle until the service recovers.

use gqlclient_core::GraphqlClientError;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without dialing.
    Open,
    /// Trial requests allowed, testing if the service recovered.
    HalfOpen,
}

/// Shape of the open-state cooldown delay.
#[derive(Debug, Clone, Copy)]
pub enum DelayPolicy {
    /// The same delay for every open period.
    Constant(Duration),
    /// `initial × multiplier^(attempt − 1)`, capped at `max`. The attempt
    /// counter increments on each transition to half-open and resets to 1
    /// when the breaker closes.
    Progressive {
        /// Delay for the first open period.
        initial: Duration,
        /// Geometric growth factor.
        multiplier: f64,
        /// Upper bound on the computed delay.
        max: Duration,
    },
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive handled failures required to open the circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes required to close it.
    pub success_threshold: u32,
    /// Cooldown delay shape.
    pub delay: DelayPolicy,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            delay: DelayPolicy::Constant(Duration::from_secs(30)),
        }
    }
}

/// All mutable breaker state, guarded by one mutex. The progressive attempt
/// counter is read-modify-write and must not race across callers.
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_in_flight: u32,
    attempt: u32,
    opened_at: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            half_open_in_flight: 0,
            attempt: 1,
            opened_at: None,
        }
    }
}

/// A circuit breaker owned by one resilience policy.
pub struct CircuitBreaker {
    policy_name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new breaker for the named policy.
    pub fn new(policy_name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            policy_name: policy_name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Name of the owning policy.
    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Check whether a call may proceed.
    ///
    /// An open breaker whose cooldown has elapsed transitions to half-open
    /// and lets the call through as a trial. Half-open admits at most
    /// `success_threshold` in-flight trial calls; further callers are
    /// rejected until a trial records its outcome.
    ///
    /// # Errors
    /// Returns `GraphqlClientError::CircuitOpen` while the cooldown is
    /// running or while the trial slots are taken.
    pub fn check(&self) -> Result<(), GraphqlClientError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.success_threshold {
                    inner.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(GraphqlClientError::circuit_open(&self.policy_name))
                }
            }
            CircuitState::Open => {
                let delay = self.open_delay_for(&inner);
                let elapsed = inner.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed >= delay {
                    self.transition_to_half_open(&mut inner);
                    inner.half_open_in_flight = 1;
                    Ok(())
                } else {
                    Err(GraphqlClientError::circuit_open(&self.policy_name))
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                debug!(
                    policy = %self.policy_name,
                    successes = inner.half_open_successes,
                    threshold = self.config.success_threshold,
                    "Circuit breaker half-open success"
                );
                if inner.half_open_successes >= self.config.success_threshold {
                    self.transition_to_closed(&mut inner);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a handled failure.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    debug!(
                        policy = %self.policy_name,
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker failure threshold reached"
                    );
                    self.transition_to_open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                debug!(
                    policy = %self.policy_name,
                    "Circuit breaker half-open failure, reopening"
                );
                self.transition_to_open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    /// Cooldown delay for the current open period, if the breaker is open.
    pub fn current_open_delay(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Open => Some(self.open_delay_for(&inner)),
            _ => None,
        }
    }

    /// Current statistics.
    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        BreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_successes: inner.half_open_successes,
            attempt: inner.attempt,
        }
    }

    /// Reset the breaker to closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition_to_closed(&mut inner);
    }

    /// Force the circuit open (manual intervention or tests).
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        self.transition_to_open(&mut inner);
    }

    /// Force the circuit half-open (manual intervention or tests).
    pub fn force_half_open(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            self.transition_to_half_open(&mut inner);
        }
    }

    /// Give back a trial slot admitted by `check()` when the call's outcome
    /// was recorded elsewhere (or not at all).
    pub(crate) fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn open_delay_for(&self, inner: &BreakerInner) -> Duration {
        match self.config.delay {
            DelayPolicy::Constant(delay) => delay,
            DelayPolicy::Progressive {
                initial,
                multiplier,
                max,
            } => {
                let exponent = inner.attempt.saturating_sub(1);
                let millis =
                    initial.as_millis() as f64 * multiplier.powi(exponent as i32);
                let capped = millis.min(max.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }

    fn transition_to_open(&self, inner: &mut BreakerInner) {
        let was_open = inner.state == CircuitState::Open;
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_successes = 0;
        inner.half_open_in_flight = 0;
        if !was_open {
            warn!(
                policy = %self.policy_name,
                delay_ms = self.open_delay_for(inner).as_millis() as u64,
                "Circuit breaker opened"
            );
        }
    }

    fn transition_to_half_open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::HalfOpen;
        inner.half_open_successes = 0;
        inner.half_open_in_flight = 0;
        inner.attempt += 1;
        info!(policy = %self.policy_name, "Circuit breaker half-open, testing");
    }

    fn transition_to_closed(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.half_open_in_flight = 0;
        inner.attempt = 1;
        inner.opened_at = None;
        info!(policy = %self.policy_name, "Circuit breaker closed");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("policy_name", &self.policy_name)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Circuit breaker statistics.
#[derive(Debug, Clone, Copy)]
pub struct BreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive handled failures in the closed state.
    pub consecutive_failures: u32,
    /// Consecutive successes in the half-open state.
    pub half_open_successes: u32,
    /// Attempt counter feeding the progressive delay.
    pub attempt: u32,
}
