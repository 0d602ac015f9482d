//! Circuit breaker pattern for model dispatch
//!
//! One breaker per model id gates every dispatch to that model so a failing
//! backend is skipped without network I/O until it has had time to recover.
//!
//! # States
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Model is failing, requests are refused without calling it
//! - **Half-Open**: Cooldown elapsed, exactly one trial request is admitted
//!
//! The Open → Half-Open transition is evaluated lazily inside
//! [`CircuitBreaker::allow_request`]; outcomes are recorded strictly after
//! the call completes, once per logical request.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit (default: 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time since the last failure before a trial is admitted (default: 60000ms)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown_ms() -> u64 {
    60_000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a custom configuration
    #[must_use]
    pub const fn custom(failure_threshold: u32, cooldown_ms: u64) -> Self {
        Self {
            failure_threshold,
            cooldown_ms,
        }
    }

    /// Creates a configuration for a sensitive backend (lower thresholds)
    #[must_use]
    pub const fn sensitive() -> Self {
        Self::custom(3, 10_000)
    }

    const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Model is failing, requests fail fast
    Open,
    /// Testing if the model has recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of a breaker, for inspection and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures recorded while closed
    pub consecutive_failures: u32,
    /// Milliseconds since the last recorded failure
    pub since_last_failure_ms: Option<u64>,
    /// Whether a half-open trial is in flight
    pub trial_in_flight: bool,
}

/// Internal state tracking
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            trial_in_flight: false,
        }
    }
}

/// Failure-tracking gate for one model
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with default configuration
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Creates a new circuit breaker with custom configuration
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::closed()),
        }
    }

    /// Returns the name (model id) of this circuit breaker
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the stored state without evaluating the cooldown
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Returns true if the circuit is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Snapshot of the current counters
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.state.lock();
        CircuitBreakerSnapshot {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            since_last_failure_ms: state
                .last_failure
                .map(|at| at.elapsed().as_millis() as u64),
            trial_in_flight: state.trial_in_flight,
        }
    }

    /// Gate consulted before every dispatch
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    /// [`allow_request`](Self::allow_request) evaluated at a given instant
    pub fn allow_request_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = state
                    .last_failure
                    .is_none_or(|at| now.saturating_duration_since(at) >= self.config.cooldown());
                if cooled_down {
                    info!(
                        model = %self.name,
                        "Circuit transitioning from Open to HalfOpen"
                    );
                    state.state = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    true
                } else {
                    debug!(model = %self.name, "Circuit open, refusing request");
                    false
                }
            },
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    debug!(model = %self.name, "Half-open trial already in flight");
                    false
                } else {
                    state.trial_in_flight = true;
                    true
                }
            },
        }
    }

    /// Records a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            },
            CircuitState::HalfOpen => {
                info!(
                    model = %self.name,
                    "Circuit transitioning from HalfOpen to Closed"
                );
                *state = BreakerState::closed();
            },
            CircuitState::Open => {
                debug!(
                    model = %self.name,
                    "Ignoring success recorded while circuit is open"
                );
            },
        }
    }

    /// Records a failed call
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// [`record_failure`](Self::record_failure) at a given instant
    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.state.lock();
        state.last_failure = Some(now);

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= self.config.failure_threshold.max(1) {
                    warn!(
                        model = %self.name,
                        failures = state.consecutive_failures,
                        "Circuit transitioning from Closed to Open"
                    );
                    state.state = CircuitState::Open;
                }
            },
            CircuitState::HalfOpen => {
                warn!(
                    model = %self.name,
                    "Circuit transitioning from HalfOpen to Open after failed trial"
                );
                state.state = CircuitState::Open;
                state.trial_in_flight = false;
            },
            CircuitState::Open => {},
        }
    }

    /// Give back a half-open trial permit without recording an outcome
    ///
    /// Used when the admitted call failed locally (configuration, capability)
    /// and never reached the backend.
    pub fn release_trial(&self) {
        let mut state = self.state.lock();
        if state.state == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }
}

/// Breakers keyed by model id, created lazily
///
/// The map lock is held only for lookup and insertion; each breaker carries
/// its own lock, so models never contend with each other. A registry can be
/// shared between coordinators behind an `Arc`.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("breakers", &self.breakers.read().len())
            .finish()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerRegistry {
    /// Create an empty registry; breakers inherit `config`
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration applied to new breakers
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Breaker for `model_id`, created on first use
    pub fn breaker(&self, model_id: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(model_id) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(model_id.to_string()).or_insert_with(|| {
            debug!(model = %model_id, "Creating circuit breaker");
            Arc::new(CircuitBreaker::with_config(model_id, self.config))
        }))
    }

    /// Breaker for `model_id` if one exists
    pub fn get(&self, model_id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(model_id).cloned()
    }

    /// Snapshot of every breaker, sorted by model id
    pub fn snapshots(&self) -> Vec<(String, CircuitBreakerSnapshot)> {
        let mut snapshots: Vec<_> = self
            .breakers
            .read()
            .iter()
            .map(|(id, breaker)| (id.clone(), breaker.snapshot()))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }

    /// Number of breakers created so far
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Whether no breaker has been created yet
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}
