use std::time::Duration;

/// One probe of a resource's current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed<P> {
    /// Whatever the refresh function fetched (instance JSON, job JSON, ...).
    pub payload: P,
    /// State string compared against the wait sets.
    pub state: String,
}

impl<P> Refreshed<P> {
    pub fn new(payload: P, state: impl Into<String>) -> Self {
        Self {
            payload,
            state: state.into(),
        }
    }
}

/// Budget and cadence of a wait, without the state sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub timeout: Duration,
    pub delay: Duration,
    pub poll_interval: Duration,
}

/// Parameters of one poll loop.
///
/// Timings are always explicit: each RDS endpoint settles at its own pace, so
/// there is no shared default delay or interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    /// States that end the wait successfully.
    pub target: Vec<String>,
    /// States that are expected while waiting. When non-empty, any state
    /// outside `pending` and `target` aborts the wait.
    pub pending: Vec<String>,
    /// States that abort the wait as a terminal failure.
    pub failure: Vec<String>,
    /// Overall budget for the call that owns this wait.
    pub timeout: Duration,
    /// Grace period before the first probe.
    pub delay: Duration,
    /// Spacing between probes. Zero means exponential polling (100ms up to 10s).
    pub poll_interval: Duration,
}

impl WaitSpec {
    pub fn new<I, S>(target: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into_iter().map(Into::into).collect(),
            pending: Vec::new(),
            failure: Vec::new(),
            timeout,
            delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }

    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timing(mut self, timing: PollTiming) -> Self {
        self.timeout = timing.timeout;
        self.delay = timing.delay;
        self.poll_interval = timing.poll_interval;
        self
    }

    pub fn is_target(&self, state: &str) -> bool {
        self.target.iter().any(|s| s == state)
    }

    pub fn is_failure(&self, state: &str) -> bool {
        self.failure.iter().any(|s| s == state)
    }

    /// True when the state may legitimately appear while waiting.
    pub fn allows(&self, state: &str) -> bool {
        self.pending.is_empty() || self.pending.iter().any(|s| s == state)
    }
}
