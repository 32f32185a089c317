//! Restart policy and exit classification.

use std::process::ExitStatus;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay before the first automatic restart.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for exponential backoff when none is configured.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Exit code ffmpeg returns after handling SIGINT or SIGTERM.
pub const TERMINATED_EXIT_CODE: i32 = 255;

/// How the delay between automatic restarts evolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every restart.
    #[default]
    Fixed,
    /// Delay doubles after each consecutive restart, up to a maximum.
    Exponential,
}

/// Policy for restarting a transcoder that exited cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Base delay before a restart.
    pub delay: Duration,
    /// Growth of the delay between consecutive restarts.
    pub backoff: BackoffStrategy,
    /// Cap for exponential backoff.
    pub max_delay: Duration,
    /// Maximum consecutive automatic restarts; `None` retries forever.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RESTART_DELAY,
            backoff: BackoffStrategy::Fixed,
            max_delay: DEFAULT_BACKOFF_MAX,
            max_restarts: None,
        }
    }
}

impl RestartPolicy {
    /// Fixed-delay policy that never gives up.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Limit the number of consecutive automatic restarts.
    #[must_use]
    pub fn with_max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = Some(max);
        self
    }

    /// Switch to exponential backoff capped at `max_delay`.
    #[must_use]
    pub fn with_exponential_backoff(mut self, max_delay: Duration) -> Self {
        self.backoff = BackoffStrategy::Exponential;
        self.max_delay = max_delay;
        self
    }

    /// Delay before restart number `attempt` (1-based), or `None` when the limit is reached.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_restarts {
            if attempt > max {
                return None;
            }
        }

        let delay = match self.backoff {
            BackoffStrategy::Fixed => self.delay,
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(31);
                self.delay
                    .saturating_mul(1_u32 << exponent)
                    .min(self.max_delay.max(self.delay))
            }
        };
        Some(delay)
    }
}

/// What a transcoder exit means for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// Clean exit of a stream that should be continuous; restart it.
    Restart,
    /// Killed on purpose; stop without error.
    Terminated,
    /// Exited with an unexpected code; surface as an error.
    Abnormal(i32),
    /// Killed by a signal nobody asked for (a crash); surface as an error.
    Crashed(i32),
}

impl ExitClassification {
    /// Classify an exit code.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Restart,
            TERMINATED_EXIT_CODE => Self::Terminated,
            code => Self::Abnormal(code),
        }
    }

    /// Classify death by signal: only SIGTERM, SIGINT and SIGKILL count as intentional.
    #[cfg(unix)]
    #[must_use]
    pub fn from_signal(signal: i32) -> Self {
        use nix::sys::signal::Signal;

        match Signal::try_from(signal) {
            Ok(Signal::SIGTERM | Signal::SIGINT | Signal::SIGKILL) => Self::Terminated,
            _ => Self::Crashed(signal),
        }
    }

    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::from_code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = status.signal() {
                return Self::from_signal(signal);
            }
        }

        Self::Terminated
    }
}
