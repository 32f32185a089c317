//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::supervisor::{
    BackoffStrategy, RestartPolicy, SupervisorOptions, DEFAULT_BACKOFF_MAX,
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_RESTART_DELAY, DEFAULT_TERMINATE_TIMEOUT,
};
use crate::transcoder::{
    TranscoderOptions, DEFAULT_FPS, DEFAULT_OUTPUT_FORMAT, DEFAULT_TRANSCODER_CMD,
};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How to invoke the transcoder.
    pub transcoder: TranscoderConfig,
    /// How to supervise it.
    pub supervisor: SupervisorConfig,
}

/// Configuration for the transcoder command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Executable name or path.
    #[serde(default = "default_cmd")]
    pub cmd: String,
    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Output resolution, e.g. `640x480`.
    #[serde(default)]
    pub resolution: Option<String>,
    /// JPEG quality (2 best, 31 worst).
    #[serde(default)]
    pub quality: Option<u8>,
    /// Extra arguments placed before the generated ones.
    #[serde(default)]
    pub args: Vec<String>,
    /// Silence ffmpeg entirely instead of reporting errors only.
    #[serde(default = "default_quiet")]
    pub quiet: bool,
    /// ffmpeg output muxer.
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_cmd() -> String {
    DEFAULT_TRANSCODER_CMD.to_string()
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_quiet() -> bool {
    true
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            cmd: default_cmd(),
            fps: default_fps(),
            resolution: None,
            quality: None,
            args: Vec::new(),
            quiet: default_quiet(),
            output_format: default_output_format(),
        }
    }
}

impl TranscoderConfig {
    /// Build transcoder options for the given input locator.
    #[must_use]
    pub fn to_options(&self, input: impl Into<String>) -> TranscoderOptions {
        let mut options = TranscoderOptions::new(input)
            .cmd(self.cmd.clone())
            .fps(self.fps)
            .extra_args(self.args.iter().cloned())
            .quiet(self.quiet)
            .output_format(self.output_format.clone());

        if let Some(resolution) = &self.resolution {
            options = options.resolution(resolution.clone());
        }
        if let Some(quality) = self.quality {
            options = options.quality(quality);
        }
        options
    }
}

/// Configuration for the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Delay before restarting a cleanly exited transcoder.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Consecutive automatic restarts allowed; unset retries forever.
    #[serde(default)]
    pub max_restarts: Option<u32>,
    /// Restart delay growth.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Cap for exponential backoff.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Largest unterminated frame to buffer; unset buffers without limit.
    #[serde(default)]
    pub max_frame_bytes: Option<usize>,
    /// Grace period between SIGTERM and SIGKILL.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,
    /// Events buffered per listener; a listener further behind loses frames.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_restart_delay_ms() -> u64 {
    duration_millis(DEFAULT_RESTART_DELAY)
}

fn default_backoff_max_ms() -> u64 {
    duration_millis(DEFAULT_BACKOFF_MAX)
}

fn default_terminate_timeout_ms() -> u64 {
    duration_millis(DEFAULT_TERMINATE_TIMEOUT)
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: default_restart_delay_ms(),
            max_restarts: None,
            backoff: BackoffStrategy::Fixed,
            backoff_max_ms: default_backoff_max_ms(),
            max_frame_bytes: None,
            terminate_timeout_ms: default_terminate_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SupervisorConfig {
    /// Convert to runtime supervisor options.
    #[must_use]
    pub fn to_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            restart: RestartPolicy {
                delay: Duration::from_millis(self.restart_delay_ms),
                backoff: self.backoff,
                max_delay: Duration::from_millis(self.backoff_max_ms),
                max_restarts: self.max_restarts,
            },
            terminate_timeout: Duration::from_millis(self.terminate_timeout_ms),
            max_frame_bytes: self.max_frame_bytes,
            event_capacity: self.event_capacity,
        }
    }
}
