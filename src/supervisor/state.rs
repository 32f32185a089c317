//! Supervisor state machine.

use serde::{Deserialize, Serialize};

/// Current state of a supervised transcoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    /// No child process; also held while an automatic restart is pending.
    #[default]
    Stopped,
    /// A child process is alive and its output is being consumed.
    Running,
    /// A stop was requested and the child is being shut down.
    Terminating,
}

/// State machine for tracking the supervised process.
#[derive(Debug, Clone)]
pub struct SupervisorStateMachine {
    state: SupervisorState,
    spawns: usize,
    automatic_restarts: usize,
    frames: u64,
    bytes: u64,
}

impl Default for SupervisorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Stopped,
            spawns: 0,
            automatic_restarts: 0,
            frames: 0,
            bytes: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn transition(&mut self, new_state: SupervisorState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    pub fn record_spawn(&mut self) {
        self.spawns = self.spawns.saturating_add(1);
    }

    pub fn record_automatic_restart(&mut self) {
        self.automatic_restarts = self.automatic_restarts.saturating_add(1);
    }

    pub fn record_frame(&mut self, len: usize) {
        self.frames = self.frames.saturating_add(1);
        self.bytes = self.bytes.saturating_add(len as u64);
    }

    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            spawns: self.spawns,
            automatic_restarts: self.automatic_restarts,
            frames: self.frames,
            bytes: self.bytes,
        }
    }
}

/// Supervisor statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub spawns: usize,
    pub automatic_restarts: usize,
    pub frames: u64,
    pub bytes: u64,
}
