//! Supervisor error types.

use crate::transcoder::{DemuxError, InvocationSpec};

/// Errors surfaced by the supervisor, either from a control call or on the
/// event channel.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// stdout or stderr could not be taken from the spawned child.
    #[error("Failed to bind to transcoder stdout and/or stderr")]
    Binding,

    /// The transcoder executable could not be located.
    #[error(
        "Transcoder executable `{program}` was not found. Install ffmpeg or point the `cmd` setting at the binary"
    )]
    ExecutableNotFound { program: String },

    /// Any other launch failure.
    #[error("Failed to launch transcoder: {0}")]
    Launch(#[source] std::io::Error),

    /// The child wrote to its diagnostic stream.
    #[error("Transcoder reported: {message} (command: {command_line})")]
    Diagnostic {
        message: String,
        command_line: String,
    },

    /// The child exited with an unexpected code.
    #[error("Transcoder exited with code {code} (command: {command_line})")]
    ProcessExit { code: i32, command_line: String },

    /// The child was killed by an unexpected signal.
    #[error("Transcoder killed by signal {signal} (command: {command_line})")]
    ProcessSignal { signal: i32, command_line: String },

    /// A frame grew past the configured cap without a terminator.
    #[error("Frame overflow: {0}")]
    FrameOverflow(#[from] DemuxError),

    /// Automatic restarts were exhausted.
    #[error("Transcoder exited cleanly {restarts} times in a row, giving up")]
    RestartLimitExceeded { restarts: u32 },

    /// `start` was called while a child is running.
    #[error("Transcoder is already running")]
    AlreadyRunning,

    /// Failed to terminate or wait on the child.
    #[error("Failed to terminate transcoder: {0}")]
    Terminate(#[source] std::io::Error),
}

impl Clone for SupervisorError {
    fn clone(&self) -> Self {
        match self {
            Self::Binding => Self::Binding,
            Self::ExecutableNotFound { program } => Self::ExecutableNotFound {
                program: program.clone(),
            },
            Self::Launch(e) => Self::Launch(clone_io_error(e)),
            Self::Diagnostic {
                message,
                command_line,
            } => Self::Diagnostic {
                message: message.clone(),
                command_line: command_line.clone(),
            },
            Self::ProcessExit { code, command_line } => Self::ProcessExit {
                code: *code,
                command_line: command_line.clone(),
            },
            Self::ProcessSignal {
                signal,
                command_line,
            } => Self::ProcessSignal {
                signal: *signal,
                command_line: command_line.clone(),
            },
            Self::FrameOverflow(e) => Self::FrameOverflow(e.clone()),
            Self::RestartLimitExceeded { restarts } => Self::RestartLimitExceeded {
                restarts: *restarts,
            },
            Self::AlreadyRunning => Self::AlreadyRunning,
            Self::Terminate(e) => Self::Terminate(clone_io_error(e)),
        }
    }
}

/// `std::io::Error` is not `Clone`; keep the kind and message.
fn clone_io_error(err: &std::io::Error) -> std::io::Error {
    std::io::Error::new(err.kind(), err.to_string())
}

impl SupervisorError {
    pub(crate) fn diagnostic(output: &[u8], invocation: &InvocationSpec) -> Self {
        Self::Diagnostic {
            message: String::from_utf8_lossy(output).trim().to_string(),
            command_line: invocation.command_line(),
        }
    }

    pub(crate) fn process_exit(code: i32, invocation: &InvocationSpec) -> Self {
        Self::ProcessExit {
            code,
            command_line: invocation.command_line(),
        }
    }

    pub(crate) fn process_signal(signal: i32, invocation: &InvocationSpec) -> Self {
        Self::ProcessSignal {
            signal,
            command_line: invocation.command_line(),
        }
    }

    /// Whether this error ended a run, as opposed to rejecting a control call.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AlreadyRunning)
    }
}
