//! Lifecycle and frame notifications.
//!
//! Every listener gets its own receiver on a broadcast channel, so any number
//! of consumers can watch the same supervisor. A listener that falls more than
//! the channel capacity behind loses the oldest events and is told how many.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::supervisor::SupervisorError;
use crate::transcoder::Frame;

/// Default capacity for the event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification emitted by a supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// A child process was spawned and bound.
    Started,
    /// The supervisor reached `Stopped`.
    Stopped,
    /// A `restart` call completed.
    Restarted,
    /// One complete frame.
    Data(Frame),
    /// A fatal failure of the current run.
    Error(Arc<SupervisorError>),
}

impl SupervisorEvent {
    /// Channel name, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Restarted => "restarted",
            Self::Data(_) => "data",
            Self::Error(_) => "error",
        }
    }
}

/// Multi-listener fan-out of supervisor events.
///
/// Frames share the channel with lifecycle events. A listener more than
/// `capacity` events behind loses the oldest ones, frames included, and its
/// next `recv` reports `Lagged` with the number lost. The capacity is therefore
/// the frame-loss threshold for a slow consumer.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SupervisorEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per listener.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.tx.subscribe()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Deliver an event to every listener. Having no listeners is not an error.
    pub fn emit(&self, event: SupervisorEvent) {
        tracing::trace!(kind = event.kind(), "Emitting event");
        let _ = self.tx.send(event);
    }

    pub(crate) fn emit_error(&self, error: SupervisorError) {
        tracing::error!(error = %error, "Transcoder failure");
        self.emit(SupervisorEvent::Error(Arc::new(error)));
    }

    /// Stream of frames only, skipping lifecycle events.
    ///
    /// Frames lost to lag are skipped with a warning; the stream does not end.
    pub fn frames(&self) -> impl futures_core::Stream<Item = Frame> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| async move {
            match event {
                Ok(SupervisorEvent::Data(frame)) => Some(frame),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Frame listener lagged, events dropped");
                    None
                }
            }
        })
    }
}
