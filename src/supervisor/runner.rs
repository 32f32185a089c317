//! Supervisor runner for keeping one transcoder alive.
//!
//! This module connects the process spawner, the frame demuxer and the event
//! bus. Each `start` spawns a monitor task that owns the child for its whole
//! life, including automatic restarts after a clean exit, so at most one child
//! exists per supervisor. `stop` cancels that task and waits for it, which also
//! cancels a restart that is still waiting out its delay.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::supervisor::{
    EventBus, ExitClassification, RestartPolicy, SupervisorError, SupervisorEvent,
    SupervisorState, SupervisorStateMachine, SupervisorStats, DEFAULT_EVENT_CHANNEL_CAPACITY,
};
use crate::transcoder::{
    Frame, FrameDemuxer, InvocationError, InvocationSpec, SpawnError, TranscoderOptions,
    TranscoderProcess,
};

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read size for the transcoder's stdout.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Read size for the transcoder's stderr.
const DIAGNOSTIC_CHUNK_SIZE: usize = 4 * 1024;

/// Runtime settings for a [`Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// What to do when the transcoder exits with code 0.
    pub restart: RestartPolicy,
    /// Grace period between SIGTERM and SIGKILL.
    pub terminate_timeout: Duration,
    /// Largest unterminated frame to buffer; `None` buffers without limit.
    pub max_frame_bytes: Option<usize>,
    /// Events buffered per listener before the oldest are dropped.
    ///
    /// Frames travel on the same channel, so a listener that falls this far
    /// behind loses frames.
    pub event_capacity: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            restart: RestartPolicy::default(),
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            max_frame_bytes: None,
            event_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Supervisor for one transcoder process and its frame stream.
pub struct Supervisor {
    invocation: Arc<InvocationSpec>,
    options: SupervisorOptions,
    events: EventBus,
    status: Arc<watch::Sender<SupervisorStateMachine>>,
    run: Option<RunTask>,
}

/// Handle to the monitor task of the current run.
struct RunTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Supervisor {
    /// Create a supervisor with default options.
    #[must_use]
    pub fn new(invocation: InvocationSpec) -> Self {
        Self::with_options(invocation, SupervisorOptions::default())
    }

    /// Create a supervisor with custom options.
    #[must_use]
    pub fn with_options(invocation: InvocationSpec, options: SupervisorOptions) -> Self {
        let (status, _) = watch::channel(SupervisorStateMachine::new());
        Self {
            invocation: Arc::new(invocation),
            events: EventBus::new(options.event_capacity),
            options,
            status: Arc::new(status),
            run: None,
        }
    }

    /// Validate transcoder options and create a supervisor for them.
    ///
    /// # Errors
    ///
    /// Returns `InvocationError` if the options are invalid; nothing is spawned.
    pub fn from_transcoder_options(
        transcoder: &TranscoderOptions,
        options: SupervisorOptions,
    ) -> Result<Self, InvocationError> {
        Ok(Self::with_options(transcoder.build()?, options))
    }

    /// The command line this supervisor runs.
    #[must_use]
    pub fn invocation(&self) -> &InvocationSpec {
        &self.invocation
    }

    /// Register a listener for every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// Stream of completed frames.
    pub fn frames(&self) -> impl futures_core::Stream<Item = Frame> + Send + 'static {
        self.events.frames()
    }

    /// The event bus, for handing to other components.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.status.borrow().state()
    }

    /// Whether a child process is currently running.
    ///
    /// This is `false` while an automatic restart waits out its delay.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SupervisorState::Running
    }

    /// Get supervisor statistics.
    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        self.status.borrow().stats()
    }

    /// Watch state and statistics as they change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SupervisorStateMachine> {
        self.status.subscribe()
    }

    /// Spawn the transcoder and begin delivering frames.
    ///
    /// Launch failures are returned and also emitted once on the event channel.
    /// A pending automatic restart is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::AlreadyRunning` if a child is running,
    /// `SupervisorError::ExecutableNotFound` or `SupervisorError::Launch` if the
    /// process cannot be spawned, and `SupervisorError::Binding` if its output
    /// streams are unavailable.
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        if self.is_running() {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.shutdown_run().await;

        let ctx = RunContext {
            invocation: Arc::clone(&self.invocation),
            options: self.options.clone(),
            events: self.events.clone(),
            status: Arc::clone(&self.status),
            cancel: CancellationToken::new(),
        };

        // Every completed frame is delivered and counted, so the count is the next sequence.
        let next_sequence = self.stats().frames;
        let mut demuxer = match self.options.max_frame_bytes {
            Some(limit) => FrameDemuxer::with_max_pending(limit),
            None => FrameDemuxer::new(),
        }
        .starting_at(next_sequence);

        let run = match ctx.launch(&mut demuxer) {
            Ok(run) => run,
            Err(e) => {
                ctx.status.send_modify(|m| m.transition(SupervisorState::Stopped));
                ctx.events.emit_error(e.clone());
                return Err(e);
            }
        };

        let span = tracing::info_span!("transcoder", program = %self.invocation.program());
        let cancel = ctx.cancel.clone();
        let handle = tokio::spawn(ctx.monitor(run, demuxer).instrument(span));
        self.run = Some(RunTask { cancel, handle });

        Ok(())
    }

    /// Stop the transcoder, cancelling any pending automatic restart.
    ///
    /// Always ends in `Stopped` and always emits `Stopped`, even when nothing
    /// was running.
    pub async fn stop(&mut self) {
        self.shutdown_run().await;
        self.status
            .send_modify(|m| m.transition(SupervisorState::Stopped));
        tracing::info!("Transcoder stopped");
        self.events.emit(SupervisorEvent::Stopped);
    }

    /// Stop, start again, then emit `Restarted`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Supervisor::start`].
    pub async fn restart(&mut self) -> Result<(), SupervisorError> {
        self.stop().await;
        self.start().await?;
        self.events.emit(SupervisorEvent::Restarted);
        Ok(())
    }

    /// Cancel the monitor task, if any, and wait for it to release its child.
    async fn shutdown_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        if !run.handle.is_finished() {
            self.status
                .send_modify(|m| m.transition(SupervisorState::Terminating));
        }
        run.cancel.cancel();

        if let Err(e) = run.handle.await {
            tracing::warn!(error = %e, "Monitor task ended abnormally");
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.cancel.cancel();
        }
    }
}

/// One spawned child with its streams bound.
struct BoundRun {
    id: Uuid,
    process: TranscoderProcess,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

/// How a single child's life ended.
enum RunOutcome {
    /// `stop` was requested.
    Cancelled,
    /// The child exited on its own.
    Exited(ExitStatus),
    /// A fatal condition was detected while the child was alive.
    Failed(SupervisorError),
}

/// Everything the monitor task needs, shared with the owning supervisor.
struct RunContext {
    invocation: Arc<InvocationSpec>,
    options: SupervisorOptions,
    events: EventBus,
    status: Arc<watch::Sender<SupervisorStateMachine>>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Spawn a child, bind its streams and enter `Running`.
    ///
    /// The demuxer is reset so no bytes from an earlier run leak into the first frame.
    fn launch(&self, demuxer: &mut FrameDemuxer) -> Result<BoundRun, SupervisorError> {
        let mut process = TranscoderProcess::spawn(&self.invocation).map_err(|e| match e {
            SpawnError::NotFound => SupervisorError::ExecutableNotFound {
                program: self.invocation.program().to_string(),
            },
            SpawnError::PermissionDenied => SupervisorError::Launch(std::io::Error::from(
                std::io::ErrorKind::PermissionDenied,
            )),
            SpawnError::Io(e) => SupervisorError::Launch(e),
        })?;

        let (Some(stdout), Some(stderr)) = (process.take_stdout(), process.take_stderr()) else {
            // kill_on_drop reaps the child
            return Err(SupervisorError::Binding);
        };

        demuxer.reset();

        let run = BoundRun {
            id: Uuid::new_v4(),
            process,
            stdout,
            stderr,
        };

        self.status.send_modify(|m| {
            m.record_spawn();
            m.transition(SupervisorState::Running);
        });
        tracing::info!(
            run_id = %run.id,
            pid = ?run.process.id(),
            command = %self.invocation,
            "Transcoder started"
        );
        self.events.emit(SupervisorEvent::Started);

        Ok(run)
    }

    /// Drive runs until stopped, a fatal error, or a non-restartable exit.
    async fn monitor(self, mut run: BoundRun, mut demuxer: FrameDemuxer) {
        let mut consecutive_restarts: u32 = 0;

        loop {
            let frames_before = self.status.borrow().stats().frames;
            let outcome = self.watch_run(&mut run, &mut demuxer).await;

            match outcome {
                RunOutcome::Cancelled => {
                    self.terminate(&mut run).await;
                    return;
                }
                RunOutcome::Failed(error) => {
                    self.terminate(&mut run).await;
                    self.finish(Some(error));
                    return;
                }
                RunOutcome::Exited(status) => match ExitClassification::from_status(status) {
                    ExitClassification::Terminated => {
                        tracing::info!(run_id = %run.id, ?status, "Transcoder terminated");
                        self.finish(None);
                        return;
                    }
                    ExitClassification::Abnormal(code) => {
                        self.finish(Some(SupervisorError::process_exit(code, &self.invocation)));
                        return;
                    }
                    ExitClassification::Crashed(signal) => {
                        self.finish(Some(SupervisorError::process_signal(
                            signal,
                            &self.invocation,
                        )));
                        return;
                    }
                    ExitClassification::Restart => {
                        // A run that produced frames was healthy; only count back-to-back failures.
                        let frames_after = self.status.borrow().stats().frames;
                        if frames_after > frames_before {
                            consecutive_restarts = 0;
                        }
                        consecutive_restarts = consecutive_restarts.saturating_add(1);

                        let Some(delay) = self.options.restart.next_delay(consecutive_restarts)
                        else {
                            self.finish(Some(SupervisorError::RestartLimitExceeded {
                                restarts: consecutive_restarts - 1,
                            }));
                            return;
                        };

                        match self.relaunch(delay, &mut demuxer).await {
                            Some(Ok(next)) => run = next,
                            Some(Err(error)) => {
                                self.finish(Some(error));
                                return;
                            }
                            None => return,
                        }
                    }
                },
            }
        }
    }

    /// Wait out the restart delay and spawn the next child.
    ///
    /// Returns `None` if the supervisor was stopped in the meantime.
    async fn relaunch(
        &self,
        delay: Duration,
        demuxer: &mut FrameDemuxer,
    ) -> Option<Result<BoundRun, SupervisorError>> {
        self.status
            .send_modify(|m| m.transition(SupervisorState::Stopped));
        tracing::info!(?delay, "Transcoder exited cleanly, restarting");

        tokio::select! {
            biased;

            () = self.cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }

        if self.cancel.is_cancelled() {
            return None;
        }

        let result = self.launch(demuxer);
        if result.is_ok() {
            self.status.send_modify(SupervisorStateMachine::record_automatic_restart);
        }
        Some(result)
    }

    /// Consume output until the child exits, fails, or the run is cancelled.
    async fn watch_run(&self, run: &mut BoundRun, demuxer: &mut FrameDemuxer) -> RunOutcome {
        let mut stdout_buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let mut stderr_buf = BytesMut::with_capacity(DIAGNOSTIC_CHUNK_SIZE);
        let mut stdout_open = true;
        let mut stderr_open = true;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => return RunOutcome::Cancelled,

                read = run.stderr.read_buf(&mut stderr_buf), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(_) => {
                        return RunOutcome::Failed(SupervisorError::diagnostic(
                            &stderr_buf,
                            &self.invocation,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(run_id = %run.id, error = %e, "Failed to read transcoder stderr");
                        stderr_open = false;
                    }
                },

                read = run.stdout.read_buf(&mut stdout_buf), if stdout_open => match read {
                    Ok(0) => {
                        tracing::debug!(run_id = %run.id, "Transcoder stdout closed");
                        stdout_open = false;
                    }
                    Ok(_) => {
                        let chunk = stdout_buf.split().freeze();
                        match demuxer.try_feed(chunk) {
                            Ok(Some(frame)) => self.deliver(frame),
                            Ok(None) => {}
                            Err(e) => return RunOutcome::Failed(e.into()),
                        }
                        stdout_buf.reserve(READ_CHUNK_SIZE);
                    }
                    Err(e) => {
                        tracing::warn!(run_id = %run.id, error = %e, "Failed to read transcoder stdout");
                        stdout_open = false;
                    }
                },

                status = run.process.wait(), if !stdout_open => match status {
                    Ok(status) => {
                        tracing::debug!(run_id = %run.id, ?status, "Transcoder exited");
                        return RunOutcome::Exited(status);
                    }
                    Err(e) => return RunOutcome::Failed(SupervisorError::Terminate(e)),
                },
            }
        }
    }

    fn deliver(&self, frame: Frame) {
        self.status.send_modify(|m| m.record_frame(frame.len()));
        self.events.emit(SupervisorEvent::Data(frame));
    }

    async fn terminate(&self, run: &mut BoundRun) {
        if let Err(e) = run
            .process
            .graceful_terminate(self.options.terminate_timeout)
            .await
        {
            tracing::warn!(run_id = %run.id, error = %e, "Failed to terminate transcoder");
        }
    }

    /// Enter `Stopped` after the run ended on its own, reporting `error` first.
    fn finish(&self, error: Option<SupervisorError>) {
        self.status
            .send_modify(|m| m.transition(SupervisorState::Stopped));
        if let Some(error) = error {
            self.events.emit_error(error);
        }
        self.events.emit(SupervisorEvent::Stopped);
    }
}
