//! The session task and its handle.
//!
//! One task owns the [`GameMachine`] and the live link. Player actions reach
//! it through a bounded command channel; link activity reaches it through an
//! unbounded event channel fed by the connect, reader and writer tasks. State
//! and score leave through `watch` channels, so late subscribers always see
//! the latest value.
//!
//! Every connect attempt gets a new epoch. Events carry the epoch they were
//! produced under and stale ones are dropped, so a retry never sees bytes or
//! failures from a previous connection.

use std::sync::Arc;
use std::time::Duration;

use simon_remote_core::{Frame, GameMachine, Outcome, Signal, SignalCodec};
use simon_remote_link::{
    connect, discover, CloseHandle, Connection, LinkError, LinkReader, LinkWriter, Transport,
};
use simon_remote_types::{GameState, InputMode, Move, ScoreBoard, SESSION_ENDED};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::store::ScoreStore;
use crate::wire_log::WireLog;

/// How long teardown waits for queued frames to reach the device.
const WRITER_GRACE: Duration = Duration::from_secs(1);
const READER_GRACE: Duration = Duration::from_millis(500);
const WIRE_LOG_GRACE: Duration = Duration::from_secs(1);
const TRANSITION_HISTORY: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] simon_remote_core::CodecError),
    #[error("command queue full")]
    Backpressure,
    #[error("session task has stopped")]
    Stopped,
}

/// Requests accepted by the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    SelectMode(InputMode),
    SubmitMove(Move),
    BeginRound,
    AbandonGame,
    EndSession,
    RetryConnection,
    Shutdown,
}

enum LinkEvent<S> {
    Connected { epoch: u64, conn: Connection<S> },
    ConnectFailed { epoch: u64, message: String },
    Signal { epoch: u64, signal: Signal },
    ReadFailed { epoch: u64, reason: String },
}

/// Handle to a running session. Dropping it ends the session.
pub struct Session {
    commands: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<GameState>,
    scores_rx: watch::Receiver<ScoreBoard>,
    transitions_tx: broadcast::Sender<GameState>,
    task: JoinHandle<()>,
}

impl Session {
    /// Spawn the session task on the current runtime. The session stays
    /// `Idle` until [`Session::start`].
    pub fn spawn<T, St>(config: SessionConfig, transport: T, store: St) -> Result<Self, SessionError>
    where
        T: Transport,
        St: ScoreStore,
    {
        let codec = config.codec()?;
        let (commands, commands_rx) = mpsc::channel(config.max_pending_commands.max(1));
        let (state_tx, state_rx) = watch::channel(GameState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (transitions_tx, _) = broadcast::channel(TRANSITION_HISTORY);

        let mut machine = GameMachine::new(codec);
        let stored_max = read_stored_max(&store, 0);
        machine.set_stored_max(stored_max);
        let (scores_tx, scores_rx) = watch::channel(machine.score_board());

        let (wire_log, wire_log_task) = match config.wire_log_path.clone() {
            Some(path) => {
                let (log, task) = WireLog::spawn(path);
                (Some(log), Some(task))
            }
            None => (None, None),
        };

        let actor = SessionTask {
            config,
            codec,
            transport: Arc::new(transport),
            store,
            machine,
            state_tx,
            scores_tx,
            transitions_tx: transitions_tx.clone(),
            events_tx,
            epoch: 0,
            connect_task: None,
            link: None,
            wire_log,
            wire_log_task,
        };
        let task = tokio::spawn(actor.run(commands_rx, events_rx));

        Ok(Self {
            commands,
            state_rx,
            scores_rx,
            transitions_tx,
            task,
        })
    }

    /// Begin discovery and connection. Ignored unless the session is `Idle`.
    pub fn start(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Start)
    }

    pub fn select_mode(&self, mode: InputMode) -> Result<(), SessionError> {
        self.send(SessionCommand::SelectMode(mode))
    }

    /// Buffer one move. A no-op unless the player has the turn.
    pub fn submit_move(&self, mv: impl Into<Move>) -> Result<(), SessionError> {
        self.send(SessionCommand::SubmitMove(mv.into()))
    }

    pub fn begin_round(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::BeginRound)
    }

    /// Leave the current game and keep the link.
    pub fn abandon_game(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::AbandonGame)
    }

    /// Say goodbye to the device and close the link.
    pub fn end_session(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::EndSession)
    }

    /// Start a fresh connect attempt after an error or disconnect.
    pub fn retry_connection(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::RetryConnection)
    }

    /// Current state now and on every change.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state_rx.clone()
    }

    pub fn subscribe_scores(&self) -> watch::Receiver<ScoreBoard> {
        self.scores_rx.clone()
    }

    /// Every transition from now on, including ones a `watch` subscriber
    /// would coalesce.
    pub fn transitions(&self) -> broadcast::Receiver<GameState> {
        self.transitions_tx.subscribe()
    }

    pub fn state(&self) -> GameState {
        self.state_rx.borrow().clone()
    }

    pub fn scores(&self) -> ScoreBoard {
        *self.scores_rx.borrow()
    }

    /// End the session and wait for every task it owns to finish.
    pub async fn shutdown(self) {
        if self.commands.send(SessionCommand::Shutdown).await.is_err() {
            debug!("session task already stopped");
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "session task failed");
        }
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(cmd) => {
                warn!(?cmd, "session busy, command dropped");
                SessionError::Backpressure
            }
            mpsc::error::TrySendError::Closed(_) => SessionError::Stopped,
        })
    }
}

struct LiveLink {
    epoch: u64,
    device: String,
    frames: mpsc::UnboundedSender<Frame>,
    closer: CloseHandle,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

struct SessionTask<T: Transport, St> {
    config: SessionConfig,
    codec: SignalCodec,
    transport: Arc<T>,
    store: St,
    machine: GameMachine,
    state_tx: watch::Sender<GameState>,
    scores_tx: watch::Sender<ScoreBoard>,
    transitions_tx: broadcast::Sender<GameState>,
    events_tx: mpsc::UnboundedSender<LinkEvent<T::Stream>>,
    epoch: u64,
    connect_task: Option<JoinHandle<()>>,
    link: Option<LiveLink>,
    wire_log: Option<WireLog>,
    wire_log_task: Option<JoinHandle<()>>,
}

impl<T: Transport, St: ScoreStore> SessionTask<T, St> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut events: mpsc::UnboundedReceiver<LinkEvent<T::Stream>>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }
        self.end_session().await;

        // Reader and writer are gone, so this was the last sender.
        self.wire_log = None;
        if let Some(mut task) = self.wire_log_task.take() {
            if tokio::time::timeout(WIRE_LOG_GRACE, &mut task).await.is_err() {
                warn!("wire log did not drain in time");
                task.abort();
            }
        }
        debug!("session task stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        trace!(?cmd, state = self.machine.state().name(), "command");
        match cmd {
            SessionCommand::Start => {
                if *self.machine.state() == GameState::Idle {
                    self.begin_connect();
                } else {
                    debug!(state = self.machine.state().name(), "already started");
                }
            }
            SessionCommand::RetryConnection => {
                if self.machine.state().is_retryable() {
                    self.begin_connect();
                } else {
                    debug!(state = self.machine.state().name(), "nothing to retry");
                }
            }
            SessionCommand::SelectMode(mode) => {
                let out = self.machine.select_mode(mode);
                self.apply(out);
            }
            SessionCommand::SubmitMove(mv) => {
                let out = self.machine.submit_move(mv);
                self.apply(out);
            }
            SessionCommand::BeginRound => {
                let out = self.machine.begin_round();
                self.apply(out);
            }
            SessionCommand::AbandonGame => {
                let out = self.machine.abandon();
                self.apply(out);
            }
            SessionCommand::EndSession => self.end_session().await,
            SessionCommand::Shutdown => {}
        }
    }

    async fn handle_event(&mut self, event: LinkEvent<T::Stream>) {
        match event {
            LinkEvent::Connected { epoch, conn } => {
                if epoch != self.epoch || *self.machine.state() != GameState::Connecting {
                    debug!(epoch, current = self.epoch, "dropping stale connection");
                    conn.close();
                    return;
                }
                self.connect_task = None;
                self.attach(epoch, conn);
                let out = self.machine.connected();
                self.apply(out);
            }
            LinkEvent::ConnectFailed { epoch, message } => {
                if epoch != self.epoch {
                    return;
                }
                self.connect_task = None;
                let out = self.machine.connect_failed(message);
                self.apply(out);
            }
            LinkEvent::Signal { epoch, signal } => {
                if !self.is_live(epoch) {
                    trace!(?signal, epoch, "stale signal");
                    return;
                }
                debug!(?signal, "signal");
                match self.machine.on_signal(signal) {
                    Ok(out) => self.apply(out),
                    Err(e) => {
                        warn!(error = %e, "protocol error, closing link");
                        self.teardown_link(None).await;
                        let out = self.machine.link_lost(format!("protocol error: {e}"));
                        self.apply(out);
                    }
                }
            }
            LinkEvent::ReadFailed { epoch, reason } => {
                if !self.is_live(epoch) {
                    return;
                }
                info!(%reason, "link lost");
                self.teardown_link(None).await;
                let out = self.machine.link_lost(reason);
                self.apply(out);
            }
        }
    }

    fn is_live(&self, epoch: u64) -> bool {
        self.link.as_ref().is_some_and(|link| link.epoch == epoch)
    }

    /// Fresh epoch, fresh best score, fresh connect task.
    fn begin_connect(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.epoch += 1;
        let epoch = self.epoch;

        let stored_max = read_stored_max(&self.store, self.machine.stored_max());
        self.machine.set_stored_max(stored_max);
        let out = self.machine.connecting();
        self.apply(out);

        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let identity = self.config.device.clone();
        let backoff = self.config.discovery_backoff;
        let timeout = self.config.connect_timeout;
        info!(device = %identity, epoch, "connecting");

        self.connect_task = Some(tokio::spawn(async move {
            let result = async {
                let device = discover(&*transport, &identity, backoff).await?;
                connect(&*transport, &device, timeout).await
            }
            .await;
            let event = match result {
                Ok(conn) => LinkEvent::Connected { epoch, conn },
                Err(e) => LinkEvent::ConnectFailed {
                    epoch,
                    message: e.to_string(),
                },
            };
            let _ = events.send(event);
        }));
    }

    fn attach(&mut self, epoch: u64, conn: Connection<T::Stream>) {
        let device = conn.device().to_string();
        let (reader, writer, closer) = conn.into_split();
        let (frames, frames_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            reader,
            self.codec,
            epoch,
            self.events_tx.clone(),
            self.wire_log.clone(),
        ));
        let writer = tokio::spawn(write_loop(writer, frames_rx, self.wire_log.clone()));

        info!(%device, epoch, "link up");
        self.link = Some(LiveLink {
            epoch,
            device,
            frames,
            closer,
            reader,
            writer,
        });
    }

    /// Close the link exactly once. Queued frames, plus `farewell`, get a
    /// short grace period to reach the device first.
    async fn teardown_link(&mut self, farewell: Option<Frame>) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        if let Some(frame) = farewell {
            let _ = link.frames.send(frame);
        }
        drop(link.frames);

        if tokio::time::timeout(WRITER_GRACE, &mut link.writer).await.is_err() {
            warn!(device = %link.device, "writer stuck, abandoning queued frames");
            link.writer.abort();
        }
        link.closer.close();
        if tokio::time::timeout(READER_GRACE, &mut link.reader).await.is_err() {
            link.reader.abort();
        }
        debug!(device = %link.device, epoch = link.epoch, "link closed");
    }

    async fn end_session(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        // In-flight connect results belong to an epoch nobody waits for.
        self.epoch += 1;
        self.teardown_link(Some(vec![SESSION_ENDED])).await;
        let out = self.machine.link_lost("session ended");
        self.apply(out);
    }

    /// Frames first, then persistence, then transitions.
    fn apply(&mut self, out: Outcome) {
        if out.is_noop() {
            return;
        }

        for frame in out.frames {
            match &self.link {
                Some(link) => {
                    if link.frames.send(frame).is_err() {
                        warn!(device = %link.device, "writer gone, frame dropped");
                    }
                }
                None => debug!(?frame, "no link, frame dropped"),
            }
        }

        if let Some(max) = out.persist_max {
            match self.store.set_max_score(max) {
                Ok(()) => info!(max, "new best score"),
                Err(e) => warn!(max, error = %e, "failed to persist best score"),
            }
        }

        let board = self.machine.score_board();
        self.scores_tx.send_if_modified(|current| {
            if *current == board {
                false
            } else {
                *current = board;
                true
            }
        });

        for state in out.transitions {
            debug!(state = %state, "transition");
            let _ = self.transitions_tx.send(state.clone());
            self.state_tx.send_replace(state);
        }
    }
}

fn read_stored_max<St: ScoreStore>(store: &St, fallback: u32) -> u32 {
    match store.max_score() {
        Ok(max) => max,
        Err(e) => {
            warn!(error = %e, "failed to read best score");
            fallback
        }
    }
}

/// One decoded signal per byte, forwarded in arrival order.
async fn read_loop<S>(
    mut reader: LinkReader<S>,
    codec: SignalCodec,
    epoch: u64,
    events: mpsc::UnboundedSender<LinkEvent<S>>,
    wire_log: Option<WireLog>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    loop {
        match reader.read_byte().await {
            Ok(byte) => {
                if let Some(log) = &wire_log {
                    log.rx(&[byte]);
                }
                let Some(signal) = codec.decode(byte) else {
                    debug!(byte, "unrecognized byte dropped");
                    continue;
                };
                if events.send(LinkEvent::Signal { epoch, signal }).is_err() {
                    return;
                }
            }
            Err(LinkError::Closed) => {
                trace!(epoch, "reader closed");
                return;
            }
            Err(e) => {
                let _ = events.send(LinkEvent::ReadFailed {
                    epoch,
                    reason: e.to_string(),
                });
                return;
            }
        }
    }
}

/// Serializes frames onto the link. Write errors are logged and the link
/// stays up.
async fn write_loop<S>(
    mut writer: LinkWriter<S>,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    wire_log: Option<WireLog>,
) where
    S: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if let Some(log) = &wire_log {
            log.tx(&frame);
        }
        if let Err(e) = writer.write(&frame).await {
            warn!(error = %e, bytes = frame.len(), "write failed");
        }
    }
    let _ = writer.shutdown().await;
}
