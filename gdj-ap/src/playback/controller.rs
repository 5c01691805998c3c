//! Playback controller
//!
//! Single tokio task owning the remote session, the scheduling clock, the
//! audio sink, and the retry policy. Everything that can mutate playback
//! state funnels through this task: user commands, inbound session events,
//! and the armed one-shot deadlines (buffer-ready, reconnect backoff,
//! commit throttle). Timers are deadlines checked against current state
//! when they fire, so a stale buffer timer that outlives a pause cannot
//! force the state back to playing.
//!
//! State machine:
//! - `stopped`/`paused` -> `loading`: main action; connect or resume, push
//!   params, start the stream
//! - `loading` -> `playing`: buffer-ready deadline fires (the look-ahead
//!   cushion has elapsed since the first chunk was scheduled)
//! - `loading` -> `stopped`: main action again while loading (cancel)
//! - `playing` -> `paused`: main action; pause session, fade output
//! - underrun while `playing` -> `loading`: scheduling epoch reset, session
//!   kept, chunks refill the buffer
//! - transport failure from any connected state: bounded retry with
//!   backoff, or terminal stop when exhausted

use crate::error::Error;
use crate::midi::CcMessage;
use crate::playback::decode::{decode_chunk, resample};
use crate::playback::output::{AudioSink, PAUSE_FADE};
use crate::playback::reconnect::{ReconnectPolicy, RetryDecision};
use crate::playback::scheduler::{Schedule, StreamScheduler};
use crate::prompts::PromptBank;
use crate::session::{
    AudioChunkData, ConnectParams, ServerMessage, SessionEvent, SessionHandle, SessionTransport,
};
use crate::state::SharedState;
use chrono::Utc;
use gdj_common::events::{GdjEvent, PlaybackState};
use gdj_common::params::GenerationConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Coalescing window for parameter commits; knob drags generate many
/// changes per second and the session only needs the trailing value
pub const COMMIT_THROTTLE: Duration = Duration::from_millis(200);

/// Commands accepted by the controller task
#[derive(Debug)]
pub enum Command {
    /// The main action: play, pause, or cancel depending on current state
    TogglePlayPause,
    /// Release the session and stop
    Stop,
    SetPromptWeight { prompt_id: Uuid, weight: f64 },
    SetPromptAuto { prompt_id: Uuid, auto: bool },
    /// MIDI CC routed to the bound prompt's weight
    Cc(CcMessage),
    SetConfig(GenerationConfig),
    SetVolume(f64),
    Shutdown,
}

/// The playback controller task
pub struct PlaybackController<T: SessionTransport> {
    transport: Arc<T>,
    connect_params: ConnectParams,
    state: Arc<SharedState>,
    bank: Arc<Mutex<PromptBank>>,
    config: Arc<Mutex<GenerationConfig>>,
    sink: Box<dyn AudioSink>,
    scheduler: StreamScheduler,
    reconnect: ReconnectPolicy,

    session: Option<T::Handle>,
    session_events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    /// True while a session is believed healthy; cleared before retry
    /// logic runs so error and close for one failure count once
    connected: bool,
    /// Whether a successful reconnect should resume the stream
    resume_after_reconnect: bool,

    buffer_deadline: Option<Instant>,
    reconnect_deadline: Option<Instant>,
    commit_deadline: Option<Instant>,

    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl<T: SessionTransport> PlaybackController<T> {
    /// Build the controller and its command channel
    pub fn new(
        transport: Arc<T>,
        connect_params: ConnectParams,
        state: Arc<SharedState>,
        bank: Arc<Mutex<PromptBank>>,
        config: Arc<Mutex<GenerationConfig>>,
        sink: Box<dyn AudioSink>,
    ) -> (Self, mpsc::UnboundedSender<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = Self {
            transport,
            connect_params,
            state,
            bank,
            config,
            sink,
            scheduler: StreamScheduler::default(),
            reconnect: ReconnectPolicy::default(),
            session: None,
            session_events: None,
            connected: false,
            resume_after_reconnect: false,
            buffer_deadline: None,
            reconnect_deadline: None,
            commit_deadline: None,
            cmd_rx,
        };
        (controller, cmd_tx)
    }

    /// Run until `Shutdown` or the command channel closes
    pub async fn run(mut self) {
        info!("Playback controller started");
        let mut level_interval = tokio::time::interval(Duration::from_millis(50));
        level_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Shutdown) => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                event = recv_opt(&mut self.session_events), if self.session_events.is_some() => {
                    match event {
                        Some(event) => self.handle_session_event(event).await,
                        None => self.session_events = None,
                    }
                },

                _ = sleep_opt(self.buffer_deadline), if self.buffer_deadline.is_some() => {
                    self.buffer_deadline = None;
                    self.on_buffer_ready().await;
                },

                _ = sleep_opt(self.reconnect_deadline), if self.reconnect_deadline.is_some() => {
                    self.reconnect_deadline = None;
                    self.on_reconnect_deadline().await;
                },

                _ = sleep_opt(self.commit_deadline), if self.commit_deadline.is_some() => {
                    self.commit_deadline = None;
                    self.commit_params().await;
                },

                _ = level_interval.tick() => {
                    self.state.set_audio_level(self.sink.level());
                },
            }
        }

        self.release_session().await;
        info!("Playback controller stopped");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::TogglePlayPause => match self.state.playback_state().await {
                PlaybackState::Stopped | PlaybackState::Paused => self.start_playback().await,
                PlaybackState::Playing => self.pause_playback().await,
                PlaybackState::Loading => self.stop_playback().await,
            },
            Command::Stop => self.stop_playback().await,
            Command::SetPromptWeight { prompt_id, weight } => {
                let committed = self.bank.lock().unwrap().set_weight(prompt_id, weight);
                if let Some(weight) = committed {
                    self.emit(GdjEvent::PromptWeightChanged {
                        prompt_id,
                        weight,
                        timestamp: Utc::now(),
                    });
                    self.schedule_commit();
                } else {
                    warn!("Weight change for unknown prompt {}", prompt_id);
                }
            }
            Command::SetPromptAuto { prompt_id, auto } => {
                let committed = self.bank.lock().unwrap().set_auto(prompt_id, auto);
                if let Some(weight) = committed {
                    self.emit(GdjEvent::PromptWeightChanged {
                        prompt_id,
                        weight,
                        timestamp: Utc::now(),
                    });
                    self.schedule_commit();
                }
            }
            Command::Cc(msg) => {
                let mapped = self.bank.lock().unwrap().apply_cc(msg.cc, msg.value);
                if let Some((prompt_id, weight)) = mapped {
                    self.emit(GdjEvent::PromptWeightChanged {
                        prompt_id,
                        weight,
                        timestamp: Utc::now(),
                    });
                    self.schedule_commit();
                }
            }
            Command::SetConfig(config) => {
                let config = config.clamped();
                *self.config.lock().unwrap() = config.clone();
                self.emit(GdjEvent::GenerationConfigChanged {
                    config,
                    timestamp: Utc::now(),
                });
                self.schedule_commit();
            }
            Command::SetVolume(volume) => {
                self.sink.set_volume(volume as f32);
                self.state.set_volume(volume).await;
            }
            Command::Shutdown => unreachable!("handled in run loop"),
        }
    }

    /// `stopped`/`paused` -> `loading`: connect or resume, push params,
    /// start the stream
    async fn start_playback(&mut self) {
        let active = self.bank.lock().unwrap().active_prompts();
        if active.is_empty() {
            self.emit(GdjEvent::EngineWarning {
                message: "There needs to be one active prompt to play.".to_string(),
                timestamp: Utc::now(),
            });
            self.state.set_playback_state(PlaybackState::Paused).await;
            return;
        }

        self.state.set_playback_state(PlaybackState::Loading).await;
        self.reconnect.reset();

        if self.session.is_none() {
            match self.transport.connect(&self.connect_params).await {
                Ok((handle, events)) => {
                    self.session = Some(handle);
                    self.session_events = Some(events);
                    self.connected = true;
                }
                Err(e) => {
                    // Initial connection failures are not auto-retried
                    self.surface_connect_failure(e).await;
                    return;
                }
            }
        }

        if !self.commit_params().await {
            return;
        }

        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.play().await {
                warn!("Failed to start stream: {}", e);
                self.on_transport_failure(e.to_string()).await;
                return;
            }
        }

        // Fresh scheduling epoch; the buffer timer arms on the first chunk
        self.sink.reset();
        self.scheduler.reset();
        self.buffer_deadline = None;
    }

    /// `playing` -> `paused`: pause the session, fade to silence; the gain
    /// stage is rebuilt on the next start
    async fn pause_playback(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.pause().await {
                warn!("Session pause failed: {}", e);
            }
        }
        self.sink.fade_out(PAUSE_FADE);
        self.scheduler.reset();
        self.buffer_deadline = None;
        self.state.set_playback_state(PlaybackState::Paused).await;
    }

    /// Any state -> `stopped`: release the session entirely
    async fn stop_playback(&mut self) {
        self.release_session().await;
        self.sink.fade_out(PAUSE_FADE);
        self.scheduler.reset();
        self.buffer_deadline = None;
        self.reconnect_deadline = None;
        self.reconnect.reset();
        self.state.set_playback_state(PlaybackState::Stopped).await;
    }

    async fn release_session(&mut self) {
        self.connected = false;
        self.session_events = None;
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.stop().await {
                debug!("Session release failed: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Session events
    // ------------------------------------------------------------------

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Message(ServerMessage::SetupComplete {}) => {
                debug!("Session setup complete");
                self.connected = true;
                self.reconnect.on_established();
            }
            SessionEvent::Message(ServerMessage::FilteredPrompt {
                text,
                filtered_reason,
            }) => {
                warn!("Prompt filtered by service: {} ({})", text, filtered_reason);
                self.bank
                    .lock()
                    .unwrap()
                    .mark_filtered(&text, &filtered_reason);
                self.emit(GdjEvent::PromptFiltered {
                    text,
                    reason: filtered_reason,
                    timestamp: Utc::now(),
                });
                // The active set changed; the session must stop using the
                // rejected prompt
                self.schedule_commit();
            }
            SessionEvent::Message(ServerMessage::AudioChunks { chunks }) => {
                for chunk in chunks {
                    self.handle_chunk(chunk).await;
                }
            }
            SessionEvent::TransportError(message) => {
                self.on_transport_failure(message).await;
            }
            SessionEvent::Closed => {
                self.on_transport_failure("connection closed".to_string()).await;
            }
        }
    }

    /// Decode and schedule one chunk against the output clock
    async fn handle_chunk(&mut self, chunk: AudioChunkData) {
        match self.state.playback_state().await {
            PlaybackState::Stopped | PlaybackState::Paused => return,
            PlaybackState::Loading | PlaybackState::Playing => {}
        }

        let decoded = match decode_chunk(&chunk).and_then(|d| resample(d, self.sink.sample_rate()))
        {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Dropping undecodable chunk: {}", e);
                return;
            }
        };

        let now = self.sink.clock();
        match self.scheduler.on_chunk(decoded.duration(), now) {
            Schedule::First { start_at } => {
                self.sink.schedule(&decoded.samples, start_at);
                // The look-ahead cushion doubles as the loading delay
                self.buffer_deadline = Some(
                    Instant::now() + Duration::from_secs_f64(self.scheduler.buffer_time()),
                );
            }
            Schedule::Append { start_at } => {
                self.sink.schedule(&decoded.samples, start_at);
            }
            Schedule::Underrun => {
                debug!("Output underran the stream; rebuffering");
                // The device kept consuming (silence) past the write head, so
                // the sink's timeline is behind its clock. Realign before the
                // next epoch or its padding lands late by the deficit.
                self.sink.reset();
                self.buffer_deadline = None;
                self.state.set_playback_state(PlaybackState::Loading).await;
            }
        }
    }

    /// Buffer-ready deadline: the cushion has elapsed since the first
    /// chunk was scheduled. Only applies if we are still loading; a stale
    /// timer firing after a pause or stop must not restart playback.
    async fn on_buffer_ready(&mut self) {
        if self.state.playback_state().await == PlaybackState::Loading
            && self.session.is_some()
        {
            self.state.set_playback_state(PlaybackState::Playing).await;
        }
    }

    // ------------------------------------------------------------------
    // Reconnection
    // ------------------------------------------------------------------

    /// A transport failure on the live session. Error and close may both
    /// fire for one underlying failure; leaving the connected state first
    /// means only the first one records a failure.
    async fn on_transport_failure(&mut self, message: String) {
        if !self.connected {
            debug!("Ignoring duplicate transport failure: {}", message);
            return;
        }
        warn!("Session transport failure: {}", message);
        self.connected = false;
        self.session = None;
        self.session_events = None;

        let state = self.state.playback_state().await;
        self.resume_after_reconnect =
            matches!(state, PlaybackState::Playing | PlaybackState::Loading);

        self.scheduler.reset();
        self.buffer_deadline = None;
        self.record_failure().await;
    }

    /// Record a consecutive failure and either arm the backoff deadline or
    /// give up
    async fn record_failure(&mut self) {
        match self.reconnect.on_failure() {
            RetryDecision::RetryAfter { delay, attempt } => {
                self.emit(GdjEvent::Reconnecting {
                    attempt,
                    max_attempts: self.reconnect.max_retries(),
                    timestamp: Utc::now(),
                });
                self.state.set_playback_state(PlaybackState::Loading).await;
                self.reconnect_deadline = Some(Instant::now() + delay);
            }
            RetryDecision::GiveUp => {
                self.emit(GdjEvent::ConnectionFailed {
                    message: "Connection error, please restart audio.".to_string(),
                    timestamp: Utc::now(),
                });
                self.resume_after_reconnect = false;
                self.state.set_playback_state(PlaybackState::Stopped).await;
            }
        }
    }

    /// Backoff deadline fired: attempt to reconnect with the same session
    /// parameters
    async fn on_reconnect_deadline(&mut self) {
        info!(
            "Reconnecting (attempt {}/{})",
            self.reconnect.attempts(),
            self.reconnect.max_retries()
        );

        match self.transport.connect(&self.connect_params).await {
            Ok((handle, events)) => {
                self.session = Some(handle);
                self.session_events = Some(events);
                self.connected = true;

                if !self.commit_params().await {
                    return;
                }

                if self.resume_after_reconnect {
                    if let Some(session) = self.session.as_mut() {
                        if let Err(e) = session.play().await {
                            warn!("Resume after reconnect failed: {}", e);
                            self.on_transport_failure(e.to_string()).await;
                            return;
                        }
                    }
                    self.sink.reset();
                    self.scheduler.reset();
                    self.state.set_playback_state(PlaybackState::Loading).await;
                } else {
                    self.state.set_playback_state(PlaybackState::Paused).await;
                }
            }
            Err(Error::Auth(message)) => {
                // Credentials went bad mid-session: retrying cannot help
                self.reconnect.reset();
                self.emit(GdjEvent::ConnectionFailed {
                    message,
                    timestamp: Utc::now(),
                });
                self.state.set_playback_state(PlaybackState::Stopped).await;
            }
            Err(e) => {
                debug!("Reconnect attempt failed: {}", e);
                self.record_failure().await;
            }
        }
    }

    /// Initial-connection failure: stop immediately with a specific
    /// message, never auto-retry
    async fn surface_connect_failure(&mut self, error: Error) {
        let message = match error {
            Error::Auth(m) => m,
            other => other.to_string(),
        };
        warn!("Connection failed: {}", message);
        self.emit(GdjEvent::ConnectionFailed {
            message,
            timestamp: Utc::now(),
        });
        self.session = None;
        self.session_events = None;
        self.connected = false;
        self.state.set_playback_state(PlaybackState::Stopped).await;
    }

    // ------------------------------------------------------------------
    // Parameter commits
    // ------------------------------------------------------------------

    /// Coalesce parameter pushes within the throttle window
    fn schedule_commit(&mut self) {
        if self.commit_deadline.is_none() {
            self.commit_deadline = Some(Instant::now() + COMMIT_THROTTLE);
        }
    }

    /// Push the active prompt set and generation config to the session.
    /// Returns false when playback cannot proceed (empty active set or a
    /// failed control call).
    async fn commit_params(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return true;
        };

        let active = self.bank.lock().unwrap().active_prompts();
        if active.is_empty() {
            self.emit(GdjEvent::EngineWarning {
                message: "There needs to be one active prompt to play. Audio paused.".to_string(),
                timestamp: Utc::now(),
            });
            self.pause_playback().await;
            return false;
        }

        let config = self.config.lock().unwrap().clone();
        let result = async {
            session.set_weighted_prompts(&active).await?;
            session.set_config(&config).await
        }
        .await;

        if let Err(e) = result {
            warn!("Parameter commit failed: {}", e);
            self.on_transport_failure(e.to_string()).await;
            return false;
        }
        true
    }

    fn emit(&self, event: GdjEvent) {
        self.state.events.emit(event);
    }
}

/// Receive from an optional channel; pending when absent
async fn recv_opt(
    events: &mut Option<mpsc::UnboundedReceiver<SessionEvent>>,
) -> Option<SessionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Sleep until an optional deadline; pending when unset
async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
