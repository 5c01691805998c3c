//! Shared test infrastructure: scripted session transport and simulated
//! audio sink for driving the playback controller deterministically.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gdj_ap::error::{Error, Result};
use gdj_ap::playback::{AudioSink, Command, PlaybackController};
use gdj_ap::prompts::PromptBank;
use gdj_ap::session::{
    AudioChunkData, ConnectParams, ServerMessage, SessionEvent, SessionHandle, SessionTransport,
};
use gdj_ap::state::SharedState;
use gdj_common::events::GdjEvent;
use gdj_common::params::{GenerationConfig, WeightedPrompt};
use std::collections::VecDeque;
use std::future::{ready, Future};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

// ================================================================================================
// Scripted session transport
// ================================================================================================

/// Outcome of the next `connect` call; an exhausted script connects
/// successfully
pub enum ConnectOutcome {
    Ok,
    Auth(&'static str),
    Fail(&'static str),
}

/// Record of all control-plane calls across every session
#[derive(Default)]
pub struct SessionLog {
    pub connects: usize,
    pub prompt_commits: Vec<Vec<WeightedPrompt>>,
    pub config_commits: usize,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub stop_calls: usize,
}

pub struct MockTransport {
    script: Mutex<VecDeque<ConnectOutcome>>,
    pub log: Arc<Mutex<SessionLog>>,
    /// Event sender for each established session, in connect order
    pub senders: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl MockTransport {
    pub fn new(script: Vec<ConnectOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            log: Arc::new(Mutex::new(SessionLog::default())),
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn connects(&self) -> usize {
        self.log.lock().unwrap().connects
    }

    /// Event sender for the most recently established session
    pub fn current_sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.senders
            .lock()
            .unwrap()
            .last()
            .expect("no session established")
            .clone()
    }
}

pub struct MockHandle {
    log: Arc<Mutex<SessionLog>>,
}

impl SessionHandle for MockHandle {
    fn set_weighted_prompts(
        &mut self,
        prompts: &[WeightedPrompt],
    ) -> impl Future<Output = Result<()>> + Send {
        self.log.lock().unwrap().prompt_commits.push(prompts.to_vec());
        ready(Ok(()))
    }

    fn set_config(&mut self, _config: &GenerationConfig) -> impl Future<Output = Result<()>> + Send {
        self.log.lock().unwrap().config_commits += 1;
        ready(Ok(()))
    }

    fn play(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.log.lock().unwrap().play_calls += 1;
        ready(Ok(()))
    }

    fn pause(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.log.lock().unwrap().pause_calls += 1;
        ready(Ok(()))
    }

    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.log.lock().unwrap().stop_calls += 1;
        ready(Ok(()))
    }
}

impl SessionTransport for MockTransport {
    type Handle = MockHandle;

    fn connect(
        &self,
        _params: &ConnectParams,
    ) -> impl Future<Output = Result<(MockHandle, mpsc::UnboundedReceiver<SessionEvent>)>> + Send
    {
        self.log.lock().unwrap().connects += 1;
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Ok);

        let result = match outcome {
            ConnectOutcome::Ok => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.senders.lock().unwrap().push(tx);
                Ok((
                    MockHandle {
                        log: Arc::clone(&self.log),
                    },
                    rx,
                ))
            }
            ConnectOutcome::Auth(msg) => Err(Error::Auth(msg.to_string())),
            ConnectOutcome::Fail(msg) => Err(Error::Session(msg.to_string())),
        };
        ready(result)
    }
}

// ================================================================================================
// Simulated audio sink
// ================================================================================================

/// Shared side of the simulated sink, inspected and driven by tests
///
/// Models the real sink's FIFO timeline: a write head in seconds that only
/// advances when audio is scheduled, while the clock (driven by the test)
/// advances regardless, as a device emitting silence on an empty ring does.
#[derive(Default)]
pub struct SimSinkShared {
    clock: Mutex<f64>,
    /// Seconds of timeline written so far (silence padding included)
    written: Mutex<f64>,
    pub scheduled: Mutex<Vec<(f64, usize)>>,
    /// Time each scheduled batch actually becomes audible under FIFO playout
    audible: Mutex<Vec<f64>>,
    pub resets: AtomicUsize,
    pub fades: AtomicUsize,
}

impl SimSinkShared {
    pub fn set_clock(&self, seconds: f64) {
        *self.clock.lock().unwrap() = seconds;
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    pub fn last_start_at(&self) -> f64 {
        self.scheduled
            .lock()
            .unwrap()
            .last()
            .expect("nothing scheduled")
            .0
    }

    /// When the most recent batch actually starts playing; equals its
    /// requested start time only if the write head was aligned
    pub fn last_audible_at(&self) -> f64 {
        *self
            .audible
            .lock()
            .unwrap()
            .last()
            .expect("nothing scheduled")
    }
}

pub struct SimSink {
    pub shared: Arc<SimSinkShared>,
}

impl AudioSink for SimSink {
    fn clock(&self) -> f64 {
        *self.shared.clock.lock().unwrap()
    }

    fn schedule(&mut self, samples: &[f32], start_at: f64) {
        let clock = *self.shared.clock.lock().unwrap();
        let mut written = self.shared.written.lock().unwrap();

        // FIFO playout: silence is padded from the write head up to the
        // requested start, and the whole batch queues behind whatever is
        // still unplayed. If the device has drained past the write head,
        // queued audio can begin no earlier than the current clock.
        let pad = (start_at - *written).max(0.0);
        let audible = written.max(clock) + pad;
        let duration = samples.len() as f64 / (48000.0 * 2.0);
        *written = written.max(start_at) + duration;

        self.shared
            .scheduled
            .lock()
            .unwrap()
            .push((start_at, samples.len()));
        self.shared.audible.lock().unwrap().push(audible);
    }

    fn fade_out(&mut self, _duration: Duration) {
        self.shared.fades.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&mut self) {
        // Realign the write head with the clock, as the real sink does
        *self.shared.written.lock().unwrap() = *self.shared.clock.lock().unwrap();
        self.shared.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn level(&self) -> f32 {
        0.0
    }

    fn sample_rate(&self) -> u32 {
        48000
    }

    fn channels(&self) -> u16 {
        2
    }
}

// ================================================================================================
// Test rig
// ================================================================================================

pub struct TestRig {
    pub commands: mpsc::UnboundedSender<Command>,
    pub state: Arc<SharedState>,
    pub bank: Arc<Mutex<PromptBank>>,
    pub config: Arc<Mutex<GenerationConfig>>,
    pub transport: Arc<MockTransport>,
    pub sink: Arc<SimSinkShared>,
    pub events: broadcast::Receiver<GdjEvent>,
}

impl TestRig {
    /// Spawn a controller over a scripted transport and the given prompts
    pub fn spawn(script: Vec<ConnectOutcome>, prompts: Vec<WeightedPrompt>) -> Self {
        let transport = Arc::new(MockTransport::new(script));
        let state = Arc::new(SharedState::new());
        let bank = Arc::new(Mutex::new(PromptBank::with_prompts(prompts)));
        let config = Arc::new(Mutex::new(GenerationConfig::default()));
        let sink_shared = Arc::new(SimSinkShared::default());
        let sink = SimSink {
            shared: Arc::clone(&sink_shared),
        };

        // Subscribe before spawning so no event is missed
        let events = state.subscribe_events();

        let (controller, commands) = PlaybackController::new(
            Arc::clone(&transport),
            ConnectParams {
                model: "models/test".to_string(),
            },
            Arc::clone(&state),
            Arc::clone(&bank),
            Arc::clone(&config),
            Box::new(sink),
        );
        tokio::spawn(controller.run());

        Self {
            commands,
            state,
            bank,
            config,
            transport,
            sink: sink_shared,
            events,
        }
    }

    pub fn send(&self, cmd: Command) {
        self.commands.send(cmd).expect("controller gone");
    }

    /// Deliver a session event on the live session's channel
    pub fn session_event(&self, event: SessionEvent) {
        self.transport
            .current_sender()
            .send(event)
            .expect("session channel closed");
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<GdjEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Two prompts with non-zero weights, bound to CC 0 and 1
pub fn active_prompts() -> Vec<WeightedPrompt> {
    vec![
        WeightedPrompt::new("Bossa Nova", 1.0, 0, "#9900ff"),
        WeightedPrompt::new("Minimal Techno", 1.0, 1, "#5200ff"),
    ]
}

/// Prompts present but all at zero weight
pub fn silent_prompts() -> Vec<WeightedPrompt> {
    vec![
        WeightedPrompt::new("Drum and Bass", 0.0, 0, "#dd12e1"),
        WeightedPrompt::new("Shoegaze", 0.0, 1, "#44aadd"),
    ]
}

/// A session event carrying one chunk of silence at 48 kHz stereo
pub fn audio_chunk(duration_secs: f64) -> SessionEvent {
    let frames = (duration_secs * 48000.0).round() as usize;
    let bytes: Vec<u8> = std::iter::repeat([0u8, 0u8])
        .take(frames * 2)
        .flatten()
        .collect();
    SessionEvent::Message(ServerMessage::AudioChunks {
        chunks: vec![AudioChunkData {
            data: BASE64.encode(bytes),
            sample_rate: 48000,
            channels: 2,
        }],
    })
}

pub fn setup_complete() -> SessionEvent {
    SessionEvent::Message(ServerMessage::SetupComplete {})
}

pub fn filtered_prompt(text: &str, reason: &str) -> SessionEvent {
    SessionEvent::Message(ServerMessage::FilteredPrompt {
        text: text.to_string(),
        filtered_reason: reason.to_string(),
    })
}

/// Let the controller task process everything queued so far
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
