//! HotkeyCoordinator state machine.
//!
//! Drives [`CaptureEngine`](crate::audio::CaptureEngine) and
//! [`TranscriptionDriver`](crate::transcription::TranscriptionDriver) off of
//! edge events from the global key monitor. `Idle -> StartInFlight ->
//! Listening -> StopInFlight -> Idle`, with a `StopRequested` latch (an
//! edge-up that arrives mid mic-warm-up is not dropped) and a `QueuedStart`
//! slot (an edge-down that arrives mid-stop is deferred, not dropped).

use super::monitor::Edge;
use crate::audio::{preflight_guard, CaptureEngine};
use crate::cli::ResolvedCli;
use crate::error::{EngineError, EngineResult};
use crate::transcription::TranscriptionDriver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    StartInFlight,
    Listening,
    StopInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DictationState {
    Idle,
    Listening,
    Processing,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PillState {
    Idle,
    Working,
    Live,
    Ok,
    Error,
}

#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// `dictation:hotkey-triggered` — impulse for button-equivalent toggles.
    HotkeyTriggered,
    /// `dictation:state-changed`.
    StateChanged {
        state: DictationState,
        error: Option<String>,
        transcript: Option<String>,
    },
    /// `<pill-status>` overlay channel.
    PillStatus {
        message: String,
        state: PillState,
        visible: bool,
    },
}

/// Synthesizes a paste into whatever external field currently has focus.
/// Implemented per-platform outside this module; injected so the
/// coordinator stays testable without a display.
pub trait TextInserter: Send + Sync {
    fn insert(&self, text: &str) -> Result<(), String>;
}

pub struct HotkeyCoordinator {
    state: Mutex<State>,
    stop_requested: AtomicBool,
    queued_start: AtomicBool,
    capture: Arc<CaptureEngine>,
    transcription: Arc<TranscriptionDriver>,
    cli: ResolvedCli,
    model_path: PathBuf,
    events: Sender<CoordinatorEvent>,
    insert_enabled: AtomicBool,
    inserter: Option<Arc<dyn TextInserter>>,
    host_foreground: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl HotkeyCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: Arc<CaptureEngine>,
        transcription: Arc<TranscriptionDriver>,
        cli: ResolvedCli,
        model_path: PathBuf,
        events: Sender<CoordinatorEvent>,
        inserter: Option<Arc<dyn TextInserter>>,
        host_foreground: Arc<dyn Fn() -> bool + Send + Sync>,
    ) -> Self {
        Self {
            state: Mutex::new(State::Idle),
            stop_requested: AtomicBool::new(false),
            queued_start: AtomicBool::new(false),
            capture,
            transcription,
            cli,
            model_path,
            events,
            insert_enabled: AtomicBool::new(false),
            inserter,
            host_foreground,
        }
    }

    pub fn set_focused_field_insert_enabled(&self, enabled: bool) {
        self.insert_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Feed a key-edge event into the state machine.
    pub fn on_edge(self: &Arc<Self>, edge: Edge) {
        let mut state = self.state.lock();
        match (*state, edge) {
            (State::Idle, Edge::Down) => {
                *state = State::StartInFlight;
                drop(state);
                self.begin_start();
            }
            (State::StartInFlight, Edge::Up) => {
                // Tap-and-release shorter than mic warm-up: latch, don't drop.
                self.stop_requested.store(true, Ordering::SeqCst);
            }
            (State::Listening, Edge::Up) => {
                *state = State::StopInFlight;
                drop(state);
                self.begin_stop();
            }
            (State::StopInFlight, Edge::Down) => {
                self.queued_start.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    fn begin_start(self: &Arc<Self>) {
        let _ = self.events.send(CoordinatorEvent::HotkeyTriggered);
        let this = self.clone();
        std::thread::spawn(move || {
            let result = this.capture.start();
            this.handle_start_result(result);
        });
    }

    /// Apply the outcome of a `capture.start()` attempt to the state
    /// machine. Split out from [`Self::begin_start`] so the `StopRequested`
    /// race (edge-up arriving during mic warm-up) is directly testable
    /// without a real audio device.
    fn handle_start_result(self: &Arc<Self>, result: Result<(), crate::audio::StartError>) {
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                *state = State::Listening;
                let stop_already_requested = self.stop_requested.swap(false, Ordering::SeqCst);
                // Every cycle owes exactly one `listening` event before its
                // terminal `idle`/`error` event, regardless of which branch
                // follows — publish it here before deciding what's next.
                drop(state);
                self.publish(
                    DictationState::Listening,
                    None,
                    None,
                    PillState::Live,
                    "listening",
                );
                if stop_already_requested {
                    *self.state.lock() = State::StopInFlight;
                    self.begin_stop();
                }
            }
            Err(e) => {
                *state = State::Idle;
                drop(state);
                self.publish_error(start_error_to_engine_error(&e).to_string());
            }
        }
    }

    /// Synchronous counterpart to the edge-driven path, for the
    /// button-equivalent `start_native_dictation` command. Shares the
    /// same [`CaptureEngine`] and state machine, so it cannot race a
    /// concurrent hotkey cycle.
    pub fn manual_start(self: &Arc<Self>) -> EngineResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                State::Idle => *state = State::StartInFlight,
                _ => return Err(EngineError::AlreadyRunning),
            }
        }
        let _ = self.events.send(CoordinatorEvent::HotkeyTriggered);

        let result = self.capture.start();
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                *state = State::Listening;
                drop(state);
                self.publish(
                    DictationState::Listening,
                    None,
                    None,
                    PillState::Live,
                    "listening",
                );
                Ok(())
            }
            Err(e) => {
                *state = State::Idle;
                drop(state);
                let err = start_error_to_engine_error(&e);
                self.publish_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Synchronous counterpart to the edge-driven path, for
    /// `stop_native_dictation`, which returns the transcript directly.
    pub fn manual_stop(self: &Arc<Self>) -> EngineResult<String> {
        {
            let mut state = self.state.lock();
            match *state {
                State::Listening => *state = State::StopInFlight,
                State::Idle => return Err(EngineError::NotRunning),
                State::StartInFlight | State::StopInFlight => return Err(EngineError::AlreadyRunning),
            }
        }

        self.publish(
            DictationState::Processing,
            None,
            None,
            PillState::Working,
            "transcribing",
        );

        let outcome = match self.capture.stop() {
            Ok(audio) => match preflight_guard(&audio) {
                Ok(()) => self
                    .transcription
                    .transcribe(&audio.samples, audio.sample_rate, &self.model_path, &self.cli),
                Err(_) => Err(EngineError::NoSpeech),
            },
            Err(_) => Err(EngineError::NotRunning),
        };

        *self.state.lock() = State::Idle;

        match outcome {
            Ok(transcript) => {
                self.maybe_insert(&transcript);
                self.publish(
                    DictationState::Idle,
                    None,
                    Some(transcript.clone()),
                    PillState::Ok,
                    "done",
                );
                Ok(transcript)
            }
            Err(e) => {
                self.publish_error(e.to_string());
                Err(e)
            }
        }
    }

    fn begin_stop(self: &Arc<Self>) {
        let this = self.clone();
        std::thread::spawn(move || {
            this.publish(
                DictationState::Processing,
                None,
                None,
                PillState::Working,
                "transcribing",
            );

            let outcome = match this.capture.stop() {
                Ok(audio) => match preflight_guard(&audio) {
                    Ok(()) => this
                        .transcription
                        .transcribe(&audio.samples, audio.sample_rate, &this.model_path, &this.cli),
                    Err(_) => Err(EngineError::NoSpeech),
                },
                Err(_) => Err(EngineError::NotRunning),
            };

            match outcome {
                Ok(transcript) => {
                    this.maybe_insert(&transcript);
                    this.publish(
                        DictationState::Idle,
                        None,
                        Some(transcript),
                        PillState::Ok,
                        "done",
                    );
                }
                Err(e) => {
                    this.publish_error(e.to_string());
                }
            }

            *this.state.lock() = State::Idle;

            if this.queued_start.swap(false, Ordering::SeqCst) {
                *this.state.lock() = State::StartInFlight;
                this.begin_start();
            }
        });
    }

    fn maybe_insert(&self, transcript: &str) {
        if !self.insert_enabled.load(Ordering::SeqCst) {
            return;
        }
        if (self.host_foreground)() {
            return;
        }
        if let Some(inserter) = &self.inserter {
            if let Err(e) = inserter.insert(transcript) {
                tracing::warn!("focused-field insertion failed: {e}");
            }
        }
    }

    fn publish(
        &self,
        state: DictationState,
        error: Option<String>,
        transcript: Option<String>,
        pill: PillState,
        message: &str,
    ) {
        let _ = self.events.send(CoordinatorEvent::StateChanged {
            state,
            error,
            transcript,
        });
        let _ = self.events.send(CoordinatorEvent::PillStatus {
            message: message.to_string(),
            state: pill,
            visible: true,
        });
    }

    fn publish_error(&self, message: String) {
        tracing::error!("dictation error: {message}");
        self.publish(
            DictationState::Error,
            Some(message),
            None,
            PillState::Error,
            "error",
        );
    }

    /// Safe in any state; interrupts capture and discards samples.
    pub fn cancel(&self) {
        self.capture.cancel();
        self.stop_requested.store(false, Ordering::SeqCst);
        self.queued_start.store(false, Ordering::SeqCst);
        *self.state.lock() = State::Idle;
    }
}

fn start_error_to_engine_error(e: &crate::audio::StartError) -> EngineError {
    match e {
        crate::audio::StartError::AlreadyRunning => EngineError::AlreadyRunning,
        crate::audio::StartError::SetupIncomplete(m) => EngineError::SetupIncomplete(m.clone()),
        crate::audio::StartError::MicOpenFailed(m) => EngineError::MicOpenFailed(m.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    struct NoopInserter;
    impl TextInserter for NoopInserter {
        fn insert(&self, _text: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn make_coordinator() -> (Arc<HotkeyCoordinator>, crossbeam_channel::Receiver<CoordinatorEvent>) {
        let (tx, rx) = unbounded();
        let capture = Arc::new(CaptureEngine::new(Duration::from_millis(200)));
        let transcription = Arc::new(TranscriptionDriver::new());
        let cli = ResolvedCli {
            path: PathBuf::from("/nonexistent/whisper-cli"),
        };
        let coordinator = Arc::new(HotkeyCoordinator::new(
            capture,
            transcription,
            cli,
            PathBuf::from("/nonexistent/model.bin"),
            tx,
            Some(Arc::new(NoopInserter)),
            Arc::new(|| false),
        ));
        (coordinator, rx)
    }

    #[test]
    fn cancel_resets_latches_and_is_always_safe() {
        let (coordinator, _rx) = make_coordinator();
        coordinator.cancel();
        assert_eq!(*coordinator.state.lock(), State::Idle);
    }

    #[test]
    fn edge_down_while_idle_spawns_start_attempt() {
        let (coordinator, rx) = make_coordinator();
        coordinator.on_edge(Edge::Down);
        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(event, CoordinatorEvent::HotkeyTriggered));
    }

    #[test]
    fn set_insert_enabled_updates_flag() {
        let (coordinator, _rx) = make_coordinator();
        coordinator.set_focused_field_insert_enabled(true);
        assert!(coordinator.insert_enabled.load(Ordering::SeqCst));
    }

    #[test]
    fn manual_stop_without_a_prior_start_is_not_running() {
        let (coordinator, _rx) = make_coordinator();
        assert!(matches!(coordinator.manual_stop(), Err(EngineError::NotRunning)));
    }

    #[test]
    fn manual_start_twice_reports_already_running_without_a_second_capture() {
        let (coordinator, _rx) = make_coordinator();
        *coordinator.state.lock() = State::Listening;
        assert!(matches!(coordinator.manual_start(), Err(EngineError::AlreadyRunning)));
    }

    /// Spec scenario 5: an edge-down followed by an edge-up 50ms later,
    /// while the mic is still warming up, must still produce exactly one
    /// `listening` event before its one terminal `idle`/`error` event — the
    /// tap-and-release must not be swallowed by the warm-up race.
    #[test]
    fn tap_and_release_during_warmup_emits_one_listening_then_one_terminal_event() {
        let (coordinator, rx) = make_coordinator();
        *coordinator.state.lock() = State::StartInFlight;
        coordinator.stop_requested.store(true, Ordering::SeqCst);

        // Mimics mic-open succeeding after the edge-up latch was already set.
        coordinator.handle_start_result(Ok(()));

        let mut listening_count = 0;
        let mut terminal_count = 0;
        for _ in 0..8 {
            let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) else {
                break;
            };
            match event {
                CoordinatorEvent::StateChanged {
                    state: DictationState::Listening,
                    ..
                } => listening_count += 1,
                CoordinatorEvent::StateChanged {
                    state: DictationState::Idle | DictationState::Error,
                    ..
                } => {
                    terminal_count += 1;
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(listening_count, 1);
        assert_eq!(terminal_count, 1);
    }
}
