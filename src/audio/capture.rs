//! Single-slot microphone recorder. `start`/`stop`/`cancel` drive the state
//! machine `Idle -> Starting -> Recording -> Stopping -> Idle`. The
//! audio callback appends to a buffer guarded by a mutex held only for the
//! append; the control side only ever reads the stop flag.

use super::device::get_default_input_device;
use super::format::{condition_signal, peak, rms};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar};
use std::time::{Duration, Instant};

/// Minimum trimmed duration before a capture is considered speech.
const MIN_SPEECH_MS: u64 = 250;
const NOISE_FLOOR_RMS: f32 = 0.01;
const AUDIBILITY_FLOOR_PEAK: f32 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Starting,
    Recording,
    Stopping,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartError {
    AlreadyRunning,
    SetupIncomplete(String),
    MicOpenFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotRunning;

/// Raw accumulated samples handed off to the TranscriptionDriver, already
/// conditioned to normalized 16 kHz mono (conditioning is applied in `stop`,
/// before handoff).
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CapturedAudio {
    pub fn duration_ms(&self) -> u64 {
        ((self.samples.len() as f64 / self.sample_rate as f64) * 1000.0) as u64
    }
}

/// Shared buffer appended to only by the audio callback thread.
struct SharedBuffer {
    samples: Mutex<Vec<f32>>,
    sample_rate: Mutex<u32>,
    channels: Mutex<usize>,
    stop_signal: AtomicBool,
}

impl SharedBuffer {
    fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            sample_rate: Mutex::new(16_000),
            channels: Mutex::new(1),
            stop_signal: AtomicBool::new(false),
        }
    }

    fn append(&self, data: &[f32]) {
        self.samples.lock().extend_from_slice(data);
    }
}

pub struct CaptureEngine {
    state: Mutex<State>,
    buffer: Arc<SharedBuffer>,
    stream: Mutex<Option<Stream>>,
    live_signal: Arc<(Mutex<bool>, Condvar)>,
    mic_open_timeout: Duration,
}

/// Safety: `cpal::Stream` is not `Send` on some platforms, but the engine
/// only ever touches it from the thread that owns the mutex, matching the
/// single-slot invariant.
unsafe impl Send for CaptureEngine {}
unsafe impl Sync for CaptureEngine {}

impl CaptureEngine {
    pub fn new(mic_open_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::Idle),
            buffer: Arc::new(SharedBuffer::new()),
            stream: Mutex::new(None),
            live_signal: Arc::new((Mutex::new(false), Condvar::new())),
            mic_open_timeout,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self.state.lock() == State::Idle
    }

    /// Blocks the caller until either the stream is confirmed live or the
    /// mic-open timeout elapses.
    pub fn start(&self) -> Result<(), StartError> {
        {
            let mut state = self.state.lock();
            match *state {
                State::Starting | State::Recording => return Err(StartError::AlreadyRunning),
                State::Stopping | State::Idle => *state = State::Starting,
            }
        }

        let device = match get_default_input_device() {
            Some(d) => d,
            None => {
                *self.state.lock() = State::Idle;
                return Err(StartError::MicOpenFailed("no input device available".into()));
            }
        };
        tracing::info!("opening input device: {}", super::device::get_device_display_name(&device));

        let supported = match device.default_input_config() {
            Ok(c) => c,
            Err(e) => {
                *self.state.lock() = State::Idle;
                return Err(StartError::MicOpenFailed(e.to_string()));
            }
        };

        let sample_rate = supported.sample_rate();
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();

        *self.buffer.samples.lock() = Vec::new();
        *self.buffer.sample_rate.lock() = sample_rate;
        *self.buffer.channels.lock() = channels;
        self.buffer.stop_signal.store(false, Ordering::SeqCst);

        let (live_lock, live_cvar) = &*self.live_signal;
        *live_lock.lock() = false;

        let buffer = self.buffer.clone();
        let live_signal = self.live_signal.clone();

        let stream_result = build_input_stream(&device, &supported, sample_format, buffer.clone(), live_signal);

        let stream = match stream_result {
            Ok(s) => s,
            Err(e) => {
                *self.state.lock() = State::Idle;
                return Err(StartError::MicOpenFailed(e));
            }
        };

        if let Err(e) = stream.play() {
            *self.state.lock() = State::Idle;
            return Err(StartError::MicOpenFailed(e.to_string()));
        }

        *self.stream.lock() = Some(stream);

        let confirmed = {
            let (lock, cvar) = &*self.live_signal;
            let mut live = lock.lock();
            let deadline = Instant::now() + self.mic_open_timeout;
            while !*live {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                cvar.wait_for(&mut live, remaining);
            }
            *live
        };

        if !confirmed {
            *self.stream.lock() = None;
            *self.state.lock() = State::Idle;
            return Err(StartError::MicOpenFailed("timeout waiting for microphone".into()));
        }

        *self.state.lock() = State::Recording;
        Ok(())
    }

    /// Stop recording and hand off conditioned samples.
    pub fn stop(&self) -> Result<CapturedAudio, NotRunning> {
        {
            let mut state = self.state.lock();
            match *state {
                State::Idle => return Err(NotRunning),
                _ => *state = State::Stopping,
            }
        }

        self.buffer.stop_signal.store(true, Ordering::SeqCst);
        *self.stream.lock() = None; // drop stream, flushing the callback thread

        let raw = std::mem::take(&mut *self.buffer.samples.lock());
        let source_rate = *self.buffer.sample_rate.lock();
        let channels = *self.buffer.channels.lock();

        *self.state.lock() = State::Idle;

        let conditioned = condition_signal(&raw, source_rate, channels);
        Ok(CapturedAudio {
            samples: conditioned,
            sample_rate: 16_000,
        })
    }

    /// Always safe; a no-op when idle. Discards any accumulated samples.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if *state == State::Idle {
            return;
        }
        self.buffer.stop_signal.store(true, Ordering::SeqCst);
        *self.stream.lock() = None;
        self.buffer.samples.lock().clear();
        *state = State::Idle;
    }
}

/// Applies the preflight guards: too short, too quiet, or too faint
/// audio never reaches the transcription CLI.
pub fn preflight_guard(audio: &CapturedAudio) -> Result<(), &'static str> {
    if audio.duration_ms() < MIN_SPEECH_MS {
        return Err("duration below minimum");
    }
    if rms(&audio.samples) < NOISE_FLOOR_RMS {
        return Err("rms below noise floor");
    }
    if peak(&audio.samples) < AUDIBILITY_FLOOR_PEAK {
        return Err("peak below audibility floor");
    }
    Ok(())
}

fn build_input_stream(
    device: &cpal::Device,
    supported: &cpal::SupportedStreamConfig,
    format: SampleFormat,
    buffer: Arc<SharedBuffer>,
    live_signal: Arc<(Mutex<bool>, Condvar)>,
) -> Result<Stream, String> {
    let config = supported.config();
    let err_fn = |err| tracing::error!("audio stream error: {err}");

    let mark_live = move || {
        let (lock, cvar) = &*live_signal;
        let mut live = lock.lock();
        if !*live {
            *live = true;
            cvar.notify_all();
        }
    };

    match format {
        SampleFormat::F32 => device
            .build_input_stream(
                &config,
                move |data: &[f32], _| {
                    mark_live();
                    buffer.append(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| e.to_string()),
        SampleFormat::I16 => device
            .build_input_stream(
                &config,
                move |data: &[i16], _| {
                    mark_live();
                    let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    buffer.append(&converted);
                },
                err_fn,
                None,
            )
            .map_err(|e| e.to_string()),
        SampleFormat::U16 => device
            .build_input_stream(
                &config,
                move |data: &[u16], _| {
                    mark_live();
                    let converted: Vec<f32> = data
                        .iter()
                        .map(|&s| (s as f32 - 32768.0) / 32768.0)
                        .collect();
                    buffer.append(&converted);
                },
                err_fn,
                None,
            )
            .map_err(|e| e.to_string()),
        other => Err(format!("unsupported sample format: {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_rejects_too_short_capture() {
        let audio = CapturedAudio {
            samples: vec![0.5; 100], // ~6ms at 16kHz
            sample_rate: 16_000,
        };
        assert!(preflight_guard(&audio).is_err());
    }

    #[test]
    fn preflight_rejects_silent_capture() {
        let audio = CapturedAudio {
            samples: vec![0.0; 16_000], // 1s of silence
            sample_rate: 16_000,
        };
        assert!(preflight_guard(&audio).is_err());
    }

    #[test]
    fn preflight_accepts_loud_enough_capture() {
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect();
        let audio = CapturedAudio {
            samples,
            sample_rate: 16_000,
        };
        assert!(preflight_guard(&audio).is_ok());
    }

    #[test]
    fn cancel_is_a_safe_noop_when_idle() {
        let engine = CaptureEngine::new(Duration::from_millis(100));
        engine.cancel();
        assert!(engine.is_idle());
    }

    #[test]
    fn stop_when_idle_returns_not_running() {
        let engine = CaptureEngine::new(Duration::from_millis(100));
        assert_eq!(engine.stop(), Err(NotRunning));
    }
}
