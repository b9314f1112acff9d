//! Signal conditioning applied by `CaptureEngine::stop` before handoff to
//! the transcription driver: downmix, resample, DC removal, silence
//! trim with speech pad, and gain normalization.

const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Small pad preserved at each edge when trimming silence.
const SPEECH_PAD_MS: f32 = 100.0;
/// Energy threshold (RMS over a short window) below which audio counts as silence.
const SILENCE_RMS_THRESHOLD: f32 = 0.01;
const WINDOW_MS: f32 = 20.0;
/// Target RMS band for gain normalization.
const TARGET_RMS_LOW: f32 = 0.05;
const TARGET_RMS_HIGH: f32 = 0.2;
const CLIP_GUARD_PEAK: f32 = 0.95;

/// Condition raw interleaved multi-channel audio at `source_rate` into a
/// normalized 16 kHz mono `f32` signal.
pub fn condition_signal(interleaved: &[f32], source_rate: u32, channels: usize) -> Vec<f32> {
    let mono = downmix_dominant_channel(interleaved, channels.max(1));
    let resampled = if source_rate != TARGET_SAMPLE_RATE {
        resample_linear(&mono, source_rate, TARGET_SAMPLE_RATE)
    } else {
        mono
    };
    let dc_removed = remove_dc_offset(&resampled);
    let trimmed = trim_silence(&dc_removed, TARGET_SAMPLE_RATE);
    normalize_gain(&trimmed)
}

/// Downmix to mono by preferring the channel with the most energy over the
/// recording, rather than a simple per-frame average.
fn downmix_dominant_channel(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    let mut energy = vec![0.0f64; channels];
    let frames = interleaved.len() / channels;
    for frame in interleaved.chunks_exact(channels) {
        for (c, &s) in frame.iter().enumerate() {
            energy[c] += (s as f64) * (s as f64);
        }
    }
    let dominant = energy
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut out = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(channels) {
        out.push(frame[dominant]);
    }
    out
}

/// Linear-interpolation resample.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src = i as f64 * ratio;
        let idx = src as usize;
        let frac = (src - idx as f64) as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };
        out.push(sample);
    }
    out
}

fn remove_dc_offset(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    samples.iter().map(|&s| s - mean as f32).collect()
}

/// Trim leading/trailing silence below an energy threshold, preserving a
/// small speech pad at each edge.
fn trim_silence(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let window = ((WINDOW_MS / 1000.0) * sample_rate as f32).round().max(1.0) as usize;
    let pad = ((SPEECH_PAD_MS / 1000.0) * sample_rate as f32).round() as usize;

    let windows: Vec<bool> = samples
        .chunks(window)
        .map(|w| rms(w) >= SILENCE_RMS_THRESHOLD)
        .collect();

    let first_speech = windows.iter().position(|&v| v);
    let last_speech = windows.iter().rposition(|&v| v);

    let (Some(first), Some(last)) = (first_speech, last_speech) else {
        return Vec::new();
    };

    let start_sample = (first * window).saturating_sub(pad);
    let end_sample = ((last + 1) * window + pad).min(samples.len());
    samples[start_sample..end_sample].to_vec()
}

/// Normalize gain to a mid-band target RMS, scaling up very quiet audio and
/// scaling down audio that approaches clipping.
fn normalize_gain(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let current_rms = rms(samples);
    if current_rms <= f32::EPSILON {
        return samples.to_vec();
    }

    let mut gain = if current_rms < TARGET_RMS_LOW {
        TARGET_RMS_LOW / current_rms
    } else if current_rms > TARGET_RMS_HIGH {
        TARGET_RMS_HIGH / current_rms
    } else {
        1.0
    };

    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak * gain > CLIP_GUARD_PEAK {
        gain = CLIP_GUARD_PEAK / peak.max(f32::EPSILON);
    }

    samples.iter().map(|&s| (s * gain).clamp(-1.0, 1.0)).collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum_sq / samples.len() as f64).sqrt()) as f32
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_prefers_dominant_energy_channel() {
        // ch0 silent, ch1 loud -> dominant channel is ch1
        let interleaved = vec![0.0, 0.8, 0.0, -0.8, 0.0, 0.8];
        let mono = downmix_dominant_channel(&interleaved, 2);
        assert_eq!(mono, vec![0.8, -0.8, 0.8]);
    }

    #[test]
    fn downmix_mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_dominant_channel(&samples, 1), samples);
    }

    #[test]
    fn resample_same_rate_is_noop() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample_linear(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_halves_length_for_half_target_rate() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let out = resample_linear(&samples, 32000, 16000);
        assert!((out.len() as i64 - 500).abs() <= 2);
    }

    #[test]
    fn dc_offset_is_removed() {
        let samples = vec![1.0, 1.0, 1.0, 1.0];
        let out = remove_dc_offset(&samples);
        for s in out {
            assert!(s.abs() < 1e-6);
        }
    }

    #[test]
    fn trim_silence_removes_leading_and_trailing_quiet() {
        let sr = 16000;
        let quiet = vec![0.0f32; sr as usize / 10]; // 100ms silence
        let loud = vec![0.5f32; sr as usize / 10]; // 100ms speech
        let mut samples = quiet.clone();
        samples.extend(&loud);
        samples.extend(&quiet);

        let trimmed = trim_silence(&samples, sr);
        assert!(trimmed.len() < samples.len());
        assert!(rms(&trimmed) > SILENCE_RMS_THRESHOLD / 2.0);
    }

    #[test]
    fn trim_silence_on_all_silence_yields_empty() {
        let samples = vec![0.0f32; 16000];
        assert!(trim_silence(&samples, 16000).is_empty());
    }

    #[test]
    fn normalize_gain_boosts_quiet_signal() {
        let samples = vec![0.001f32; 1000];
        let out = normalize_gain(&samples);
        assert!(rms(&out) > rms(&samples));
    }

    #[test]
    fn normalize_gain_attenuates_near_clipping_signal() {
        let samples: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 0.99 } else { -0.99 }).collect();
        let out = normalize_gain(&samples);
        assert!(peak(&out) <= CLIP_GUARD_PEAK + 1e-6);
    }
}
