//! Writes captured audio to a scratch WAV file, invokes the resolved
//! `whisper-cli` as a subprocess with a fast-pass beam/best setting, cleans
//! the raw output, and — if the result looks low-information — retries once
//! at a higher accuracy setting before picking whichever candidate scores
//! better on [`coverage_score`].

use super::filter::{clean_output, coverage_score, is_low_information};
use super::wav::write_wav;
use crate::cli::ResolvedCli;
use crate::error::{EngineError, EngineResult};
use std::path::PathBuf;
use std::process::Command;

const FAST_BEAM: u32 = 2;
const FAST_BEST: u32 = 2;
const ACCURACY_BEAM: u32 = 5;
const ACCURACY_BEST: u32 = 5;
/// Thread count is clamped to this range regardless of host core count.
const MIN_THREADS: usize = 1;
const MAX_THREADS: usize = 8;

pub struct TranscriptionDriver;

impl TranscriptionDriver {
    pub fn new() -> Self {
        Self
    }

    /// Run the full fast-pass/accuracy-retry procedure and return the
    /// cleaned transcript text.
    pub fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        model_path: &std::path::Path,
        cli: &ResolvedCli,
    ) -> EngineResult<String> {
        let scratch = tempfile::tempdir()
            .map_err(|e| EngineError::TranscriptionFailed(format!("scratch dir: {e}")))?;
        let wav_path = scratch.path().join("capture.wav");
        write_wav(samples, sample_rate, &wav_path)
            .map_err(|e| EngineError::TranscriptionFailed(format!("wav write: {e}")))?;

        let threads = thread_count();

        let fast_prefix = scratch.path().join("fast");
        let fast_raw = run_cli(cli, model_path, &wav_path, &fast_prefix, threads, FAST_BEAM, FAST_BEST)?;
        let fast_text = clean_output(&fast_raw);

        if fast_text.is_empty() {
            return Err(EngineError::NoSpeech);
        }

        if !is_low_information(&fast_text) {
            return Ok(fast_text);
        }

        let accuracy_prefix = scratch.path().join("accuracy");
        let accuracy_raw = run_cli(
            cli,
            model_path,
            &wav_path,
            &accuracy_prefix,
            threads,
            ACCURACY_BEAM,
            ACCURACY_BEST,
        )?;
        let accuracy_text = clean_output(&accuracy_raw);

        if accuracy_text.is_empty() {
            return if fast_text.is_empty() {
                Err(EngineError::NoSpeech)
            } else {
                Ok(fast_text)
            };
        }

        // Ties keep the fast-pass result: it is cheaper and already
        // validated to be non-empty.
        if coverage_score(&accuracy_text) > coverage_score(&fast_text) {
            Ok(accuracy_text)
        } else {
            Ok(fast_text)
        }
    }
}

impl Default for TranscriptionDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread count derived from the host's logical core count, clamped to
/// `[MIN_THREADS, MAX_THREADS]`.
fn thread_count() -> usize {
    num_cpus::get().clamp(MIN_THREADS, MAX_THREADS)
}

#[allow(clippy::too_many_arguments)]
fn run_cli(
    cli: &ResolvedCli,
    model_path: &std::path::Path,
    wav_path: &std::path::Path,
    out_prefix: &std::path::Path,
    threads: usize,
    beam_size: u32,
    best_of: u32,
) -> EngineResult<String> {
    let output = Command::new(&cli.path)
        .arg("-m")
        .arg(model_path)
        .arg("-f")
        .arg(wav_path)
        .arg("-l")
        .arg("en")
        .arg("-otxt")
        .arg("-nt")
        .arg("-np")
        .arg("-of")
        .arg(out_prefix)
        .arg("-t")
        .arg(threads.to_string())
        .arg("-bs")
        .arg(beam_size.to_string())
        .arg("-bo")
        .arg(best_of.to_string())
        .output()
        .map_err(|e| EngineError::TranscriptionFailed(format!("spawn failed: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::TranscriptionFailed(format!(
            "exit {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    let txt_path: PathBuf = {
        let mut p = out_prefix.to_path_buf();
        p.set_extension("txt");
        p
    };
    std::fs::read_to_string(&txt_path)
        .map_err(|e| EngineError::TranscriptionFailed(format!("missing output file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_count_is_clamped() {
        let t = thread_count();
        assert!(t >= MIN_THREADS && t <= MAX_THREADS);
    }
}
