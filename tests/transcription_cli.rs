//! End-to-end coverage of the fast-pass/accuracy-retry procedure against a
//! stand-in `whisper-cli`.

use dicktaint_lib::cli::ResolvedCli;
use dicktaint_lib::error::EngineError;
use dicktaint_lib::transcription::TranscriptionDriver;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes a shell script standing in for `whisper-cli`: it locates the `-of`
/// argument and writes `output` to `<prefix>.txt`, ignoring every other flag.
fn fake_cli(dir: &Path, output: &str) -> ResolvedCli {
    let script_path = dir.join("whisper-cli");
    let script = format!(
        r#"#!/bin/sh
prev=""
for arg in "$@"; do
  if [ "$prev" = "-of" ]; then
    printf '%s' "{output}" > "$arg.txt"
  fi
  prev="$arg"
done
exit 0
"#
    );
    let mut file = std::fs::File::create(&script_path).unwrap();
    file.write_all(script.as_bytes()).unwrap();
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms).unwrap();
    }

    ResolvedCli { path: script_path }
}

fn samples_one_second() -> Vec<f32> {
    vec![0.1_f32; 16_000]
}

#[test]
fn blank_audio_output_yields_no_speech() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path(), "[BLANK_AUDIO]");
    let model_path: PathBuf = dir.path().join("model.bin");
    let driver = TranscriptionDriver::new();

    let result = driver.transcribe(&samples_one_second(), 16_000, &model_path, &cli);
    assert!(matches!(result, Err(EngineError::NoSpeech)));
}

#[test]
fn clean_output_is_returned_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_cli(dir.path(), "Hello world, this is a clean transcript.");
    let model_path: PathBuf = dir.path().join("model.bin");
    let driver = TranscriptionDriver::new();

    let transcript = driver
        .transcribe(&samples_one_second(), 16_000, &model_path, &cli)
        .unwrap();
    assert_eq!(transcript, "Hello world, this is a clean transcript.");
}

#[test]
fn nonzero_exit_is_reported_as_transcription_failed() {
    let dir = tempfile::tempdir().unwrap();
    let script_path = dir.path().join("whisper-cli");
    std::fs::write(&script_path, "#!/bin/sh\nexit 7\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms).unwrap();
    }
    let cli = ResolvedCli { path: script_path };
    let model_path: PathBuf = dir.path().join("model.bin");
    let driver = TranscriptionDriver::new();

    let result = driver.transcribe(&samples_one_second(), 16_000, &model_path, &cli);
    assert!(matches!(result, Err(EngineError::TranscriptionFailed(_))));
}
