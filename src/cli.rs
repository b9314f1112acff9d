//! Locates and validates an external transcription executable via an
//! ordered probe chain. Each candidate must exist, be executable,
//! and answer `--help` successfully within a 2s budget with output that
//! resembles genuine help (rejecting placeholder stubs).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const CLI_BINARY_NAME: &str = "whisper-cli";

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCli {
    pub path: PathBuf,
}

pub struct CliResolver {
    /// Step 1: explicit override.
    pub override_path: Option<PathBuf>,
    /// Step 2: bundled sidecar path produced by the host runtime.
    pub sidecar_path: Option<PathBuf>,
    /// Step 5: local dev-sidecar candidates under a fixed repo directory.
    pub dev_sidecar_dir: Option<PathBuf>,
}

impl CliResolver {
    pub fn new(override_path: Option<PathBuf>) -> Self {
        Self {
            override_path,
            sidecar_path: default_sidecar_path(),
            dev_sidecar_dir: default_dev_sidecar_dir(),
        }
    }

    /// Run the probe chain in order; the first candidate that passes
    /// validation wins.
    pub fn resolve(&self) -> Option<ResolvedCli> {
        for candidate in self.candidates() {
            if validate_candidate(&candidate) {
                return Some(ResolvedCli { path: candidate });
            }
        }
        None
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();

        if let Some(p) = &self.override_path {
            out.push(p.clone());
        }
        if let Some(p) = &self.sidecar_path {
            out.push(p.clone());
        }
        if let Some(p) = which::which(CLI_BINARY_NAME).ok() {
            out.push(p);
        }
        out.extend(known_install_candidates());
        if let Some(dir) = &self.dev_sidecar_dir {
            out.push(dir.join(CLI_BINARY_NAME));
            #[cfg(target_os = "windows")]
            out.push(dir.join(format!("{CLI_BINARY_NAME}.exe")));
        }

        out
    }
}

#[cfg(target_os = "macos")]
fn known_install_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/opt/homebrew/bin/whisper-cli"),
        PathBuf::from("/usr/local/bin/whisper-cli"),
    ]
}

#[cfg(target_os = "linux")]
fn known_install_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/local/bin/whisper-cli"),
        PathBuf::from("/usr/bin/whisper-cli"),
    ]
}

#[cfg(target_os = "windows")]
fn known_install_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from(r"C:\Program Files\whisper.cpp\whisper-cli.exe")]
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn known_install_candidates() -> Vec<PathBuf> {
    Vec::new()
}

fn default_sidecar_path() -> Option<PathBuf> {
    std::env::current_exe().ok().and_then(|exe| {
        let dir = exe.parent()?;
        let name = if cfg!(target_os = "windows") {
            "whisper-cli.exe"
        } else {
            "whisper-cli"
        };
        Some(dir.join(name))
    })
}

fn default_dev_sidecar_dir() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|d| d.join("src-tauri").join("binaries"))
}

fn validate_candidate(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    if !is_executable(path) {
        return false;
    }
    match run_help_with_timeout(path, PROBE_TIMEOUT) {
        Some(output) => looks_like_genuine_help(&output),
        None => false,
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("exe"))
        .unwrap_or(true)
}

/// Run `<path> --help` with a hard timeout; the timeout disqualifies only
/// that candidate, not the whole probe.
fn run_help_with_timeout(path: &Path, timeout: Duration) -> Option<String> {
    let mut child = Command::new(path)
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .ok()?;

    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_status)) => {
                use std::io::Read;
                let mut out = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_string(&mut out);
                }
                if out.trim().is_empty() {
                    if let Some(mut stderr) = child.stderr.take() {
                        let _ = stderr.read_to_string(&mut out);
                    }
                }
                return Some(out);
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return None,
        }
    }
}

/// Reject placeholder stubs (empty output, or output that is trivially
/// short and lacks recognizable help markers).
fn looks_like_genuine_help(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    if lower.trim().is_empty() {
        return false;
    }
    lower.len() > 40
        && (lower.contains("usage") || lower.contains("options") || lower.contains("-m "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_output() {
        assert!(!looks_like_genuine_help(""));
    }

    #[test]
    fn rejects_short_placeholder_stub() {
        assert!(!looks_like_genuine_help("ok"));
    }

    #[test]
    fn accepts_output_with_usage_marker() {
        let help = "usage: whisper-cli [options] -m model -f file.wav\n\noptions:\n  -m, --model   model path\n  -f, --file    input wav\n";
        assert!(looks_like_genuine_help(help));
    }

    #[test]
    fn resolve_returns_none_when_nothing_validates() {
        let resolver = CliResolver {
            override_path: Some(PathBuf::from("/nonexistent/whisper-cli")),
            sidecar_path: None,
            dev_sidecar_dir: None,
        };
        assert!(resolver.resolve().is_none());
    }
}
