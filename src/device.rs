//! Pure read of OS facilities: RAM, logical cores, OS name, architecture.
//! There is no failure mode beyond falling back to conservative defaults
//! when a platform query is unsupported.

use serde::{Deserialize, Serialize};

/// Immutable snapshot of the host machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Total system memory in GB, rounded to one decimal place.
    pub total_memory_gb: f64,
    /// Logical CPU core count, clamped to at least 1.
    pub logical_cpu_cores: usize,
    pub architecture: String,
    pub os: String,
}

/// Probe the local machine and report its profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile {
        total_memory_gb: total_memory_gb(),
        logical_cpu_cores: logical_cpu_cores(),
        architecture: architecture(),
        os: os_name(),
    }
}

fn total_memory_gb() -> f64 {
    match sysinfo_total_memory_bytes() {
        Some(bytes) => round_to_tenth(bytes as f64 / 1024.0 / 1024.0 / 1024.0),
        None => {
            tracing::warn!("could not determine total system memory");
            0.0
        }
    }
}

#[cfg(target_os = "linux")]
fn sysinfo_total_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(target_os = "macos")]
fn sysinfo_total_memory_bytes() -> Option<u64> {
    use std::process::Command;
    let output = Command::new("sysctl").args(["-n", "hw.memsize"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

#[cfg(target_os = "windows")]
fn sysinfo_total_memory_bytes() -> Option<u64> {
    use windows::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};
    let mut status = MEMORYSTATUSEX {
        dwLength: std::mem::size_of::<MEMORYSTATUSEX>() as u32,
        ..Default::default()
    };
    unsafe { GlobalMemoryStatusEx(&mut status).ok()? };
    Some(status.ullTotalPhys)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn sysinfo_total_memory_bytes() -> Option<u64> {
    None
}

fn logical_cpu_cores() -> usize {
    num_cpus::get().max(1)
}

fn architecture() -> String {
    std::env::consts::ARCH.to_string()
}

fn os_name() -> String {
    std::env::consts::OS.to_string()
}

fn round_to_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_reports_at_least_one_core() {
        let p = profile();
        assert!(p.logical_cpu_cores >= 1);
        assert!(!p.architecture.is_empty());
        assert!(!p.os.is_empty());
    }

    #[test]
    fn round_to_tenth_rounds_correctly() {
        assert_eq!(round_to_tenth(15.96), 16.0);
        assert_eq!(round_to_tenth(15.94), 15.9);
    }
}
