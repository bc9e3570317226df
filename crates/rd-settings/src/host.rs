//! Facts about the host that defaults and validation depend on.

use std::fmt;

/// Operating system family, named the way settings messages refer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Darwin,
    Linux,
    Windows,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Os::Darwin,
            "windows" => Os::Windows,
            _ => Os::Linux,
        }
    }

    /// macOS and Linux run the VM through the same backend family.
    pub fn is_lima(self) -> bool {
        matches!(self, Os::Darwin | Os::Linux)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Os::Darwin => "darwin",
            Os::Linux => "linux",
            Os::Windows => "win32",
        })
    }
}

/// Host description used to compute defaults and numeric bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct HostInfo {
    pub os: Os,
    pub arm64: bool,
    /// An x86_64 build running under ARM64 translation.
    pub under_translation: bool,
    pub total_memory_gb: f64,
    pub cpu_count: u32,
}

const FALLBACK_MEMORY_GB: f64 = 8.0;

impl HostInfo {
    /// Inspect the running host.
    pub fn detect() -> Self {
        let total_memory_gb = detect_total_memory_gb().unwrap_or_else(|| {
            tracing::debug!("Could not determine host memory, assuming {FALLBACK_MEMORY_GB} GiB");
            FALLBACK_MEMORY_GB
        });
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(2);
        Self {
            os: Os::current(),
            arm64: std::env::consts::ARCH == "aarch64",
            under_translation: detect_translation(),
            total_memory_gb,
            cpu_count,
        }
    }

    /// Whether the host can run ARM64 code natively (or via translation).
    pub fn supports_rosetta(&self) -> bool {
        self.arm64 || self.under_translation
    }
}

#[cfg(target_os = "linux")]
fn detect_total_memory_gb() -> Option<f64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib / (1024.0 * 1024.0))
}

#[cfg(target_os = "macos")]
fn detect_total_memory_gb() -> Option<f64> {
    let output = std::process::Command::new("sysctl")
        .args(["-n", "hw.memsize"])
        .output()
        .ok()?;
    let bytes: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    Some(bytes / f64::from(1u32 << 30))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn detect_total_memory_gb() -> Option<f64> {
    None
}

#[cfg(target_os = "macos")]
fn detect_translation() -> bool {
    std::process::Command::new("sysctl")
        .args(["-n", "sysctl.proc_translated"])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim() == "1")
        .unwrap_or(false)
}

#[cfg(not(target_os = "macos"))]
fn detect_translation() -> bool {
    false
}
