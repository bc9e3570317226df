//! Well-known file locations.

use std::path::PathBuf;

use crate::host::Os;

const APP_DIR: &str = "rancher-desktop";
const SETTINGS_FILE: &str = "settings.json";

/// Environment variable that replaces the per-user config directory.
pub const CONFIG_DIR_ENV: &str = "RD_CONFIG_DIR";

/// Determine the per-user config directory for the application.
/// Priority: RD_CONFIG_DIR env var > <platform config dir>/rancher-desktop
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn settings_path() -> PathBuf {
    config_dir().join(SETTINGS_FILE)
}

/// Directories searched for deployment profiles, in order of precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePaths {
    pub system: PathBuf,
    pub user: PathBuf,
}

impl ProfilePaths {
    pub fn for_os(os: Os) -> Self {
        let system = match os {
            Os::Darwin => PathBuf::from("/Library/Application Support").join(APP_DIR),
            Os::Linux => PathBuf::from("/etc").join(APP_DIR),
            Os::Windows => std::env::var_os("ProgramData")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
                .join(APP_DIR),
        };
        Self {
            system,
            user: config_dir(),
        }
    }

    pub fn current() -> Self {
        Self::for_os(Os::current())
    }
}
