//! Layered settings engine for the desktop container runtime.
//!
//! Settings are read through a stack of layers (locked profile, transient
//! session state, persisted user settings, profile defaults and compiled-in
//! defaults). Writes are validated against a declarative rule tree before
//! they are committed, and documents read from disk are migrated forward to
//! the current schema version.

pub mod defaults;
pub mod host;
pub mod layers;
pub mod manager;
pub mod migration;
pub mod paths;
pub mod profiles;
pub mod tree;
pub mod validation;

#[cfg(test)]
mod tests;

pub use defaults::CURRENT_SETTINGS_VERSION;
pub use host::{HostInfo, Os};
pub use manager::SettingsManager;
pub use profiles::DeploymentProfiles;
pub use validation::{SettingsValidator, ValidationResult};

/// Unified error type for the settings engine.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("User settings have not been loaded")]
    NotLoaded,

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),
}
