//! Administrator-supplied deployment profiles.
//!
//! A profile is a pair of partial settings documents: `defaults.json`
//! replaces built-in defaults, `locked.json` pins values the user cannot
//! change. A system-wide profile wins over a per-user one; the two are never
//! combined.

use std::io::ErrorKind;
use std::path::Path;

use serde_json::{Map, Value};

use crate::SettingsError;
use crate::migration::migrate;
use crate::paths::ProfilePaths;

const DEFAULTS_FILE: &str = "defaults.json";
const LOCKED_FILE: &str = "locked.json";

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentProfiles {
    pub defaults: Value,
    pub locked: Value,
}

impl Default for DeploymentProfiles {
    fn default() -> Self {
        Self {
            defaults: Value::Object(Map::new()),
            locked: Value::Object(Map::new()),
        }
    }
}

impl DeploymentProfiles {
    /// Read the profiles from the system directory, falling back to the user
    /// directory when the system one has neither file.
    pub async fn load(paths: &ProfilePaths) -> Result<Self, SettingsError> {
        if let Some(profiles) = Self::load_dir(&paths.system).await? {
            tracing::info!(dir = %paths.system.display(), "Using system deployment profile");
            return Ok(profiles);
        }
        if let Some(profiles) = Self::load_dir(&paths.user).await? {
            tracing::info!(dir = %paths.user.display(), "Using user deployment profile");
            return Ok(profiles);
        }
        Ok(Self::default())
    }

    /// Read both profile files from `dir`; `None` if neither exists.
    pub async fn load_dir(dir: &Path) -> Result<Option<Self>, SettingsError> {
        let defaults = read_profile(&dir.join(DEFAULTS_FILE)).await?;
        let locked = read_profile(&dir.join(LOCKED_FILE)).await?;
        if defaults.is_none() && locked.is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            defaults: defaults.unwrap_or_else(|| Value::Object(Map::new())),
            locked: locked.unwrap_or_else(|| Value::Object(Map::new())),
        }))
    }

    pub fn is_empty(&self) -> bool {
        let empty = |v: &Value| v.as_object().is_none_or(Map::is_empty);
        empty(&self.defaults) && empty(&self.locked)
    }
}

async fn read_profile(path: &Path) -> Result<Option<Value>, SettingsError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read deployment profile: {e}");
            return Err(e.into());
        }
    };
    let raw: Value = serde_json::from_str(&text).inspect_err(|e| {
        tracing::warn!(path = %path.display(), "Malformed deployment profile: {e}");
    })?;
    let mut profile = migrate(raw);
    if let Value::Object(map) = &mut profile {
        map.remove("version");
    }
    Ok(Some(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn system_profile_wins_over_user_profile() {
        let system = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        std::fs::write(
            system.path().join(LOCKED_FILE),
            r#"{"version": 10, "containerEngine": {"name": "containerd"}}"#,
        )
        .unwrap();
        std::fs::write(user.path().join(DEFAULTS_FILE), r#"{"kubernetes": {"enabled": false}}"#)
            .unwrap();

        let paths = ProfilePaths {
            system: system.path().to_path_buf(),
            user: user.path().to_path_buf(),
        };
        let profiles = DeploymentProfiles::load(&paths).await.unwrap();
        assert_eq!(profiles.locked, json!({"containerEngine": {"name": "containerd"}}));
        assert_eq!(profiles.defaults, json!({}));
    }

    #[tokio::test]
    async fn user_profile_is_migrated() {
        let system = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        std::fs::write(
            user.path().join(DEFAULTS_FILE),
            r#"{"version": 3, "kubernetes": {"containerEngine": "moby"}}"#,
        )
        .unwrap();

        let paths = ProfilePaths {
            system: system.path().to_path_buf(),
            user: user.path().to_path_buf(),
        };
        let profiles = DeploymentProfiles::load(&paths).await.unwrap();
        assert_eq!(profiles.defaults, json!({"containerEngine": {"name": "moby"}, "kubernetes": {}}));
        assert!(profiles.locked.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCKED_FILE), "{ not json").unwrap();
        let result = DeploymentProfiles::load_dir(dir.path()).await;
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[tokio::test]
    async fn missing_profiles_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProfilePaths {
            system: dir.path().join("system"),
            user: dir.path().join("user"),
        };
        assert!(DeploymentProfiles::load(&paths).await.unwrap().is_empty());
    }
}
