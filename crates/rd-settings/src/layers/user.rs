//! The persisted user settings document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{HardDefaults, SettingsLayer, WritableLayer};
use crate::defaults::CURRENT_SETTINGS_VERSION;
use crate::migration::{document_version, migrate};
use crate::tree::{deep_merge, get_in, merge_removing_nulls, set_path};
use crate::{SettingsError, SettingsValidator, ValidationResult};

/// What happened while reading the user document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// No usable document existed; the layer starts empty.
    pub first_run: bool,
    /// The document was upgraded from an older schema version.
    pub migrated: bool,
}

/// User-modified settings, stored as JSON on disk.
///
/// The in-memory tree only holds what the user changed; everything else
/// comes from the layers below.
pub struct UserLayer {
    path: PathBuf,
    settings: Option<Map<String, Value>>,
    defaults: HardDefaults,
    validator: SettingsValidator,
}

impl UserLayer {
    pub fn new(path: impl Into<PathBuf>, defaults: HardDefaults, validator: SettingsValidator) -> Self {
        Self {
            path: path.into(),
            settings: None,
            defaults,
            validator,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.settings.is_some()
    }

    pub fn validator_mut(&mut self) -> &mut SettingsValidator {
        &mut self.validator
    }

    /// Read and migrate the document at [`Self::path`].
    ///
    /// A missing or empty file is a first run. Malformed JSON and other I/O
    /// failures are returned to the caller and leave the layer unloaded.
    pub async fn load(&mut self) -> Result<LoadOutcome, SettingsError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No settings file found, starting fresh");
                self.settings = Some(Map::new());
                return Ok(LoadOutcome {
                    first_run: true,
                    migrated: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let raw: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        let outcome = self.load_document(raw);
        tracing::info!(
            path = %self.path.display(),
            first_run = outcome.first_run,
            migrated = outcome.migrated,
            "Loaded user settings"
        );
        Ok(outcome)
    }

    /// Install an already-parsed document, migrating it forward.
    pub fn load_document(&mut self, raw: Value) -> LoadOutcome {
        let previous = match &raw {
            Value::Object(map) if !map.is_empty() => Some(document_version(map)),
            _ => None,
        };
        let migrated = match migrate(raw) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let outcome = LoadOutcome {
            first_run: previous.is_none(),
            migrated: previous.is_some_and(|v| v != document_version(&migrated)),
        };
        self.settings = Some(migrated);
        outcome
    }

    /// Write the document back as pretty-printed JSON.
    ///
    /// The file is replaced atomically through a sibling temporary file.
    pub async fn save(&self) -> Result<(), SettingsError> {
        let mut document = self.settings()?.clone();
        document
            .entry("version")
            .or_insert_with(|| Value::from(CURRENT_SETTINGS_VERSION));

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(document))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "Saved user settings");
        Ok(())
    }

    /// The user-modified settings only, without defaults filled in.
    pub fn settings(&self) -> Result<&Map<String, Value>, SettingsError> {
        self.settings.as_ref().ok_or(SettingsError::NotLoaded)
    }

    fn settings_mut(&mut self) -> Result<&mut Map<String, Value>, SettingsError> {
        self.settings.as_mut().ok_or(SettingsError::NotLoaded)
    }

    /// Defaults with the user document laid over them.
    fn effective(&self) -> Result<Value, SettingsError> {
        let mut current = Value::clone(self.defaults.tree());
        deep_merge(&mut current, &Value::Object(self.settings()?.clone()));
        Ok(current)
    }

    /// Validate `changes` against `current` and apply them if they pass.
    ///
    /// `current` is the full tree the changes are judged against; the
    /// manager passes every non-transient layer merged together.
    pub fn merge_with_base(
        &mut self,
        mut changes: Value,
        current: &Value,
    ) -> Result<ValidationResult, SettingsError> {
        self.settings()?;
        self.validator.canonicalize_synonyms(&mut changes);
        let result = self.validator.validate_settings(current, &changes);
        if result.is_ok() {
            if let Value::Object(mut delta) = changes {
                merge_removing_nulls(self.settings_mut()?, &mut delta);
            }
        }
        Ok(result)
    }
}

impl SettingsLayer for UserLayer {
    fn name(&self) -> &'static str {
        "user"
    }

    fn get(&self, path: &str) -> Result<Option<Value>, SettingsError> {
        Ok(get_in(self.settings()?, path).cloned())
    }

    fn snapshot(&self) -> Result<Value, SettingsError> {
        Ok(Value::Object(self.settings()?.clone()))
    }
}

impl WritableLayer for UserLayer {
    fn set(&mut self, path: &str, value: Value) -> Result<bool, SettingsError> {
        if !self.defaults.contains(path) {
            self.settings()?;
            return Ok(false);
        }
        set_path(self.settings_mut()?, path, value);
        Ok(true)
    }

    fn merge(&mut self, changes: Value) -> Result<ValidationResult, SettingsError> {
        let current = self.effective()?;
        self.merge_with_base(changes, &current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostInfo, Os};
    use serde_json::json;
    use std::sync::Arc;

    fn layer(path: &Path) -> UserLayer {
        let host = HostInfo {
            os: Os::Linux,
            arm64: false,
            under_translation: false,
            total_memory_gb: 16.0,
            cpu_count: 8,
        };
        let defaults = HardDefaults::for_host(&host);
        let validator = SettingsValidator::for_settings(host, Arc::clone(defaults.tree()));
        UserLayer::new(path, defaults, validator)
    }

    #[test]
    fn unloaded_layer_reports_not_loaded() {
        let user = layer(Path::new("/nonexistent/settings.json"));
        assert!(matches!(user.get("kubernetes.enabled"), Err(SettingsError::NotLoaded)));
    }

    #[test]
    fn load_document_migrates_old_versions() {
        let mut user = layer(Path::new("/nonexistent/settings.json"));
        let outcome = user.load_document(json!({"version": 2, "kubernetes": {"containerEngine": "docker"}}));
        assert!(outcome.migrated);
        assert!(!outcome.first_run);
        assert_eq!(
            user.get("version").unwrap(),
            Some(json!(CURRENT_SETTINGS_VERSION))
        );
    }

    #[test]
    fn set_rejects_paths_outside_the_schema() {
        let mut user = layer(Path::new("/nonexistent/settings.json"));
        user.load_document(Value::Null);
        assert!(!user.set("bogus.path", json!(1)).unwrap());
        assert!(user.set("kubernetes.enabled", json!(false)).unwrap());
        assert_eq!(user.get("kubernetes.enabled").unwrap(), Some(json!(false)));
    }
}
