//! SettingsManager: the layer stack behind a single get/set surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::host::HostInfo;
use crate::layers::{
    HardDefaults, LoadOutcome, ProfileKind, ProfileLayer, SettingsLayer, TransientLayer, UserLayer,
    WritableLayer,
};
use crate::paths::ProfilePaths;
use crate::tree::deep_merge;
use crate::{DeploymentProfiles, SettingsError, SettingsValidator, ValidationResult};

/// Owns every settings layer and routes reads and writes between them.
///
/// Layers, highest priority first: locked profile, transient, user,
/// profile defaults, hard defaults. Startup must call
/// [`load_transient`](Self::load_transient),
/// [`load_deployment_profiles`](Self::load_deployment_profiles) and
/// [`load_user`](Self::load_user) in that order; reads that reach the user
/// layer before it is loaded return [`SettingsError::NotLoaded`].
pub struct SettingsManager {
    locked: ProfileLayer,
    transient: TransientLayer,
    user: UserLayer,
    profile_defaults: ProfileLayer,
    defaults: HardDefaults,
}

impl SettingsManager {
    /// Manager for the running host, persisting to `settings_path`.
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self::with_defaults(settings_path, HostInfo::detect(), HardDefaults::process())
    }

    /// Manager whose defaults and validation rules are computed for `host`.
    pub fn with_host(settings_path: impl Into<PathBuf>, host: HostInfo) -> Self {
        let defaults = HardDefaults::for_host(&host);
        Self::with_defaults(settings_path, host, defaults)
    }

    fn with_defaults(settings_path: impl Into<PathBuf>, host: HostInfo, defaults: HardDefaults) -> Self {
        let validator = SettingsValidator::for_settings(host.clone(), Arc::clone(defaults.tree()));
        Self {
            locked: ProfileLayer::new(ProfileKind::Locked),
            transient: TransientLayer::new(host, Arc::clone(defaults.tree())),
            user: UserLayer::new(settings_path, defaults.clone(), validator),
            profile_defaults: ProfileLayer::new(ProfileKind::Defaults),
            defaults,
        }
    }

    pub fn settings_path(&self) -> &Path {
        self.user.path()
    }

    fn layers(&self) -> [&dyn SettingsLayer; 5] {
        [
            &self.locked,
            &self.transient,
            &self.user,
            &self.profile_defaults,
            &self.defaults,
        ]
    }

    // -------------------------------------------------------------------
    // Load sequence
    // -------------------------------------------------------------------

    /// Start a fresh session: transient settings go back to their defaults.
    pub fn load_transient(&mut self) {
        self.transient.reset();
    }

    pub async fn load_deployment_profiles(&mut self, paths: &ProfilePaths) -> Result<(), SettingsError> {
        let profiles = DeploymentProfiles::load(paths).await?;
        self.set_deployment_profiles(profiles);
        Ok(())
    }

    /// Install deployment profiles supplied by an external loader.
    pub fn set_deployment_profiles(&mut self, profiles: DeploymentProfiles) {
        self.user
            .validator_mut()
            .set_locked_settings(profiles.locked.clone());
        self.locked.populate(profiles.locked);
        self.profile_defaults.populate(profiles.defaults);
    }

    /// Read the user document from disk.
    ///
    /// A first run flags `application.isFirstRun` in the transient layer. A
    /// document that had to be migrated is written back immediately.
    pub async fn load_user(&mut self) -> Result<LoadOutcome, SettingsError> {
        let outcome = self.user.load().await?;
        if outcome.first_run {
            self.transient.set("application.isFirstRun", Value::Bool(true))?;
        }
        if outcome.migrated {
            tracing::info!(path = %self.user.path().display(), "Writing back migrated settings");
            self.user.save().await?;
        }
        Ok(outcome)
    }

    pub async fn save(&self) -> Result<(), SettingsError> {
        self.user.save().await
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// The effective value at `path`.
    ///
    /// The first layer holding a leaf wins outright. Object values are
    /// combined: fields a higher layer sets win, the rest fall through from
    /// lower layers.
    pub fn get(&self, path: &str) -> Result<Option<Value>, SettingsError> {
        let mut merged: Option<Value> = None;
        for layer in self.layers() {
            let Some(value) = layer.get(path)? else {
                continue;
            };
            match merged.as_mut() {
                None if !value.is_object() => return Ok(Some(value)),
                None => merged = Some(value),
                Some(higher) => {
                    if value.is_object() {
                        let mut lower = value;
                        deep_merge(&mut lower, higher);
                        *higher = lower;
                    }
                }
            }
        }
        Ok(merged)
    }

    /// The fully merged settings tree.
    pub fn get_snapshot(&self) -> Result<Value, SettingsError> {
        let mut snapshot = Value::Object(Map::new());
        for layer in self.layers().iter().rev() {
            deep_merge(&mut snapshot, &layer.snapshot()?);
        }
        Ok(snapshot)
    }

    /// Settings pinned by the administrator.
    pub fn get_locked(&self) -> Value {
        self.locked.tree().clone()
    }

    pub fn get_transient(&self, path: &str) -> Option<Value> {
        self.transient.get_transient(path).cloned()
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Unchecked single-field write to the user layer.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), SettingsError> {
        if self.user.set(path, value)? {
            Ok(())
        } else {
            Err(SettingsError::UnknownSetting(path.to_string()))
        }
    }

    /// The persisted view that proposed changes are checked against:
    /// hard defaults, then profile defaults, user and locked values on top.
    fn validation_base(&self) -> Result<Value, SettingsError> {
        let mut base = Value::clone(self.defaults.tree());
        for layer in [&self.profile_defaults as &dyn SettingsLayer, &self.user, &self.locked] {
            deep_merge(&mut base, &layer.snapshot()?);
        }
        Ok(base)
    }

    /// Validated bulk write to the user layer. Nothing is applied unless the
    /// whole batch validates.
    pub fn set_bulk(&mut self, changes: Value) -> Result<ValidationResult, SettingsError> {
        let base = self.validation_base()?;
        let result = self.user.merge_with_base(changes, &base)?;
        if result.is_ok() {
            tracing::debug!(modified = result.modified, "Applied settings changes");
        } else {
            tracing::debug!(errors = ?result.errors, "Rejected settings changes");
        }
        Ok(result)
    }

    /// Validated bulk write to the transient layer.
    pub fn set_transient(&mut self, changes: Value) -> Result<ValidationResult, SettingsError> {
        self.transient.merge(changes)
    }

    /// Unchecked single-field write to the transient layer.
    pub fn set_transient_value(&mut self, path: &str, value: Value) -> bool {
        self.transient.set(path, value).unwrap_or(false)
    }

    /// Install the Kubernetes versions the validator accepts.
    pub fn set_kubernetes_versions(&mut self, versions: Vec<String>) {
        self.user.validator_mut().set_kubernetes_versions(versions);
    }
}
