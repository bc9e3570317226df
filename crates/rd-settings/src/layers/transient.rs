use std::sync::Arc;

use serde_json::{Map, Value};

use super::{SettingsLayer, WritableLayer};
use crate::defaults::TRANSIENT_DEFAULTS;
use crate::host::HostInfo;
use crate::tree::{get_in, get_path, has_path, merge_removing_nulls, project, set_path};
use crate::{SettingsError, SettingsValidator, ValidationResult};

/// Session-only settings, reset on every start and never persisted.
///
/// Through the [`SettingsLayer`] view the layer only exposes values at
/// paths that also exist in the persisted settings schema; the rest of its
/// tree (dialog suppression, first-run flag, preference navigation) is read
/// through [`TransientLayer::get_transient`].
pub struct TransientLayer {
    tree: Map<String, Value>,
    validator: SettingsValidator,
    settings_shape: Arc<Value>,
}

impl TransientLayer {
    pub fn new(host: HostInfo, settings_shape: Arc<Value>) -> Self {
        let mut layer = Self {
            tree: Map::new(),
            validator: SettingsValidator::for_transient(host),
            settings_shape,
        };
        layer.reset();
        layer
    }

    /// Restore the transient defaults.
    pub fn reset(&mut self) {
        self.tree = TRANSIENT_DEFAULTS.as_object().cloned().unwrap_or_default();
    }

    pub fn get_transient(&self, path: &str) -> Option<&Value> {
        get_in(&self.tree, path)
    }

    pub fn tree(&self) -> Value {
        Value::Object(self.tree.clone())
    }
}

impl SettingsLayer for TransientLayer {
    fn name(&self) -> &'static str {
        "transient"
    }

    fn get(&self, path: &str) -> Result<Option<Value>, SettingsError> {
        let Some(shape) = get_path(&self.settings_shape, path) else {
            return Ok(None);
        };
        Ok(self.get_transient(path).map(|v| project(v, shape)))
    }

    fn snapshot(&self) -> Result<Value, SettingsError> {
        Ok(project(&self.tree(), &self.settings_shape))
    }
}

impl WritableLayer for TransientLayer {
    fn set(&mut self, path: &str, value: Value) -> Result<bool, SettingsError> {
        if !has_path(&TRANSIENT_DEFAULTS, path) {
            return Ok(false);
        }
        set_path(&mut self.tree, path, value);
        Ok(true)
    }

    fn merge(&mut self, mut changes: Value) -> Result<ValidationResult, SettingsError> {
        self.validator.canonicalize_synonyms(&mut changes);
        let result = self.validator.validate_settings(&self.tree(), &changes);
        if result.is_ok() {
            if let Value::Object(mut delta) = changes {
                merge_removing_nulls(&mut self.tree, &mut delta);
            }
        }
        Ok(result)
    }
}
