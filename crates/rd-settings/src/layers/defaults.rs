use std::sync::Arc;

use serde_json::Value;

use super::SettingsLayer;
use crate::SettingsError;
use crate::defaults::{DEFAULT_SETTINGS, settings_defaults};
use crate::host::HostInfo;
use crate::tree::get_path;

/// Compiled-in defaults covering every schema path. Never changes.
#[derive(Clone)]
pub struct HardDefaults {
    tree: Arc<Value>,
}

impl HardDefaults {
    /// The process-wide defaults for the running host.
    pub fn process() -> Self {
        Self {
            tree: Arc::clone(&DEFAULT_SETTINGS),
        }
    }

    pub fn for_host(host: &HostInfo) -> Self {
        Self {
            tree: Arc::new(settings_defaults(host)),
        }
    }

    /// Shared, immutable view of the defaults tree.
    pub fn tree(&self) -> &Arc<Value> {
        &self.tree
    }

    pub fn contains(&self, path: &str) -> bool {
        get_path(&self.tree, path).is_some()
    }
}

impl SettingsLayer for HardDefaults {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn get(&self, path: &str) -> Result<Option<Value>, SettingsError> {
        Ok(get_path(&self.tree, path).cloned())
    }

    fn snapshot(&self) -> Result<Value, SettingsError> {
        Ok(Value::clone(&self.tree))
    }
}
