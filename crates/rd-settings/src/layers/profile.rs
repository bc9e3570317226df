use serde_json::{Map, Value};

use super::SettingsLayer;
use crate::SettingsError;
use crate::tree::get_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Values the administrator enforces over everything else.
    Locked,
    /// Values the administrator suggests in place of the built-in defaults.
    Defaults,
}

/// Read-only layer populated once from a deployment profile.
#[derive(Debug, Clone)]
pub struct ProfileLayer {
    kind: ProfileKind,
    tree: Value,
}

impl ProfileLayer {
    pub fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            tree: Value::Object(Map::new()),
        }
    }

    /// Replace the profile contents. Non-object documents become empty.
    pub fn populate(&mut self, tree: Value) {
        self.tree = match tree {
            Value::Object(_) => tree,
            _ => Value::Object(Map::new()),
        };
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }
}

impl SettingsLayer for ProfileLayer {
    fn name(&self) -> &'static str {
        match self.kind {
            ProfileKind::Locked => "locked",
            ProfileKind::Defaults => "profile-defaults",
        }
    }

    fn get(&self, path: &str) -> Result<Option<Value>, SettingsError> {
        Ok(get_path(&self.tree, path).cloned())
    }

    fn snapshot(&self) -> Result<Value, SettingsError> {
        Ok(self.tree.clone())
    }
}
