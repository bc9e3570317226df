//! Declarative validation of proposed settings changes.
//!
//! Rules are arranged in a [`RuleNode`] tree that mirrors the shape of the
//! settings schema. [`SettingsValidator::validate_settings`] walks only the
//! proposed changes, so fields that are not being changed are never checked.

mod canonicalize;
pub mod rules;
mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::defaults::TRANSIENT_DEFAULTS;
use crate::host::HostInfo;
use crate::tree::{self, get_path, join, render, values_equal};

use canonicalize::{SETTINGS_SYNONYMS, Synonym};

/// Outcome of validating a batch of proposed changes.
///
/// Any error blocks the commit; `fatal` and `locked` only tell the caller
/// how to react.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub modified: bool,
    pub errors: Vec<String>,
    pub fatal: bool,
    /// At least one error comes from changing an administrator-locked field.
    pub locked: bool,
}

impl ValidationResult {
    pub fn accepted(modified: bool) -> Self {
        Self {
            modified,
            ..Self::default()
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            fatal: true,
            ..Self::default()
        }
    }

    fn locked_field(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            locked: true,
            ..Self::default()
        }
    }

    /// Combine with another result: flags are OR-ed, errors concatenated.
    pub fn merge(&mut self, other: ValidationResult) {
        self.modified |= other.modified;
        self.fatal |= other.fatal;
        self.locked |= other.locked;
        self.errors.extend(other.errors);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Read-only view handed to every rule.
pub struct RuleContext<'a> {
    /// Current settings with the proposed changes applied.
    pub merged: &'a Value,
    pub host: &'a HostInfo,
    pub kubernetes_versions: &'a [String],
}

/// A rule receives the context, the current value, the proposed value and
/// the fully qualified path of the field.
pub type Rule =
    Arc<dyn Fn(&RuleContext<'_>, &Value, &Value, &str) -> ValidationResult + Send + Sync>;

pub type RuleMap = BTreeMap<&'static str, RuleNode>;

pub enum RuleNode {
    /// A scalar or list field.
    Leaf(Rule),
    /// A free-form mapping validated as a whole by its rule.
    Mapping(Rule),
    /// A nested group of fields.
    Subtree(RuleMap),
}

/// Validates proposed changes for one settings tree (persisted or transient).
pub struct SettingsValidator {
    rules: RuleMap,
    defaults: Arc<Value>,
    synonyms: &'static [Synonym],
    host: HostInfo,
    locked: Value,
    kubernetes_versions: Vec<String>,
}

impl SettingsValidator {
    /// Validator for persisted settings, coercing against `defaults`.
    pub fn for_settings(host: HostInfo, defaults: Arc<Value>) -> Self {
        Self {
            rules: schema::settings_rules(&host),
            defaults,
            synonyms: SETTINGS_SYNONYMS,
            host,
            locked: Value::Object(Map::new()),
            kubernetes_versions: Vec::new(),
        }
    }

    /// Validator for the transient (session-only) settings.
    pub fn for_transient(host: HostInfo) -> Self {
        Self {
            rules: schema::transient_rules(),
            defaults: Arc::clone(&TRANSIENT_DEFAULTS),
            synonyms: &[],
            host,
            locked: Value::Object(Map::new()),
            kubernetes_versions: Vec::new(),
        }
    }

    /// Install the administrator-locked snapshot; changes to these paths are rejected.
    pub fn set_locked_settings(&mut self, locked: Value) {
        self.locked = locked;
    }

    /// Install the list of Kubernetes versions the version rule accepts.
    pub fn set_kubernetes_versions(&mut self, versions: Vec<String>) {
        self.kubernetes_versions = versions;
    }

    /// Rewrite aliases and coerce stringly-typed booleans and numbers in place.
    pub fn canonicalize_synonyms(&self, proposed: &mut Value) {
        canonicalize::canonicalize(proposed, &self.defaults, self.synonyms, "");
    }

    /// Check `proposed` (a partial tree) against `current` (a full tree).
    ///
    /// Never fails: every outcome is encoded in the returned result.
    pub fn validate_settings(&self, current: &Value, proposed: &Value) -> ValidationResult {
        let Some(changes) = proposed.as_object() else {
            return ValidationResult::fatal(format!(
                "Proposed settings should be an object, but got <{}>.",
                render(proposed)
            ));
        };

        let mut merged = current.as_object().cloned().unwrap_or_default();
        tree::merge_removing_nulls(&mut merged, &mut changes.clone());
        let merged = Value::Object(merged);
        let ctx = RuleContext {
            merged: &merged,
            host: &self.host,
            kubernetes_versions: &self.kubernetes_versions,
        };

        let mut result = self.check_proposed(&ctx, &self.rules, Some(current), changes, "");
        if !result.errors.is_empty() {
            result.modified = false;
        }
        result
    }

    fn check_proposed(
        &self,
        ctx: &RuleContext<'_>,
        rules: &RuleMap,
        current: Option<&Value>,
        proposed: &Map<String, Value>,
        prefix: &str,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        for (key, proposed_value) in proposed {
            let path = join(prefix, key);
            let current_value = current.and_then(|c| c.get(key.as_str()));
            let outcome = match rules.get(key.as_str()) {
                None => ValidationResult::rejected(format!(
                    "Changing field \"{path}\" via the API isn't supported."
                )),
                Some(RuleNode::Subtree(nested)) => match proposed_value.as_object() {
                    Some(inner) => self.check_proposed(ctx, nested, current_value, inner, &path),
                    None => ValidationResult::rejected(format!(
                        "Setting \"{path}\" should wrap an inner object, but got <{}>.",
                        render(proposed_value)
                    )),
                },
                Some(RuleNode::Leaf(_)) if proposed_value.is_object() => {
                    ValidationResult::rejected(format!(
                        "Setting \"{path}\" should be a simple value, but got <{}>.",
                        render(proposed_value)
                    ))
                }
                Some(RuleNode::Leaf(rule)) => {
                    let current_value = current_value.unwrap_or(&Value::Null);
                    self.check_leaf(ctx, rule, current_value, proposed_value, &path, false)
                }
                Some(RuleNode::Mapping(rule)) => {
                    let current_value = current_value.unwrap_or(&Value::Null);
                    self.check_leaf(ctx, rule, current_value, proposed_value, &path, true)
                }
            };
            result.merge(outcome);
        }
        result
    }

    fn check_leaf(
        &self,
        ctx: &RuleContext<'_>,
        rule: &Rule,
        current: &Value,
        proposed: &Value,
        path: &str,
        per_key: bool,
    ) -> ValidationResult {
        if values_equal(current, proposed) {
            return ValidationResult::accepted(false);
        }
        if let Some(locked) = self.check_locked(path, proposed, per_key) {
            return locked;
        }
        rule(ctx, current, proposed, path)
    }

    /// Reject a proposal that changes a locked value.
    ///
    /// For open mappings (`per_key`) only the locked entries are pinned;
    /// entries the lock does not mention may change freely.
    fn check_locked(&self, path: &str, proposed: &Value, per_key: bool) -> Option<ValidationResult> {
        let locked = get_path(&self.locked, path)?;
        let (Value::Object(locked_entries), Value::Object(proposed_entries), true) =
            (locked, proposed, per_key)
        else {
            if values_equal(locked, proposed) {
                return None;
            }
            return Some(ValidationResult::locked_field(format!(
                "Field \"{path}\" is locked."
            )));
        };

        let mut result = ValidationResult::default();
        for (key, pinned) in locked_entries {
            match proposed_entries.get(key) {
                Some(value) if !values_equal(pinned, value) => {
                    result.merge(ValidationResult::locked_field(format!(
                        "Field \"{}\" is locked.",
                        join(path, key)
                    )));
                }
                _ => {}
            }
        }
        (!result.is_ok()).then_some(result)
    }
}
