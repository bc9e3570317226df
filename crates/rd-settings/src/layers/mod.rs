//! The settings layers stacked by [`SettingsManager`](crate::SettingsManager).

mod defaults;
mod profile;
mod transient;
mod user;

pub use defaults::HardDefaults;
pub use profile::{ProfileKind, ProfileLayer};
pub use transient::TransientLayer;
pub use user::{LoadOutcome, UserLayer};

use serde_json::Value;

use crate::{SettingsError, ValidationResult};

/// A read-only provider of (possibly partial) settings.
pub trait SettingsLayer {
    fn name(&self) -> &'static str;

    /// The value this layer holds at `path`, or `None` if it does not set it.
    fn get(&self, path: &str) -> Result<Option<Value>, SettingsError>;

    /// Everything this layer holds.
    fn snapshot(&self) -> Result<Value, SettingsError>;
}

/// A layer the application itself writes to.
pub trait WritableLayer: SettingsLayer {
    /// Unchecked single-field assignment for trusted internal callers.
    ///
    /// Returns `Ok(false)` when `path` is not part of this layer's schema.
    fn set(&mut self, path: &str, value: Value) -> Result<bool, SettingsError>;

    /// Validate `changes` and apply them only if there are no errors.
    fn merge(&mut self, changes: Value) -> Result<ValidationResult, SettingsError>;
}
