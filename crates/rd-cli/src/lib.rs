//! Command-line overrides for the settings engine.
//!
//! Options take the form `--<dotted.path>=<value>` or `--<dotted.path> <value>`.
//! The type of the current value decides how the argument is coerced.
//! Boolean options may omit the value to mean `true`.

use rd_settings::{SettingsError, SettingsManager, ValidationResult};
use serde_json::{Map, Number, Value, json};

/// Handled before generic dispatch; writes to the transient layer.
const NO_MODAL_DIALOGS: &str = "no-modal-dialogs";

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Unrecognized command-line option {0}")]
    UnknownOption(String),

    #[error("No value provided for option {0}")]
    MissingValue(String),

    #[error("Can't evaluate --{option}={value} as {kind}")]
    InvalidValue {
        option: String,
        value: String,
        kind: &'static str,
    },

    #[error("Can't overwrite setting --{0}: it is not a simple value")]
    NotSimpleValue(String),

    #[error("Locked settings can't be changed: {}", .0.join("; "))]
    LockedField(Vec<String>),

    #[error("Fatal error in command-line options: {}", .0.join("; "))]
    FatalValidation(Vec<String>),

    #[error("Error in command-line options: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LockedField(_) => 2,
            Self::FatalValidation(_) => 3,
            _ => 1,
        }
    }

    fn from_result(result: ValidationResult) -> Self {
        if result.locked {
            Self::LockedField(result.errors)
        } else if result.fatal {
            Self::FatalValidation(result.errors)
        } else {
            Self::Validation(result.errors)
        }
    }
}

/// Apply settings options from `args` to `manager`.
///
/// Arguments before the first recognised option are ignored so that
/// launcher-specific arguments can pass through. Once an option has been
/// recognised, anything unrecognised is an error. All settings options are
/// validated and applied as a single batch.
///
/// Returns whether any persisted setting was modified.
pub fn parse_command_line_args(
    manager: &mut SettingsManager,
    args: &[String],
) -> Result<bool, CliError> {
    let mut changes = Map::new();
    let mut recognised = false;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let Some(option) = arg.strip_prefix("--").filter(|o| !o.is_empty()) else {
            if recognised {
                return Err(CliError::UnknownOption(arg.clone()));
            }
            continue;
        };
        let (name, inline) = match option.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (option, None),
        };

        if name == NO_MODAL_DIALOGS {
            let enabled = match inline {
                Some(value) => parse_bool(name, value)?,
                None => true,
            };
            let result = manager.set_transient(json!({ "noModalDialogs": enabled }))?;
            if !result.is_ok() {
                return Err(CliError::from_result(result));
            }
            recognised = true;
            continue;
        }

        let current = match manager.get(name)? {
            Some(current) => current,
            None if recognised => return Err(CliError::UnknownOption(arg.clone())),
            None => {
                tracing::debug!(arg = %arg, "Skipping unrecognised leading argument");
                continue;
            }
        };
        recognised = true;

        let value = match (&current, inline) {
            (Value::Bool(_), None) => Value::Bool(true),
            (_, Some(value)) => coerce(name, &current, value)?,
            (_, None) => match iter.next() {
                Some(value) => coerce(name, &current, value)?,
                None => return Err(CliError::MissingValue(arg.clone())),
            },
        };
        rd_settings::tree::set_path(&mut changes, name, value);
    }

    if changes.is_empty() {
        return Ok(false);
    }
    let result = manager.set_bulk(Value::Object(changes))?;
    if !result.is_ok() {
        return Err(CliError::from_result(result));
    }
    tracing::info!(modified = result.modified, "Applied command-line settings");
    Ok(result.modified)
}

fn coerce(name: &str, current: &Value, value: &str) -> Result<Value, CliError> {
    match current {
        Value::Bool(_) => parse_bool(name, value).map(Value::Bool),
        Value::Number(_) => parse_number(value)
            .map(Value::Number)
            .ok_or_else(|| invalid(name, value, "a number")),
        Value::String(_) => Ok(Value::String(value.to_string())),
        _ => Err(CliError::NotSimpleValue(name.to_string())),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, CliError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(name, value, "a boolean")),
    }
}

fn parse_number(value: &str) -> Option<Number> {
    if let Ok(n) = value.parse::<i64>() {
        return Some(n.into());
    }
    value.parse::<f64>().ok().and_then(Number::from_f64)
}

fn invalid(name: &str, value: &str, kind: &'static str) -> CliError {
    CliError::InvalidValue {
        option: name.to_string(),
        value: value.to_string(),
        kind,
    }
}
