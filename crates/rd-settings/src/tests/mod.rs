use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::defaults::settings_defaults;
use crate::host::{HostInfo, Os};
use crate::tree::set_path;
use crate::{SettingsManager, SettingsValidator};

fn host(os: Os, arm64: bool) -> HostInfo {
    HostInfo {
        os,
        arm64,
        under_translation: false,
        total_memory_gb: 16.0,
        cpu_count: 8,
    }
}

fn linux() -> HostInfo {
    host(Os::Linux, false)
}

fn validator_for(host: HostInfo) -> (SettingsValidator, Value) {
    let defaults = settings_defaults(&host);
    let validator = SettingsValidator::for_settings(host, Arc::new(defaults.clone()));
    (validator, defaults)
}

/// A partial tree holding `value` at `path`.
fn at(path: &str, value: Value) -> Value {
    let mut tree = Map::new();
    set_path(&mut tree, path, value);
    Value::Object(tree)
}

async fn loaded_manager(settings_path: &Path) -> SettingsManager {
    let mut manager = SettingsManager::with_host(settings_path, linux());
    manager.load_transient();
    manager.load_user().await.unwrap();
    manager
}

mod manager;
