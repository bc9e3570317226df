//! Forward migration of stored settings documents.
//!
//! Each step upgrades a document from version `n` to `n + 1` in place.
//! Steps only reshape the document; missing fields are filled in later by
//! the defaults layer, and unknown fields are carried through untouched.

use serde_json::{Map, Value};

use crate::defaults::CURRENT_SETTINGS_VERSION;
use crate::tree::{move_path, remove_path, set_path};

type Step = fn(&mut Map<String, Value>);

/// Registered steps, keyed by the version they upgrade from.
const STEPS: &[(u64, Step)] = &[
    (1, drop_rancher_mode),
    (2, rename_docker_engine),
    (4, restructure_application),
    (5, rename_image_allow_list),
    (6, rekey_installed_extensions),
    (7, promote_vm_settings),
    (9, drop_obsolete_fields),
];

/// Read the `version` field; absent or non-numeric means 0.
pub fn document_version(doc: &Map<String, Value>) -> u64 {
    match doc.get("version") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Upgrade `raw` to the current schema version.
///
/// An empty or non-object document is a first run and yields an empty tree.
/// Documents from a newer version are returned unchanged.
pub fn migrate(raw: Value) -> Value {
    let mut doc = match raw {
        Value::Object(map) if !map.is_empty() => map,
        _ => return Value::Object(Map::new()),
    };

    let version = document_version(&doc);
    if version > CURRENT_SETTINGS_VERSION {
        tracing::warn!(
            version,
            current = CURRENT_SETTINGS_VERSION,
            "Settings document is from a newer version; leaving it as is"
        );
        return Value::Object(doc);
    }

    for from in version..CURRENT_SETTINGS_VERSION {
        if let Some((_, step)) = STEPS.iter().find(|(v, _)| *v == from) {
            tracing::debug!(from, to = from + 1, "Applying settings migration step");
            step(&mut doc);
        }
    }
    doc.insert("version".into(), Value::from(CURRENT_SETTINGS_VERSION));
    Value::Object(doc)
}

fn drop_rancher_mode(doc: &mut Map<String, Value>) {
    remove_path(doc, "kubernetes.rancherMode");
}

fn rename_docker_engine(doc: &mut Map<String, Value>) {
    let engine = doc
        .get("kubernetes")
        .and_then(|k| k.get("containerEngine"))
        .and_then(Value::as_str);
    if engine == Some("docker") {
        set_path(doc, "kubernetes.containerEngine", Value::from("moby"));
    }
}

fn restructure_application(doc: &mut Map<String, Value>) {
    if let Some(suppress) = remove_path(doc, "kubernetes.suppressSudo") {
        if let Some(suppress) = suppress.as_bool() {
            set_path(doc, "application.adminAccess", Value::Bool(!suppress));
        }
    }
    move_path(doc, "debug", "application.debug");
    move_path(doc, "pathManagementStrategy", "application.pathManagementStrategy");
    for key in ["telemetry", "updater"] {
        if let Some(value) = doc.remove(key) {
            let value = match value {
                Value::Bool(enabled) => serde_json::json!({ "enabled": enabled }),
                other => other,
            };
            set_path(doc, &format!("application.{key}"), value);
        }
    }
    move_path(doc, "kubernetes.containerEngine", "containerEngine.name");
    move_path(doc, "kubernetes.memoryInGB", "virtualMachine.memoryInGB");
    move_path(doc, "kubernetes.numberCPUs", "virtualMachine.numberCPUs");
    move_path(doc, "kubernetes.WSLIntegrations", "WSL.integrations");
    remove_path(doc, "kubernetes.checkForExistingKimBuilder");
}

fn rename_image_allow_list(doc: &mut Map<String, Value>) {
    move_path(doc, "containerEngine.imageAllowList", "containerEngine.allowedImages");
}

/// `{"image:tag": true}` becomes `{"image": "tag"}`; disabled entries are dropped.
fn rekey_installed_extensions(doc: &mut Map<String, Value>) {
    let Some(Value::Object(installed)) = remove_path(doc, "application.extensions.installed")
    else {
        return;
    };
    let mut rekeyed = Map::new();
    for (id, enabled) in installed {
        match enabled {
            Value::Bool(true) => {
                let (image, tag) = split_image_tag(&id);
                rekeyed.insert(image.to_string(), Value::from(tag));
            }
            Value::String(_) => {
                rekeyed.insert(id, enabled);
            }
            _ => {}
        }
    }
    set_path(doc, "application.extensions.installed", Value::Object(rekeyed));
}

/// Split an image reference at its tag; a registry port is not a tag.
fn split_image_tag(id: &str) -> (&str, &str) {
    match id.rsplit_once(':') {
        Some((image, tag)) if !tag.contains('/') => (image, tag),
        _ => (id, "latest"),
    }
}

fn promote_vm_settings(doc: &mut Map<String, Value>) {
    move_path(doc, "experimental.virtualMachine.type", "virtualMachine.type");
    move_path(doc, "experimental.virtualMachine.useRosetta", "virtualMachine.useRosetta");
    move_path(doc, "experimental.virtualMachine.mount.type", "virtualMachine.mount.type");
}

fn drop_obsolete_fields(doc: &mut Map<String, Value>) {
    remove_path(doc, "virtualMachine.hostResolver");
    remove_path(doc, "kubernetes.experimental");
}
