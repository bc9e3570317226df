//! Rule trees for the persisted and transient settings.

use serde_json::Value;

use super::rules::*;
use super::{Rule, RuleMap, RuleNode, ValidationResult};
use crate::defaults::*;
use crate::host::{HostInfo, Os};
use crate::tree::get_path;

fn leaf(rule: Rule) -> RuleNode {
    RuleNode::Leaf(rule)
}

fn mapping(rule: Rule) -> RuleNode {
    RuleNode::Mapping(rule)
}

fn subtree<const N: usize>(entries: [(&'static str, RuleNode); N]) -> RuleNode {
    RuleNode::Subtree(RuleMap::from(entries))
}

fn boolean() -> RuleNode {
    leaf(check_boolean())
}

pub(super) fn settings_rules(host: &HostInfo) -> RuleMap {
    let max_memory = host.total_memory_gb.max(1.0);
    let max_cpus = f64::from(host.cpu_count.max(1));

    RuleMap::from([
        ("version", leaf(check_unchanged())),
        (
            "application",
            subtree([
                ("adminAccess", leaf(check_lima(check_boolean()))),
                ("debug", boolean()),
                (
                    "extensions",
                    subtree([
                        (
                            "allowed",
                            subtree([
                                ("enabled", boolean()),
                                ("list", leaf(check_unique_string_array())),
                            ]),
                        ),
                        ("installed", mapping(check_string_mapping())),
                    ]),
                ),
                (
                    "pathManagementStrategy",
                    leaf(check_lima(check_enum(PATH_MANAGEMENT_STRATEGIES))),
                ),
                ("telemetry", subtree([("enabled", boolean())])),
                ("updater", subtree([("enabled", boolean())])),
                ("autoStart", boolean()),
                ("startInBackground", boolean()),
                ("hideNotificationIcon", boolean()),
                ("window", subtree([("quitOnClose", boolean())])),
            ]),
        ),
        (
            "containerEngine",
            subtree([
                (
                    "allowedImages",
                    subtree([
                        ("enabled", boolean()),
                        ("patterns", leaf(check_unique_string_array())),
                    ]),
                ),
                ("name", leaf(check_enum(CONTAINER_ENGINES))),
                ("mobyStorageDriver", leaf(check_enum(MOBY_STORAGE_DRIVERS))),
            ]),
        ),
        (
            "virtualMachine",
            subtree([
                ("memoryInGB", leaf(check_lima(check_number(1.0, max_memory)))),
                ("numberCPUs", leaf(check_lima(check_number(1.0, max_cpus)))),
                ("useRosetta", leaf(check_platform(&[Os::Darwin], check_rosetta()))),
                ("type", leaf(check_platform(&[Os::Darwin], check_vm_type()))),
                ("mount", subtree([("type", leaf(check_lima(check_mount_type())))])),
            ]),
        ),
        (
            "WSL",
            subtree([(
                "integrations",
                mapping(check_platform(&[Os::Windows], check_boolean_mapping())),
            )]),
        ),
        (
            "kubernetes",
            subtree([
                ("version", leaf(check_kubernetes_version())),
                ("port", leaf(check_number(1.0, 65535.0))),
                ("enabled", boolean()),
                (
                    "options",
                    subtree([("traefik", boolean()), ("flannel", boolean())]),
                ),
                (
                    "ingress",
                    subtree([(
                        "localhostOnly",
                        leaf(check_platform(&[Os::Windows], check_boolean())),
                    )]),
                ),
            ]),
        ),
        (
            "portForwarding",
            subtree([("includeKubernetesServices", boolean())]),
        ),
        (
            "images",
            subtree([("showAll", boolean()), ("namespace", leaf(check_string()))]),
        ),
        (
            "containers",
            subtree([("showAll", boolean()), ("namespace", leaf(check_string()))]),
        ),
        (
            "diagnostics",
            subtree([
                ("showMuted", boolean()),
                ("mutedChecks", mapping(check_boolean_mapping())),
                (
                    "connectivity",
                    subtree([
                        ("interval", leaf(check_number(0.0, f64::from(u32::MAX)))),
                        ("timeout", leaf(check_number(1.0, f64::from(u32::MAX)))),
                    ]),
                ),
            ]),
        ),
        (
            "experimental",
            subtree([
                (
                    "containerEngine",
                    subtree([("webAssembly", subtree([("enabled", boolean())]))]),
                ),
                (
                    "virtualMachine",
                    subtree([
                        ("diskSize", leaf(check_unchanged())),
                        ("sshPortForwarder", leaf(check_lima(check_boolean()))),
                        (
                            "networkingTunnel",
                            leaf(check_platform(&[Os::Windows], check_boolean())),
                        ),
                        (
                            "mount",
                            subtree([(
                                "9p",
                                subtree([
                                    ("securityModel", leaf(check_lima(check_enum(SECURITY_MODELS)))),
                                    ("protocolVersion", leaf(check_lima(check_enum(PROTOCOL_VERSIONS)))),
                                    ("msizeInKib", leaf(check_lima(check_number(4.0, f64::from(u32::MAX))))),
                                    ("cacheMode", leaf(check_lima(check_enum(CACHE_MODES)))),
                                ]),
                            )]),
                        ),
                        (
                            "proxy",
                            subtree([
                                ("enabled", leaf(check_platform(&[Os::Windows], check_boolean()))),
                                ("address", leaf(check_platform(&[Os::Windows], check_string()))),
                                ("port", leaf(check_platform(&[Os::Windows], check_number(1.0, 65535.0)))),
                                ("username", leaf(check_platform(&[Os::Windows], check_string()))),
                                ("password", leaf(check_platform(&[Os::Windows], check_string()))),
                                ("noproxy", leaf(check_platform(&[Os::Windows], check_unique_string_array()))),
                            ]),
                        ),
                    ]),
                ),
            ]),
        ),
    ])
}

pub(super) fn transient_rules() -> RuleMap {
    RuleMap::from([
        ("noModalDialogs", boolean()),
        ("application", subtree([("isFirstRun", leaf(check_unchanged()))])),
        (
            "preferences",
            subtree([(
                "navItem",
                subtree([
                    ("current", leaf(check_nav_item())),
                    ("currentTabs", mapping(check_nav_tabs())),
                ]),
            )]),
        ),
    ])
}

fn merged_str<'a>(merged: &'a Value, path: &str) -> Option<&'a str> {
    get_path(merged, path).and_then(Value::as_str)
}

/// Rosetta needs the VZ backend and an ARM64 host.
fn check_rosetta() -> Rule {
    let boolean = check_boolean();
    rule(move |ctx, current, proposed, path| {
        let enabling = proposed.as_bool() == Some(true) && current.as_bool() != Some(true);
        if enabling {
            if merged_str(ctx.merged, "virtualMachine.type") != Some(VM_TYPE_VZ) {
                return ValidationResult::rejected(format!(
                    "Setting \"{path}\" can only be enabled when virtualMachine.type is \"{VM_TYPE_VZ}\"."
                ));
            }
            if !ctx.host.supports_rosetta() {
                return ValidationResult::rejected(format!(
                    "Setting \"{path}\" can only be enabled on aarch64 systems."
                ));
            }
        }
        boolean(ctx, current, proposed, path)
    })
}

/// VZ cannot be combined with 9p mounts.
fn check_vm_type() -> Rule {
    let valid = check_enum(VM_TYPES);
    rule(move |ctx, current, proposed, path| {
        let mut result = valid(ctx, current, proposed, path);
        if result.is_ok()
            && proposed.as_str() == Some(VM_TYPE_VZ)
            && merged_str(ctx.merged, "virtualMachine.mount.type") == Some(MOUNT_TYPE_9P)
        {
            result = ValidationResult::rejected(format!(
                "Setting \"{path}\" to \"{VM_TYPE_VZ}\" requires that virtualMachine.mount.type is \"{MOUNT_TYPE_REVERSE_SSHFS}\" or \"{MOUNT_TYPE_VIRTIOFS}\"."
            ));
        }
        result
    })
}

/// virtiofs needs the platform's native VM backend.
fn check_mount_type() -> Rule {
    let valid = check_enum(MOUNT_TYPES);
    rule(move |ctx, current, proposed, path| {
        let mut result = valid(ctx, current, proposed, path);
        if result.is_ok() && proposed.as_str() == Some(MOUNT_TYPE_VIRTIOFS) {
            let required = if ctx.host.os == Os::Darwin {
                VM_TYPE_VZ
            } else {
                VM_TYPE_QEMU
            };
            if merged_str(ctx.merged, "virtualMachine.type") != Some(required) {
                result = ValidationResult::rejected(format!(
                    "Setting \"{path}\" to \"{MOUNT_TYPE_VIRTIOFS}\" requires that virtualMachine.type is \"{required}\"."
                ));
            }
        }
        result
    })
}

fn check_kubernetes_version() -> Rule {
    rule(|ctx, _, proposed, path| {
        let Some(version) = proposed.as_str() else {
            return ValidationResult::rejected(invalid_value(path, proposed));
        };
        let enabled = get_path(ctx.merged, "kubernetes.enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !enabled && version.is_empty() {
            return ValidationResult::accepted(true);
        }
        if ctx.kubernetes_versions.is_empty()
            || ctx.kubernetes_versions.iter().any(|v| v == version)
        {
            return ValidationResult::accepted(true);
        }
        ValidationResult::rejected(format!("Kubernetes version \"{version}\" not found."))
    })
}

fn check_nav_item() -> Rule {
    rule(|_, _, proposed, path| {
        let known = proposed
            .as_str()
            .is_some_and(|name| NAV_ITEMS.iter().any(|(item, _)| *item == name));
        if known {
            ValidationResult::accepted(true)
        } else {
            ValidationResult::fatal(invalid_value(path, proposed))
        }
    })
}

/// Each preference page maps to one of its own tabs.
fn check_nav_tabs() -> Rule {
    rule(|_, _, proposed, path| {
        let Some(entries) = proposed.as_object() else {
            return ValidationResult::rejected(invalid_value(path, proposed));
        };
        let mut result = ValidationResult::accepted(true);
        for (page, tab) in entries {
            let tabs = NAV_ITEMS
                .iter()
                .find(|(item, _)| *item == page.as_str())
                .map(|(_, tabs)| *tabs);
            let valid = match (tabs, tab.as_str()) {
                (Some(tabs), Some(tab)) => tabs.contains(&tab),
                _ => false,
            };
            if !valid {
                result.merge(ValidationResult::fatal(invalid_value(
                    &format!("{path}.{page}"),
                    tab,
                )));
            }
        }
        if !result.is_ok() {
            result.modified = false;
        }
        result
    })
}
