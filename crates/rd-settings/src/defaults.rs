//! The settings schema expressed as its default values.
//!
//! Every path that exists in the settings tree has a default here; the type
//! of each default is the declared type of that path.

use std::sync::{Arc, LazyLock};

use serde_json::{Value, json};

use crate::host::{HostInfo, Os};

/// Schema version written to the `version` field of persisted documents.
pub const CURRENT_SETTINGS_VERSION: u64 = 10;

pub const CONTAINER_ENGINES: &[&str] = &["containerd", "moby"];
pub const MOBY_STORAGE_DRIVERS: &[&str] = &["classic", "snapshotter", "auto"];
pub const VM_TYPES: &[&str] = &[VM_TYPE_QEMU, VM_TYPE_VZ];
pub const VM_TYPE_QEMU: &str = "qemu";
pub const VM_TYPE_VZ: &str = "vz";
pub const MOUNT_TYPES: &[&str] = &[MOUNT_TYPE_REVERSE_SSHFS, MOUNT_TYPE_9P, MOUNT_TYPE_VIRTIOFS];
pub const MOUNT_TYPE_REVERSE_SSHFS: &str = "reverse-sshfs";
pub const MOUNT_TYPE_9P: &str = "9p";
pub const MOUNT_TYPE_VIRTIOFS: &str = "virtiofs";
pub const PATH_MANAGEMENT_STRATEGIES: &[&str] = &["manual", "rcfiles"];
pub const SECURITY_MODELS: &[&str] = &["passthrough", "mapped-xattr", "mapped-file", "none"];
pub const PROTOCOL_VERSIONS: &[&str] = &["9p2000", "9p2000.u", "9p2000.L"];
pub const CACHE_MODES: &[&str] = &["none", "loose", "fscache", "mmap"];

/// Preference pages and the tabs each one offers.
pub const NAV_ITEMS: &[(&str, &[&str])] = &[
    ("Application", &["general", "behavior", "environment"]),
    ("WSL", &["integrations", "network", "proxy"]),
    ("Virtual Machine", &["hardware", "volumes", "network", "emulation"]),
    ("Container Engine", &["general", "allowed-images"]),
    ("Kubernetes", &[]),
];

/// Defaults computed for the running host, fixed for the process lifetime.
pub static DEFAULT_SETTINGS: LazyLock<Arc<Value>> =
    LazyLock::new(|| Arc::new(settings_defaults(&HostInfo::detect())));

/// Defaults of the transient (never persisted) settings.
pub static TRANSIENT_DEFAULTS: LazyLock<Arc<Value>> =
    LazyLock::new(|| Arc::new(transient_defaults()));

/// Default VM memory: a quarter of host RAM, at most 6 GiB, on VM-backed hosts.
pub fn default_memory_gb(host: &HostInfo) -> u64 {
    if host.os.is_lima() {
        (host.total_memory_gb / 4.0).round().min(6.0) as u64
    } else {
        2
    }
}

/// Build the full defaults tree for `host`.
pub fn settings_defaults(host: &HostInfo) -> Value {
    let path_management = if host.os == Os::Windows { "manual" } else { "rcfiles" };
    json!({
        "version": CURRENT_SETTINGS_VERSION,
        "application": {
            "adminAccess": false,
            "debug": false,
            "extensions": {
                "allowed": { "enabled": false, "list": [] },
                "installed": {},
            },
            "pathManagementStrategy": path_management,
            "telemetry": { "enabled": true },
            "updater": { "enabled": true },
            "autoStart": false,
            "startInBackground": false,
            "hideNotificationIcon": false,
            "window": { "quitOnClose": false },
        },
        "containerEngine": {
            "allowedImages": { "enabled": false, "patterns": [] },
            "name": "moby",
            "mobyStorageDriver": "auto",
        },
        "virtualMachine": {
            "memoryInGB": default_memory_gb(host),
            "numberCPUs": 2,
            "useRosetta": false,
            "type": VM_TYPE_QEMU,
            "mount": { "type": MOUNT_TYPE_REVERSE_SSHFS },
        },
        "WSL": { "integrations": {} },
        "kubernetes": {
            "version": "",
            "port": 6443,
            "enabled": true,
            "options": { "traefik": true, "flannel": true },
            "ingress": { "localhostOnly": false },
        },
        "portForwarding": { "includeKubernetesServices": false },
        "images": { "showAll": true, "namespace": "k8s.io" },
        "containers": { "showAll": true, "namespace": "k8s.io" },
        "diagnostics": {
            "showMuted": false,
            "mutedChecks": {},
            "connectivity": { "interval": 5000, "timeout": 5000 },
        },
        "experimental": {
            "containerEngine": { "webAssembly": { "enabled": false } },
            "virtualMachine": {
                "diskSize": "100GiB",
                "sshPortForwarder": true,
                "networkingTunnel": false,
                "mount": {
                    "9p": {
                        "securityModel": "none",
                        "protocolVersion": "9p2000.L",
                        "msizeInKib": 128,
                        "cacheMode": "mmap",
                    },
                },
                "proxy": {
                    "enabled": false,
                    "address": "",
                    "port": 3128,
                    "username": "",
                    "password": "",
                    "noproxy": ["0.0.0.0/8", "10.0.0.0/8", "127.0.0.0/8", "169.254.0.0/16", "172.16.0.0/12", "192.168.0.0/16", "224.0.0.0/4", "240.0.0.0/4"],
                },
            },
        },
    })
}

fn transient_defaults() -> Value {
    json!({
        "noModalDialogs": false,
        "application": { "isFirstRun": false },
        "preferences": {
            "navItem": {
                "current": "Application",
                "currentTabs": {
                    "Application": "general",
                    "WSL": "integrations",
                    "Virtual Machine": "hardware",
                    "Container Engine": "general",
                },
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::get_path;

    fn host(os: Os, total_memory_gb: f64) -> HostInfo {
        HostInfo {
            os,
            arm64: false,
            under_translation: false,
            total_memory_gb,
            cpu_count: 8,
        }
    }

    #[test]
    fn memory_default_scales_with_host() {
        assert_eq!(default_memory_gb(&host(Os::Linux, 16.0)), 4);
        assert_eq!(default_memory_gb(&host(Os::Darwin, 64.0)), 6);
        assert_eq!(default_memory_gb(&host(Os::Windows, 64.0)), 2);
    }

    #[test]
    fn defaults_carry_current_version() {
        let defaults = settings_defaults(&host(Os::Linux, 8.0));
        assert_eq!(
            get_path(&defaults, "version"),
            Some(&json!(CURRENT_SETTINGS_VERSION))
        );
        assert_eq!(get_path(&defaults, "virtualMachine.memoryInGB"), Some(&json!(2)));
    }
}
