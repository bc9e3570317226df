use serde_json::{Value, json};

use super::{host, linux, loaded_manager};
use crate::defaults::settings_defaults;
use crate::host::Os;
use crate::{DeploymentProfiles, SettingsError, SettingsManager, ValidationResult};

#[tokio::test]
async fn test_fresh_install() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let manager = loaded_manager(&path).await;

    assert_eq!(manager.get_transient("application.isFirstRun"), Some(json!(true)));
    assert_eq!(manager.get_snapshot().unwrap(), settings_defaults(&linux()));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_get_before_load_fails() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SettingsManager::with_host(dir.path().join("settings.json"), linux());
    assert!(matches!(
        manager.get("kubernetes.enabled"),
        Err(SettingsError::NotLoaded)
    ));
}

#[tokio::test]
async fn test_locked_layer_wins() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{"version": 10, "kubernetes": {"enabled": false}}"#,
    )
    .unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    assert_eq!(manager.get("kubernetes.enabled").unwrap(), Some(json!(false)));

    manager.set_deployment_profiles(DeploymentProfiles {
        defaults: json!({}),
        locked: json!({"kubernetes": {"enabled": true}}),
    });
    assert_eq!(manager.get("kubernetes.enabled").unwrap(), Some(json!(true)));
    assert_eq!(manager.get_locked(), json!({"kubernetes": {"enabled": true}}));
    assert_eq!(manager.get_snapshot().unwrap()["kubernetes"]["enabled"], json!(true));
}

#[tokio::test]
async fn test_object_reads_merge_across_layers() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set_deployment_profiles(DeploymentProfiles {
        defaults: json!({"kubernetes": {"options": {"flannel": false}, "port": 7443}}),
        locked: json!({"kubernetes": {"options": {"traefik": false}}}),
    });
    manager.set("kubernetes.port", json!(8443)).unwrap();

    let kubernetes = manager.get("kubernetes").unwrap().unwrap();
    assert_eq!(kubernetes["options"], json!({"traefik": false, "flannel": false}));
    assert_eq!(kubernetes["port"], json!(8443));
    assert_eq!(kubernetes["enabled"], json!(true));
    assert_eq!(manager.get("kubernetes.port").unwrap(), Some(json!(8443)));
}

#[tokio::test]
async fn test_locked_field_rejected_by_bulk_set() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set_deployment_profiles(DeploymentProfiles {
        defaults: json!({}),
        locked: json!({"containerEngine": {"name": "moby"}}),
    });

    let result = manager
        .set_bulk(json!({"containerEngine": {"name": "containerd"}}))
        .unwrap();
    assert!(result.locked);
    assert_eq!(manager.get("containerEngine.name").unwrap(), Some(json!("moby")));
}

#[tokio::test]
async fn test_bulk_set_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set_bulk(json!({"kubernetes": {"port": 7000}})).unwrap();
    let before = manager.get_snapshot().unwrap();

    let result = manager
        .set_bulk(json!({
            "kubernetes": {"enabled": false, "port": 7001},
            "containerEngine": {"name": "pikachu"},
        }))
        .unwrap();
    assert!(result.fatal);
    assert_eq!(manager.get_snapshot().unwrap(), before);
}

#[tokio::test]
async fn test_bulk_set_canonicalizes() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set_bulk(json!({"containerEngine": {"name": "containerd"}})).unwrap();

    let result = manager
        .set_bulk(json!({"containerEngine": {"name": "docker"}, "kubernetes": {"port": "7443"}}))
        .unwrap();
    assert!(result.is_ok(), "{:?}", result.errors);
    assert!(result.modified);
    assert_eq!(manager.get("containerEngine.name").unwrap(), Some(json!("moby")));
    assert_eq!(manager.get("kubernetes.port").unwrap(), Some(json!(7443)));
}

#[tokio::test]
async fn test_kubernetes_versions_are_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set_kubernetes_versions(vec!["1.29.1".into()]);

    let result = manager.set_bulk(json!({"kubernetes": {"version": "1.27.0"}})).unwrap();
    assert!(!result.is_ok());
    let result = manager.set_bulk(json!({"kubernetes": {"version": "v1.29.1"}})).unwrap();
    assert!(result.is_ok());
    assert_eq!(manager.get("kubernetes.version").unwrap(), Some(json!("1.29.1")));
}

#[tokio::test]
async fn test_unchecked_set() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set("application.debug", json!(true)).unwrap();
    assert_eq!(manager.get("application.debug").unwrap(), Some(json!(true)));
    assert!(matches!(
        manager.set("application.nonsense", json!(true)),
        Err(SettingsError::UnknownSetting(path)) if path == "application.nonsense"
    ));
}

#[tokio::test]
async fn test_transient_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;

    let result = manager.set_transient(json!({"noModalDialogs": true})).unwrap();
    assert!(result.is_ok());
    assert_eq!(manager.get_transient("noModalDialogs"), Some(json!(true)));
    // Transient-only paths never leak into the persisted view.
    assert_eq!(manager.get("noModalDialogs").unwrap(), None);

    let result = manager.set_transient(json!({"noModalDialogs": "maybe"})).unwrap();
    assert!(!result.is_ok());
    assert_eq!(manager.get_transient("noModalDialogs"), Some(json!(true)));

    assert!(manager.set_transient_value("preferences.navItem.current", json!("WSL")));
    assert!(!manager.set_transient_value("kubernetes.enabled", json!(false)));

    manager.load_transient();
    assert_eq!(manager.get_transient("noModalDialogs"), Some(json!(false)));
    assert_eq!(manager.get_transient("application.isFirstRun"), Some(json!(false)));
}

#[tokio::test]
async fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");
    let mut manager = loaded_manager(&path).await;
    manager
        .set_bulk(json!({"kubernetes": {"enabled": false}, "application": {"debug": true}}))
        .unwrap();
    manager.save().await.unwrap();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        saved,
        json!({"version": 10, "kubernetes": {"enabled": false}, "application": {"debug": true}})
    );

    let reloaded = loaded_manager(&path).await;
    assert_eq!(reloaded.get("kubernetes.enabled").unwrap(), Some(json!(false)));
    assert_eq!(reloaded.get_transient("application.isFirstRun"), Some(json!(false)));
}

#[tokio::test]
async fn test_profile_defaults_fill_in_below_user() {
    let dir = tempfile::tempdir().unwrap();
    let profiles = tempfile::tempdir().unwrap();
    std::fs::write(
        profiles.path().join("defaults.json"),
        r#"{"version": 10, "containerEngine": {"name": "containerd"}, "kubernetes": {"enabled": false}}"#,
    )
    .unwrap();

    let mut manager = SettingsManager::with_host(dir.path().join("settings.json"), linux());
    manager.load_transient();
    manager
        .load_deployment_profiles(&crate::paths::ProfilePaths {
            system: profiles.path().to_path_buf(),
            user: dir.path().join("no-profiles"),
        })
        .await
        .unwrap();
    manager.load_user().await.unwrap();

    assert_eq!(manager.get("containerEngine.name").unwrap(), Some(json!("containerd")));
    manager.set("kubernetes.enabled", json!(true)).unwrap();
    assert_eq!(manager.get("kubernetes.enabled").unwrap(), Some(json!(true)));
    assert_eq!(manager.get_locked(), json!({}));
}

#[tokio::test]
async fn test_cross_field_rules_see_locked_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = SettingsManager::with_host(dir.path().join("settings.json"), host(Os::Darwin, true));
    manager.load_transient();
    manager.load_user().await.unwrap();
    manager.set_deployment_profiles(DeploymentProfiles {
        defaults: json!({}),
        locked: json!({"virtualMachine": {"type": "vz"}}),
    });

    let result = manager
        .set_bulk(json!({"virtualMachine": {"useRosetta": true}}))
        .unwrap();
    assert_eq!(result, ValidationResult::accepted(true));
    assert_eq!(manager.get("virtualMachine.useRosetta").unwrap(), Some(json!(true)));
}

#[tokio::test]
async fn test_resubmitting_profile_defaults_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = loaded_manager(&dir.path().join("settings.json")).await;
    manager.set_deployment_profiles(DeploymentProfiles {
        defaults: json!({"experimental": {"virtualMachine": {"diskSize": "200GiB"}}}),
        locked: json!({}),
    });

    let experimental = manager.get_snapshot().unwrap()["experimental"].clone();
    assert_eq!(experimental["virtualMachine"]["diskSize"], json!("200GiB"));
    let result = manager
        .set_bulk(json!({"experimental": experimental}))
        .unwrap();
    assert_eq!(result, ValidationResult::accepted(false));
}

#[tokio::test]
async fn test_locked_mapping_entries_only_pin_their_own_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = SettingsManager::with_host(dir.path().join("settings.json"), host(Os::Windows, false));
    manager.load_transient();
    manager.load_user().await.unwrap();
    manager.set_deployment_profiles(DeploymentProfiles {
        defaults: json!({}),
        locked: json!({"WSL": {"integrations": {"Ubuntu": true}}}),
    });

    let result = manager
        .set_bulk(json!({"WSL": {"integrations": {"Debian": true}}}))
        .unwrap();
    assert!(result.is_ok(), "{:?}", result.errors);
    assert_eq!(
        manager.get("WSL.integrations").unwrap(),
        Some(json!({"Ubuntu": true, "Debian": true}))
    );

    let result = manager
        .set_bulk(json!({"WSL": {"integrations": {"Ubuntu": false}}}))
        .unwrap();
    assert!(result.locked);
    assert_eq!(result.errors, vec![r#"Field "WSL.integrations.Ubuntu" is locked."#]);
}
