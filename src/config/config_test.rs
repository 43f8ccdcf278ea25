use std::error::Error;

use crate::{
    config::{Config, LoadError, TargetBackend},
    input::settings::MappingMode,
};

const SYSTEM_CONFIG_FILE: &str = "./rootfs/etc/instrumentmapper/config.yaml";

#[test]
fn test_shipped_config_matches_defaults() -> Result<(), Box<dyn Error>> {
    let config = Config::from_yaml_path(SYSTEM_CONFIG_FILE)?;
    assert_eq!(config, Config::default());
    Ok(())
}

#[test]
fn test_empty_config_uses_defaults() -> Result<(), Box<dyn Error>> {
    let config = Config::from_yaml("{}")?;
    assert_eq!(config.mapping_mode, MappingMode::ViGEm);
    assert!(!config.accurate_drum_mappings);
    assert_eq!(config.riffmaster_sensitivity, 1.5);
    assert!(config.backends.usb.enabled);
    assert!(config.backends.usb.map_guide_button);
    assert!(!config.backends.hotplug.enabled);
    assert!(config.backends.hotplug.fallback_mapping);
    assert_eq!(config.targets.max_xbox360, 4);
    assert_eq!(config.targets.max_joysticks, 16);
    Ok(())
}

#[test]
fn test_partial_config() -> Result<(), Box<dyn Error>> {
    let content = r#"
mapping_mode: shadps4
backends:
  usb:
    enabled: false
  hotplug:
    enabled: true
targets:
  backend: memory
"#;
    let config = Config::from_yaml(content)?;
    assert_eq!(config.mapping_mode, MappingMode::ShadPs4);
    assert!(!config.backends.usb.enabled);
    assert!(config.backends.hotplug.enabled);
    assert!(!config.backends.hotplug.map_guide_button);
    assert_eq!(config.backends.usb.read_timeout_ms, 1000);
    assert_eq!(config.targets.backend, TargetBackend::Memory);

    let settings = config.settings();
    assert_eq!(settings.mode(), MappingMode::ShadPs4);
    assert_eq!(settings.riffmaster_sensitivity(), 1.5);
    Ok(())
}

#[test]
fn test_unknown_mode_is_rejected() {
    let result = Config::from_yaml("mapping_mode: xinput");
    assert!(result.is_err());
}

#[test]
fn test_both_backends_enabled_is_rejected() {
    let content = r#"
backends:
  hotplug:
    enabled: true
"#;
    let result = Config::from_yaml(content);
    assert!(matches!(result, Err(LoadError::InvalidConfig(_))));

    let mut config = Config::default();
    assert!(config.validate().is_ok());
    config.backends.usb.enabled = false;
    config.backends.hotplug.enabled = true;
    assert!(config.validate().is_ok());
}
