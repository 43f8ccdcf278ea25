//! Module for searching for instrumentmapper config files

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.yaml";

/// System wide config location used after the XDG one
const SYSTEM_CONFIG_PATH: &str = "/etc/instrumentmapper";

/// Returns the config file paths in load order. E.g.
/// ["~/.config/instrumentmapper/config.yaml", "/etc/instrumentmapper/config.yaml"]
pub fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    match xdg::BaseDirectories::with_prefix("instrumentmapper") {
        Ok(base_dirs) => paths.push(base_dirs.get_config_home().join(CONFIG_FILE)),
        Err(e) => log::warn!("Unable to determine XDG config path: {e}"),
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG_PATH).join(CONFIG_FILE));
    paths
}
