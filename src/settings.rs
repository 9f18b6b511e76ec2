//! Project Settings
//!
//! The project manifest (`project.toml`) identifying an app project:
//! name, tracking id, schema version, and the plugins it is built from.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file name at the project root.
pub const MANIFEST_FILE: &str = "project.toml";

/// Schema version written by this version of the tool.
pub const SCHEMA_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub name: String,
    pub tracking_id: String,
    pub version: String,
    #[serde(default)]
    pub plugins: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ManifestFile {
    project: ProjectSettings,
}

pub fn manifest_path(project: &Path) -> PathBuf {
    project.join(MANIFEST_FILE)
}

/// Read the project manifest. Missing file maps to `FileNotFound` so
/// callers can distinguish "not a current-format project".
pub fn read_settings(project: &Path) -> Result<ProjectSettings, StoreError> {
    let path = manifest_path(project);
    if !path.exists() {
        return Err(StoreError::FileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    let manifest: ManifestFile = toml::from_str(&content)?;
    if manifest.project.name.is_empty() {
        return Err(StoreError::InvalidManifest(
            "project name must not be empty".to_string(),
        ));
    }
    Ok(manifest.project)
}

pub fn write_settings(project: &Path, settings: &ProjectSettings) -> Result<(), StoreError> {
    fs::create_dir_all(project)?;
    let content = toml::to_string_pretty(&ManifestFile {
        project: settings.clone(),
    })?;
    fs::write(manifest_path(project), content)?;
    Ok(())
}

/// Tracking id for a new project: time-and-pid derived, unique enough
/// for correlating a project across operations.
pub fn new_tracking_id() -> String {
    let now = chrono::Utc::now();
    format!(
        "{:08x}-{:04x}",
        now.timestamp() as u32,
        std::process::id() as u16
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn manifest_round_trips() {
        let dir = TempDir::new().unwrap();
        let settings = ProjectSettings {
            name: "demo".to_string(),
            tracking_id: new_tracking_id(),
            version: SCHEMA_VERSION.to_string(),
            plugins: vec!["web".to_string()],
        };
        write_settings(dir.path(), &settings).unwrap();

        let loaded = read_settings(dir.path()).unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(loaded.version, SCHEMA_VERSION);
        assert_eq!(loaded.plugins, ["web"]);
    }

    #[test]
    fn missing_manifest_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_settings(dir.path()),
            Err(StoreError::FileNotFound(_))
        ));
    }

    #[test]
    fn empty_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            manifest_path(dir.path()),
            "[project]\nname = \"\"\ntracking_id = \"t\"\nversion = \"2.0\"\n",
        )
        .unwrap();
        assert!(matches!(
            read_settings(dir.path()),
            Err(StoreError::InvalidManifest(_))
        ));
    }
}
