//! Schema Migration
//!
//! Detects which metadata schema a project directory carries, judges
//! whether the tool supports it, and upgrades legacy projects to the
//! current manifest format. Version info is re-read on every call and
//! never cached, since a migration may have just run.

use crate::error::{CoreError, StoreError};
use crate::settings::{self, ProjectSettings, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory holding legacy (pre-manifest) project metadata.
pub const LEGACY_DIR: &str = ".project";
/// Legacy settings blob inside `LEGACY_DIR`.
pub const LEGACY_SETTINGS_FILE: &str = "settings.json";

/// Where a project's version information came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    /// No recognizable project metadata.
    Unknown,
    /// Legacy `.project/settings.json` schema.
    LegacySettings,
    /// Current `project.toml` manifest.
    Manifest,
}

/// Point-in-time version information for a project directory.
#[derive(Debug, Clone)]
pub struct ProjectVersionInfo {
    pub version: Option<String>,
    pub source: VersionSource,
}

/// Whether this tool can operate on a project of a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionState {
    /// Current schema; no migration needed.
    Compatible,
    /// Legacy schema; migration available.
    Upgradeable,
    /// Schema newer than this tool understands, or unrecognizable.
    Unsupported,
}

/// Legacy settings blob, as much of it as migration needs.
#[derive(Debug, Deserialize)]
pub struct LegacySettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub plugins: Vec<String>,
}

pub fn legacy_settings_path(project: &Path) -> PathBuf {
    project.join(LEGACY_DIR).join(LEGACY_SETTINGS_FILE)
}

/// Determine a project's version and its source. Always re-reads disk.
pub fn read_project_version(project: &Path) -> ProjectVersionInfo {
    if let Ok(current) = settings::read_settings(project) {
        return ProjectVersionInfo {
            version: Some(current.version),
            source: VersionSource::Manifest,
        };
    }
    if legacy_settings_path(project).exists() {
        let version = read_legacy_settings(project)
            .ok()
            .and_then(|s| s.version)
            .or_else(|| Some("1.0".to_string()));
        return ProjectVersionInfo {
            version,
            source: VersionSource::LegacySettings,
        };
    }
    ProjectVersionInfo {
        version: None,
        source: VersionSource::Unknown,
    }
}

/// Judge whether this tool supports a project version.
pub fn version_state(info: &ProjectVersionInfo) -> VersionState {
    match info.source {
        VersionSource::Unknown => VersionState::Unsupported,
        VersionSource::LegacySettings => VersionState::Upgradeable,
        VersionSource::Manifest => {
            let current_major = major(SCHEMA_VERSION);
            match info.version.as_deref().map(major) {
                Some(m) if m <= current_major => VersionState::Compatible,
                Some(_) => VersionState::Unsupported,
                None => VersionState::Unsupported,
            }
        }
    }
}

fn major(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

pub fn read_legacy_settings(project: &Path) -> Result<LegacySettings, StoreError> {
    let path = legacy_settings_path(project);
    if !path.exists() {
        return Err(StoreError::FileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// A legacy blob is migratable only when it names the app and declares
/// at least one plugin; anything else is a broken project, not a
/// migration candidate.
pub fn validate_legacy(legacy: &LegacySettings) -> Result<(), CoreError> {
    if legacy.name.is_empty() {
        return Err(CoreError::InvalidProject(
            "legacy settings are missing the project name".to_string(),
        ));
    }
    if legacy.plugins.is_empty() {
        return Err(CoreError::InvalidProject(
            "legacy settings declare no plugins".to_string(),
        ));
    }
    Ok(())
}

/// Upgrade a validated legacy project to the current manifest format.
/// The legacy blob stays in place; `read_project_version` prefers the
/// manifest from now on.
pub fn migrate_project(project: &Path) -> Result<ProjectSettings, CoreError> {
    let legacy = read_legacy_settings(project).map_err(CoreError::Store)?;
    validate_legacy(&legacy)?;

    let migrated = ProjectSettings {
        name: legacy.name,
        tracking_id: legacy
            .tracking_id
            .unwrap_or_else(settings::new_tracking_id),
        version: SCHEMA_VERSION.to_string(),
        plugins: legacy.plugins,
    };
    settings::write_settings(project, &migrated).map_err(CoreError::Store)?;
    info!(project = %project.display(), "migrated project to schema {}", SCHEMA_VERSION);
    Ok(migrated)
}
