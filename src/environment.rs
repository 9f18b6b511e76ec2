//! Environment Store
//!
//! Named environments persisted as dotenv-style files under
//! `<project>/env/.env.<name>`. Every environment file carries a
//! `STAGEHAND_ENV` marker naming the environment it belongs to.

use crate::error::StoreError;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory inside a project that holds env files.
pub const ENV_DIR: &str = "env";

/// Marker variable naming the environment an env file belongs to.
pub const ENV_MARKER_KEY: &str = "STAGEHAND_ENV";

const ENV_FILE_PREFIX: &str = ".env.";

/// Path of the env file for `env_name` inside `project`.
pub fn env_file_path(project: &Path, env_name: &str) -> PathBuf {
    project
        .join(ENV_DIR)
        .join(format!("{}{}", ENV_FILE_PREFIX, env_name))
}

/// Names of the environments present in `project`, sorted.
pub fn list_envs(project: &Path) -> Result<Vec<String>, StoreError> {
    let dir = project.join(ENV_DIR);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if let Some(env_name) = name.strip_prefix(ENV_FILE_PREFIX) {
                if !env_name.is_empty() {
                    names.push(env_name.to_string());
                }
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Load the env file for `env_name`. Missing file is an error; callers
/// that tolerate absence check `env_file_path(...).exists()` first.
pub fn load_env(project: &Path, env_name: &str) -> Result<IndexMap<String, String>, StoreError> {
    let path = env_file_path(project, env_name);
    if !path.exists() {
        return Err(StoreError::FileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    Ok(parse_env(&content))
}

/// Write `vars` as the env file for `env_name`, creating the env dir if
/// needed. Keys keep their insertion order.
pub fn write_env(
    project: &Path,
    env_name: &str,
    vars: &IndexMap<String, String>,
) -> Result<(), StoreError> {
    let path = env_file_path(project, env_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for (key, value) in vars {
        content.push_str(key);
        content.push('=');
        content.push_str(value);
        content.push('\n');
    }
    fs::write(&path, content)?;
    Ok(())
}

/// Copy the `source` env file to a new `target` env.
///
/// `KEY=VALUE` lines are preserved verbatim except the `STAGEHAND_ENV`
/// marker, which is rewritten to the target name; other lines are
/// trimmed; line terminators are normalized to `\n`.
pub fn create_env_copy(project: &Path, target: &str, source: &str) -> Result<(), StoreError> {
    let source_path = env_file_path(project, source);
    if !source_path.exists() {
        return Err(StoreError::FileNotFound(source_path));
    }
    let content = fs::read_to_string(&source_path)?;

    let mut lines: Vec<&str> = content
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }

    let mut out = String::new();
    for line in lines {
        match env_key(line) {
            Some(key) if key == ENV_MARKER_KEY => {
                out.push_str(ENV_MARKER_KEY);
                out.push('=');
                out.push_str(target);
            }
            Some(_) => out.push_str(line),
            None => out.push_str(line.trim()),
        }
        out.push('\n');
    }

    let target_path = env_file_path(project, target);
    fs::write(&target_path, out)?;
    Ok(())
}

/// Parse dotenv content into an ordered map. Lines without a valid
/// `KEY=` prefix (comments, blanks) are skipped.
pub fn parse_env(content: &str) -> IndexMap<String, String> {
    let mut vars = IndexMap::new();
    for line in content.lines() {
        if let Some(key) = env_key(line) {
            let value = &line[key.len() + 1..];
            vars.insert(key.to_string(), value.trim().to_string());
        }
    }
    vars
}

/// The `KEY` of a `KEY=...` line, when the key is a valid identifier.
fn env_key(line: &str) -> Option<&str> {
    let eq = line.find('=')?;
    let key = &line[..eq];
    let mut chars = key.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(key)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(project: &Path, env: &str, content: &str) {
        let path = env_file_path(project, env);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let vars = parse_env("# comment\n\nFOO=1\nBAR = nope\nBAZ=two words\n");
        assert_eq!(vars.get("FOO").map(String::as_str), Some("1"));
        assert_eq!(vars.get("BAZ").map(String::as_str), Some("two words"));
        assert!(!vars.contains_key("BAR "), "keys with spaces are invalid");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn copy_rewrites_marker_and_preserves_values() {
        let dir = TempDir::new().unwrap();
        write_source(dir.path(), "dev", "FOO=1\nSTAGEHAND_ENV=dev\n");

        create_env_copy(dir.path(), "prod", "dev").unwrap();

        let copied = fs::read_to_string(env_file_path(dir.path(), "prod")).unwrap();
        assert_eq!(copied, "FOO=1\nSTAGEHAND_ENV=prod\n");
    }

    #[test]
    fn copy_normalizes_crlf_terminators() {
        let dir = TempDir::new().unwrap();
        write_source(dir.path(), "dev", "FOO=1\r\nSTAGEHAND_ENV=dev\r\n  # note \r\n");

        create_env_copy(dir.path(), "staging", "dev").unwrap();

        let copied = fs::read_to_string(env_file_path(dir.path(), "staging")).unwrap();
        assert_eq!(copied, "FOO=1\nSTAGEHAND_ENV=staging\n# note\n");
    }

    #[test]
    fn copy_from_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = create_env_copy(dir.path(), "prod", "dev").unwrap_err();
        assert!(matches!(err, StoreError::FileNotFound(_)));
    }

    #[test]
    fn write_then_load_round_trips_in_order() {
        let dir = TempDir::new().unwrap();
        let mut vars = IndexMap::new();
        vars.insert("STAGEHAND_ENV".to_string(), "dev".to_string());
        vars.insert("ENDPOINT".to_string(), "https://example.test".to_string());
        write_env(dir.path(), "dev", &vars).unwrap();

        let loaded = load_env(dir.path(), "dev").unwrap();
        let keys: Vec<&String> = loaded.keys().collect();
        assert_eq!(keys, ["STAGEHAND_ENV", "ENDPOINT"]);
    }

    #[test]
    fn list_envs_strips_prefix_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_source(dir.path(), "prod", "STAGEHAND_ENV=prod\n");
        write_source(dir.path(), "dev", "STAGEHAND_ENV=dev\n");
        assert_eq!(list_envs(dir.path()).unwrap(), ["dev", "prod"]);
    }
}
