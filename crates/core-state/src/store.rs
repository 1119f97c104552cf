//! Environment store
//!
//! One `<name>.json` file per environment inside a deployments directory, plus
//! a `_activeEnvironment` marker holding the active environment name. All
//! mutations rewrite the whole file and are synced to disk before returning.
//! There is no locking: a single operator is assumed.

use crate::error::{Error, Result};
use crate::state::DeploymentState;
use crate::validate::validate_state_document;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the active-environment marker
pub const ACTIVE_ENVIRONMENT_MARKER: &str = "_activeEnvironment";

const STATE_EXTENSION: &str = "json";

/// Durable, environment-partitioned deployment state
#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    dir: PathBuf,
}

impl EnvironmentStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Deployments directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, STATE_EXTENSION))
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_ENVIRONMENT_MARKER)
    }

    /// Names of every environment, sorted
    pub fn list_environments(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STATE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Whether a state file exists for `name`
    pub fn exists(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        Ok(self.path_for(name).is_file())
    }

    /// Create an empty environment. Fails if it already exists.
    pub fn create(&self, name: &str) -> Result<()> {
        if self.exists(name)? {
            return Err(Error::EnvironmentExists {
                name: name.to_string(),
            });
        }
        fs::create_dir_all(&self.dir)?;
        self.write_state(name, &DeploymentState::new())?;
        debug!(environment = name, "created environment");
        Ok(())
    }

    /// Load and validate the state of `name`.
    ///
    /// A missing file is `EnvironmentNotFound`. Unreadable JSON, a schema
    /// violation or an edge to a chain without a satellite is `Corrupt`.
    pub fn load(&self, name: &str) -> Result<DeploymentState> {
        if !self.exists(name)? {
            return Err(Error::environment_not_found(name, self.path_for(name)));
        }
        let path = self.path_for(name);
        let contents = fs::read_to_string(&path)?;

        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| Error::corrupt(name, &path, format!("invalid JSON: {}", e)))?;

        let violations = validate_state_document(&value)?;
        if !violations.is_empty() {
            return Err(Error::corrupt(name, &path, violations.join("; ")));
        }

        let state: DeploymentState = serde_json::from_value(value)
            .map_err(|e| Error::corrupt(name, &path, e.to_string()))?;

        let dangling = state.dangling_edges();
        if !dangling.is_empty() {
            let edges: Vec<String> = dangling
                .iter()
                .map(|(from, to)| format!("{} -> {} has no satellite on {}", from, to, to))
                .collect();
            return Err(Error::corrupt(name, &path, edges.join("; ")));
        }
        Ok(state)
    }

    /// Replace the state of an existing environment
    pub fn save(&self, name: &str, state: &DeploymentState) -> Result<()> {
        if !self.exists(name)? {
            return Err(Error::environment_not_found(name, self.path_for(name)));
        }
        self.write_state(name, state)?;
        debug!(
            environment = name,
            satellites = state.satellites.len(),
            "saved environment"
        );
        Ok(())
    }

    /// Read-modify-write of one environment.
    ///
    /// The state is written back only when `apply` succeeds.
    pub fn update<T, E, F>(&self, name: &str, apply: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut DeploymentState) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut state = self.load(name)?;
        let value = apply(&mut state)?;
        self.save(name, &state)?;
        Ok(value)
    }

    /// Delete an environment. Fails if it is missing or active.
    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Err(Error::environment_not_found(name, self.path_for(name)));
        }
        if self.active()?.as_deref() == Some(name) {
            return Err(Error::EnvironmentActive {
                name: name.to_string(),
            });
        }
        fs::remove_file(self.path_for(name))?;
        debug!(environment = name, "deleted environment");
        Ok(())
    }

    /// Name of the active environment, if any
    pub fn active(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.marker_path()) {
            Ok(contents) => {
                let name = contents.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Name of the active environment, or `NoActiveEnvironment`
    pub fn require_active(&self) -> Result<String> {
        self.active()?.ok_or(Error::NoActiveEnvironment)
    }

    /// Mark `name` active, or clear the marker with `None`.
    ///
    /// Activating requires the environment file to exist.
    pub fn set_active(&self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) => {
                if !self.exists(name)? {
                    return Err(Error::environment_not_found(name, self.path_for(name)));
                }
                write_synced(&self.marker_path(), name.as_bytes())?;
            }
            None => match fs::remove_file(self.marker_path()) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        debug!(environment = ?name, "active environment changed");
        Ok(())
    }

    fn write_state(&self, name: &str, state: &DeploymentState) -> Result<()> {
        let mut contents = serde_json::to_string_pretty(state)?;
        contents.push('\n');
        write_synced(&self.path_for(name), contents.as_bytes())
    }
}

/// Write through a sibling temp file, fsync, then rename over the target
fn write_synced(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('_')
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_whitespace);
    if invalid {
        return Err(Error::InvalidEnvironmentName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, EnvironmentStore) {
        let dir = TempDir::new().unwrap();
        let store = EnvironmentStore::new(dir.path().join("deployments"));
        (dir, store)
    }

    #[test]
    fn test_create_writes_empty_state() {
        let (_dir, store) = store();
        store.create("staging").unwrap();

        let contents = fs::read_to_string(store.path_for("staging")).unwrap();
        assert_eq!(contents, "{\n  \"satellites\": {}\n}\n");
        assert_eq!(store.load("staging").unwrap(), DeploymentState::new());
    }

    #[test]
    fn test_create_twice_fails() {
        let (_dir, store) = store();
        store.create("staging").unwrap();
        assert!(matches!(
            store.create("staging"),
            Err(Error::EnvironmentExists { .. })
        ));
    }

    #[test]
    fn test_invalid_names() {
        let (_dir, store) = store();
        for name in ["", "_activeEnvironment", "../prod", ".hidden", "a b"] {
            assert!(
                matches!(store.create(name), Err(Error::InvalidEnvironmentName(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_load_missing_vs_corrupt() {
        let (_dir, store) = store();
        assert!(store.load("nope").unwrap_err().is_not_found());

        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path_for("broken"), "{ not json").unwrap();
        assert!(store.load("broken").unwrap_err().is_corrupt());

        fs::write(store.path_for("shape"), r#"{"satellites": []}"#).unwrap();
        assert!(store.load("shape").unwrap_err().is_corrupt());
    }

    #[test]
    fn test_save_requires_existing_environment() {
        let (_dir, store) = store();
        let err = store.save("ghost", &DeploymentState::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_environments_ignores_marker() {
        let (_dir, store) = store();
        assert!(store.list_environments().unwrap().is_empty());

        store.create("prod").unwrap();
        store.create("dev").unwrap();
        store.set_active(Some("dev")).unwrap();

        assert_eq!(store.list_environments().unwrap(), vec!["dev", "prod"]);
    }

    #[test]
    fn test_active_marker_lifecycle() {
        let (_dir, store) = store();
        store.create("dev").unwrap();
        assert_eq!(store.active().unwrap(), None);
        assert!(matches!(
            store.require_active(),
            Err(Error::NoActiveEnvironment)
        ));

        store.set_active(Some("dev")).unwrap();
        assert_eq!(store.require_active().unwrap(), "dev");

        store.set_active(None).unwrap();
        assert_eq!(store.active().unwrap(), None);
        // Clearing twice is fine
        store.set_active(None).unwrap();
    }

    #[test]
    fn test_activate_missing_environment_fails() {
        let (_dir, store) = store();
        assert!(store.set_active(Some("prod")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_rules() {
        let (_dir, store) = store();
        store.create("dev").unwrap();
        store.create("prod").unwrap();
        store.set_active(Some("dev")).unwrap();

        assert!(matches!(
            store.delete("dev"),
            Err(Error::EnvironmentActive { .. })
        ));
        assert!(store.delete("missing").unwrap_err().is_not_found());

        store.delete("prod").unwrap();
        assert_eq!(store.list_environments().unwrap(), vec!["dev"]);
    }

    #[test]
    fn test_update_only_writes_on_success() {
        let (_dir, store) = store();
        store.create("dev").unwrap();

        let result: std::result::Result<(), Error> = store.update("dev", |state| {
            state.insert_satellite("1", "0x1111111111111111111111111111111111111111");
            Err(Error::Schema("rejected".into()))
        });
        assert!(result.is_err());
        assert!(store.load("dev").unwrap().satellites.is_empty());

        store
            .update::<_, Error, _>("dev", |state| {
                state.insert_satellite("1", "0x1111111111111111111111111111111111111111");
                Ok(())
            })
            .unwrap();
        assert!(store.load("dev").unwrap().contains("1"));
    }
}
