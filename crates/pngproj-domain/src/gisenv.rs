//! The session descriptor (`gisrc`) file: `KEY: value` lines naming the
//! active database, location and mapset.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::GisEnvError;

pub const GISDBASE: &str = "GISDBASE";
pub const LOCATION_NAME: &str = "LOCATION_NAME";
pub const MAPSET: &str = "MAPSET";

/// Database root, location and mapset naming one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId {
    pub database: PathBuf,
    pub location: String,
    pub mapset: String,
}

impl WorkspaceId {
    pub fn new(
        database: impl Into<PathBuf>,
        location: impl Into<String>,
        mapset: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            location: location.into(),
            mapset: mapset.into(),
        }
    }

    pub fn location_path(&self) -> PathBuf {
        self.database.join(&self.location)
    }

    pub fn mapset_path(&self) -> PathBuf {
        self.location_path().join(&self.mapset)
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.database.display(),
            self.location,
            self.mapset
        )
    }
}

/// Parsed contents of a session descriptor. Unknown keys are kept so a
/// rewrite only touches the workspace triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GisEnv {
    vars: IndexMap<String, String>,
}

impl GisEnv {
    pub fn for_workspace(workspace: &WorkspaceId) -> Self {
        let mut env = Self::default();
        env.set_workspace(workspace);
        env
    }

    pub fn read(path: &Path) -> Result<Self, GisEnvError> {
        let text = fs::read_to_string(path).map_err(|source| GisEnvError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, GisEnvError> {
        let mut vars = IndexMap::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| GisEnvError::Malformed {
                path: path.to_path_buf(),
                line: line.to_string(),
            })?;
            vars.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { vars })
    }

    pub fn render(&self) -> String {
        self.vars
            .iter()
            .map(|(key, value)| format!("{key}: {value}\n"))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn set_workspace(&mut self, workspace: &WorkspaceId) {
        self.set(GISDBASE, workspace.database.to_string_lossy());
        self.set(LOCATION_NAME, workspace.location.clone());
        self.set(MAPSET, workspace.mapset.clone());
    }

    pub fn workspace(&self, path: &Path) -> Result<WorkspaceId, GisEnvError> {
        let require = |key: &'static str| {
            self.get(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| GisEnvError::MissingKey {
                    path: path.to_path_buf(),
                    key,
                })
        };
        Ok(WorkspaceId::new(
            require(GISDBASE)?,
            require(LOCATION_NAME)?,
            require(MAPSET)?,
        ))
    }
}
