//! Which workspace is active, expressed as an explicit handle.
//!
//! A [`SessionHandle`] owns the pointer to a session descriptor (`GISRC`) and
//! the ambient region override (`WIND_OVERRIDE`). Child modules only ever see
//! these through [`SessionHandle::child_env`]; the process environment is read
//! once and never written, so independent handles can be used side by side.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pngproj_domain::{GisEnv, GisEnvError, WorkspaceId};

use crate::errors::ExportError;

pub const GISRC_VAR: &str = "GISRC";
pub const WIND_OVERRIDE_VAR: &str = "WIND_OVERRIDE";
pub const GRASS_REGION_VAR: &str = "GRASS_REGION";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHandle {
    gisrc: Option<PathBuf>,
    wind_override: Option<String>,
}

/// Everything needed to undo a redirection of a [`SessionHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    gisrc: Option<PathBuf>,
    wind_override: Option<String>,
    descriptor: Option<String>,
}

impl SessionHandle {
    pub fn new(gisrc: impl Into<PathBuf>) -> Self {
        Self {
            gisrc: Some(gisrc.into()),
            wind_override: None,
        }
    }

    /// A handle with no active session.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Captures `GISRC` and `WIND_OVERRIDE` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(GISRC_VAR).ok().as_deref(),
            std::env::var(WIND_OVERRIDE_VAR).ok().as_deref(),
        )
    }

    #[must_use]
    pub fn from_vars(gisrc: Option<&str>, wind_override: Option<&str>) -> Self {
        Self {
            gisrc: gisrc
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            wind_override: wind_override
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
        }
    }

    #[must_use]
    pub fn with_wind_override(mut self, region: Option<String>) -> Self {
        self.wind_override = region.filter(|value| !value.is_empty());
        self
    }

    pub fn gisrc(&self) -> Option<&Path> {
        self.gisrc.as_deref()
    }

    pub fn wind_override(&self) -> Option<&str> {
        self.wind_override.as_deref()
    }

    /// Variables handed to every child module. An absent override is sent as
    /// an empty value so the runner strips any inherited one. `GRASS_REGION`
    /// is never passed on.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::with_capacity(3);
        if let Some(gisrc) = &self.gisrc {
            env.push((GISRC_VAR.to_string(), gisrc.to_string_lossy().into_owned()));
        }
        env.push((
            WIND_OVERRIDE_VAR.to_string(),
            self.wind_override.clone().unwrap_or_default(),
        ));
        env.push((GRASS_REGION_VAR.to_string(), String::new()));
        env
    }

    /// Reads the active workspace from the descriptor at `pointer`, or from
    /// this handle's pointer when none is given.
    pub fn current(&self, pointer: Option<&Path>) -> Result<WorkspaceId, ExportError> {
        let path = self.resolve_pointer(pointer)?;
        let env = GisEnv::read(path).map_err(no_session)?;
        env.workspace(path).map_err(no_session)
    }

    /// Makes `workspace` the active one in the descriptor at `pointer` (or
    /// this handle's). Other descriptor keys are preserved. The file is
    /// replaced atomically, so a failure leaves the previous contents intact.
    pub fn activate(
        &self,
        workspace: &WorkspaceId,
        pointer: Option<&Path>,
    ) -> Result<(), ExportError> {
        let path = self.resolve_pointer(pointer)?;
        let mut env = match GisEnv::read(path) {
            Ok(env) => env,
            Err(GisEnvError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                GisEnv::default()
            }
            Err(err) => {
                return Err(ExportError::SessionUpdate {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })
            }
        };
        env.set_workspace(workspace);
        replace_file(path, &env.render()).map_err(|err| ExportError::SessionUpdate {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        tracing::debug!(gisrc = %path.display(), workspace = %workspace, "activated workspace");
        Ok(())
    }

    /// Captures the pointer, the region override and the descriptor contents.
    #[must_use]
    pub fn save(&self) -> SavedSession {
        let descriptor = self
            .gisrc
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok());
        SavedSession {
            gisrc: self.gisrc.clone(),
            wind_override: self.wind_override.clone(),
            descriptor,
        }
    }

    /// Points this handle at another descriptor and drops the region
    /// override so it cannot leak into the new session.
    pub fn redirect(&mut self, gisrc: impl Into<PathBuf>) {
        self.gisrc = Some(gisrc.into());
        self.wind_override = None;
    }

    /// Reinstates a saved pointer and override. If the saved descriptor was
    /// rewritten in the meantime its original contents are put back.
    pub fn restore(&mut self, saved: SavedSession) -> Result<(), ExportError> {
        self.gisrc = saved.gisrc;
        self.wind_override = saved.wind_override;
        let (Some(path), Some(original)) = (self.gisrc.as_deref(), saved.descriptor) else {
            return Ok(());
        };
        let unchanged = fs::read_to_string(path).is_ok_and(|current| current == original);
        if unchanged {
            return Ok(());
        }
        replace_file(path, &original).map_err(|err| ExportError::SessionUpdate {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    fn resolve_pointer<'a>(&'a self, pointer: Option<&'a Path>) -> Result<&'a Path, ExportError> {
        pointer
            .or(self.gisrc.as_deref())
            .ok_or_else(|| ExportError::NoActiveSession {
                reason: format!("{GISRC_VAR} is not set"),
            })
    }
}

/// Writes a fresh descriptor for `workspace` under `dir` and returns its
/// path. The caller owns the file and must remove it.
pub fn write_session_descriptor(
    dir: &Path,
    workspace: &WorkspaceId,
) -> Result<PathBuf, ExportError> {
    let failed = |reason: String| ExportError::SessionUpdate {
        path: dir.to_path_buf(),
        reason,
    };
    let mut file = tempfile::Builder::new()
        .prefix("pngproj-gisrc-")
        .tempfile_in(dir)
        .map_err(|err| failed(err.to_string()))?;
    file.write_all(GisEnv::for_workspace(workspace).render().as_bytes())
        .map_err(|err| failed(err.to_string()))?;
    let (_, path) = file.keep().map_err(|err| failed(err.to_string()))?;
    Ok(path)
}

fn replace_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(contents.as_bytes())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn no_session(err: GisEnvError) -> ExportError {
    ExportError::NoActiveSession {
        reason: err.to_string(),
    }
}
