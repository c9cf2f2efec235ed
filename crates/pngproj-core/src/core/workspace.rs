//! Workspaces on disk: a database root holding locations, each holding
//! mapsets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pngproj_domain::{EpsgCode, WorkspaceId, PERMANENT_MAPSET};

use crate::effects::GisRuntime;
use crate::errors::{spawn_diagnostics, ExportError};
use crate::module::ModuleCall;
use crate::session::SessionHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: WorkspaceId,
}

impl Workspace {
    pub fn open(id: WorkspaceId) -> Self {
        Self { id }
    }

    /// Resolves database and location from the active session. An empty
    /// `mapset` means the session's current mapset.
    pub fn from_session(session: &SessionHandle, mapset: &str) -> Result<Self, ExportError> {
        let mut id = session.current(None)?;
        if !mapset.is_empty() {
            id.mapset = mapset.to_string();
        }
        Ok(Self { id })
    }

    /// Creates a new location for `crs` under `database` through the
    /// projection module. The session must already point at the new
    /// location's `PERMANENT` mapset.
    pub fn create(
        gis: &dyn GisRuntime,
        session: &SessionHandle,
        database: &Path,
        crs: EpsgCode,
    ) -> Result<Self, ExportError> {
        let location = crs.location_name();
        let failed = |reason: String| ExportError::WorkspaceCreate {
            database: database.to_path_buf(),
            location: location.clone(),
            reason,
        };
        let location_path = database.join(&location);
        if dir_has_entries(&location_path) {
            return Err(failed(format!(
                "{} already exists and is not empty",
                location_path.display()
            )));
        }
        let call = ModuleCall::new("g.proj")
            .flags("c")
            .param("epsg", crs.code())
            .param("location", &location)
            .quiet();
        let output = gis
            .run(&call, session)
            .map_err(|err| failed(spawn_diagnostics(&err)))?;
        if !output.success() {
            return Err(failed(output.diagnostics()));
        }
        let workspace = Self::open(WorkspaceId::new(database, location.clone(), PERMANENT_MAPSET));
        if !workspace.exists() {
            return Err(failed(format!(
                "{} was not created",
                workspace.mapset_path().display()
            )));
        }
        tracing::debug!(workspace = %workspace.id, %crs, "created location");
        Ok(workspace)
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn database(&self) -> &Path {
        &self.id.database
    }

    pub fn location_path(&self) -> PathBuf {
        self.id.location_path()
    }

    pub fn mapset_path(&self) -> PathBuf {
        self.id.mapset_path()
    }

    pub fn exists(&self) -> bool {
        self.mapset_path().is_dir()
    }

    pub fn set_as_current(
        &self,
        session: &SessionHandle,
        pointer: Option<&Path>,
    ) -> Result<(), ExportError> {
        session.activate(&self.id, pointer)
    }

    /// Removes the mapset directory only; the enclosing location and
    /// database are left to the owner.
    pub fn delete(&self) -> Result<(), ExportError> {
        let path = self.mapset_path();
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ExportError::WorkspaceDelete {
                path,
                reason: err.to_string(),
            }),
        }
    }
}

/// A workspace created for a single export, together with everything that
/// was created to host it.
#[derive(Debug)]
pub struct EphemeralWorkspace {
    workspace: Workspace,
    descriptor: Option<PathBuf>,
}

impl EphemeralWorkspace {
    /// Creates a random, empty database root under `tmp_root`. The location
    /// itself is created later by [`Workspace::create`].
    pub fn allocate(tmp_root: &Path, crs: EpsgCode) -> Result<Self, ExportError> {
        let location = crs.location_name();
        let failed = |reason: String| ExportError::WorkspaceCreate {
            database: tmp_root.to_path_buf(),
            location: location.clone(),
            reason,
        };
        fs::create_dir_all(tmp_root).map_err(|err| failed(err.to_string()))?;
        let database = tempfile::Builder::new()
            .prefix("pngproj-")
            .tempdir_in(tmp_root)
            .map_err(|err| failed(err.to_string()))?
            .keep();
        let id = WorkspaceId::new(database, location.clone(), PERMANENT_MAPSET);
        Ok(Self {
            workspace: Workspace::open(id),
            descriptor: None,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn id(&self) -> &WorkspaceId {
        self.workspace.id()
    }

    pub fn database(&self) -> &Path {
        self.workspace.database()
    }

    /// Registers a session descriptor to be removed at teardown.
    pub fn attach_descriptor(&mut self, path: PathBuf) {
        self.descriptor = Some(path);
    }

    pub fn descriptor(&self) -> Option<&Path> {
        self.descriptor.as_deref()
    }

    /// Deletes mapset, location, database root and descriptor, in that
    /// order. Every stage runs; failures are collected, not propagated.
    /// Directories are removed non-recursively past the mapset, so anything
    /// this export did not create stops the teardown at that level.
    pub fn teardown(self) -> Vec<ExportError> {
        let mut errors = Vec::new();
        if let Err(err) = self.workspace.delete() {
            errors.push(err);
        }
        let stages = [
            (self.workspace.location_path(), Stage::Dir),
            (self.workspace.database().to_path_buf(), Stage::Dir),
        ];
        let descriptor = self.descriptor.map(|path| (path, Stage::File));
        for (path, stage) in stages.into_iter().chain(descriptor) {
            let result = match stage {
                Stage::Dir => fs::remove_dir(&path),
                Stage::File => fs::remove_file(&path),
            };
            match result {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => errors.push(ExportError::WorkspaceDelete {
                    path,
                    reason: err.to_string(),
                }),
            }
        }
        errors
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Dir,
    File,
}

fn dir_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
