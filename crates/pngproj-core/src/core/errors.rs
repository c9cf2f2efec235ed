use std::path::PathBuf;

/// Everything that can go wrong while exporting one raster map.
///
/// None of these are retried; the orchestrator tears down before surfacing
/// them.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no active session: {reason}")]
    NoActiveSession { reason: String },
    #[error("failed to update session file {}: {reason}", path.display())]
    SessionUpdate { path: PathBuf, reason: String },
    #[error("failed to create location {location} in {}: {reason}", database.display())]
    WorkspaceCreate {
        database: PathBuf,
        location: String,
        reason: String,
    },
    #[error("failed to delete {}: {reason}", path.display())]
    WorkspaceDelete { path: PathBuf, reason: String },
    #[error("failed to read computational region: {reason}")]
    RegionRead { reason: String },
    #[error("failed to set computational region: {reason}")]
    RegionWrite { reason: String },
    #[error("invalid region fields: {reason}")]
    RegionFieldMismatch { reason: String },
    #[error("coordinate transformation failed: {diagnostics}")]
    Reprojection { diagnostics: String },
    #[error("failed to import raster {raster}: {diagnostics}")]
    RasterImport { raster: String, diagnostics: String },
    #[error("failed to render {}: {diagnostics}", output.display())]
    Render {
        output: PathBuf,
        diagnostics: String,
    },
    #[error("failed to write extent file {}: {reason}", path.display())]
    ExtentWrite { path: PathBuf, reason: String },
    #[error("{0}")]
    InvalidRequest(String),
}

impl ExportError {
    /// Stable identifier used in JSON details.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ExportError::NoActiveSession { .. } => "no_active_session",
            ExportError::SessionUpdate { .. } => "session_update",
            ExportError::WorkspaceCreate { .. } => "workspace_create",
            ExportError::WorkspaceDelete { .. } => "workspace_delete",
            ExportError::RegionRead { .. } => "region_read",
            ExportError::RegionWrite { .. } => "region_write",
            ExportError::RegionFieldMismatch { .. } => "region_field_mismatch",
            ExportError::Reprojection { .. } => "reprojection",
            ExportError::RasterImport { .. } => "raster_import",
            ExportError::Render { .. } => "render",
            ExportError::ExtentWrite { .. } => "extent_write",
            ExportError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Whether the user can fix this by changing their input or session.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ExportError::NoActiveSession { .. } | ExportError::InvalidRequest(_)
        )
    }
}

/// Failure text from a module run: spawn errors and non-zero exits both end
/// up as plain diagnostics.
pub(crate) fn spawn_diagnostics(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
