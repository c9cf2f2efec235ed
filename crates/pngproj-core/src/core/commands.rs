//! Command handlers: run one operation against a [`CommandContext`] and turn
//! its result into an [`ExecutionOutcome`].

use anyhow::Result;
use serde_json::{json, Value};

use crate::context::CommandContext;
use crate::errors::ExportError;
use crate::export::{ExportRequest, ReprojectionOrchestrator};
use crate::leaflet::{export_leaflet, LeafletRequest};
use crate::outcome::ExecutionOutcome;

const NO_SESSION_HINT: &str =
    "Run pngproj from inside a GRASS session, or point GISRC at a session file.";

/// Exports one raster map as a PNG in the requested CRS.
///
/// # Errors
/// Returns an error only if the report cannot be serialized; export failures
/// are reported through the outcome.
pub fn export_raster(ctx: &CommandContext, request: &ExportRequest) -> Result<ExecutionOutcome> {
    let settings = ctx.config().export_settings();
    let mut session = ctx.session();
    match ReprojectionOrchestrator::new(ctx.gis(), &settings).export(&mut session, request) {
        Ok(report) => {
            let message = format!(
                "wrote {} ({} in {})",
                report.image.display(),
                report.raster,
                request.epsg
            );
            Ok(ExecutionOutcome::success(message, serde_json::to_value(&report)?))
        }
        Err(failure) => Ok(ExecutionOutcome::from_error(
            failure.is_user_error(),
            failure.to_string(),
            with_hint(failure.details(), &failure.error),
        )),
    }
}

/// Exports a set of maps for a Leaflet viewer.
///
/// # Errors
/// Returns an error only if the report cannot be serialized.
pub fn leaflet_export(ctx: &CommandContext, request: &LeafletRequest) -> Result<ExecutionOutcome> {
    let settings = ctx.config().export_settings();
    let mut session = ctx.session();
    match export_leaflet(ctx.gis(), &settings, &mut session, request) {
        Ok(report) => {
            let message = format!(
                "exported {} map{} to {}",
                report.layers.len(),
                if report.layers.len() == 1 { "" } else { "s" },
                report.output_dir.display()
            );
            Ok(ExecutionOutcome::success(message, serde_json::to_value(&report)?))
        }
        Err(err) => {
            let mut details = err.details();
            if details["reason"] == "no_active_session" {
                details["hint"] = json!(NO_SESSION_HINT);
            }
            Ok(ExecutionOutcome::from_error(
                err.is_user_error(),
                err.to_string(),
                details,
            ))
        }
    }
}

/// Reports the workspace the captured session points at.
///
/// # Errors
/// Never fails; a missing session is a user error outcome.
pub fn session_show(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let session = ctx.session();
    match session.current(None) {
        Ok(workspace) => Ok(ExecutionOutcome::success(
            format!(
                "{}/{} in {}",
                workspace.location,
                workspace.mapset,
                workspace.database.display()
            ),
            json!({
                "gisrc": session.gisrc(),
                "database": workspace.database,
                "location": workspace.location,
                "mapset": workspace.mapset,
                "region_override": session.wind_override(),
            }),
        )),
        Err(err) => Ok(ExecutionOutcome::from_error(
            err.is_user_error(),
            err.to_string(),
            with_hint(json!({ "reason": err.reason() }), &err),
        )),
    }
}

fn with_hint(mut details: Value, error: &ExportError) -> Value {
    if matches!(error, ExportError::NoActiveSession { .. }) {
        details["hint"] = json!(NO_SESSION_HINT);
    }
    details
}
