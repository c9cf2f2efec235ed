//! Per-map export: reproject one raster into a throwaway workspace, render
//! it, and leave nothing behind.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use pngproj_domain::{CrsDefinition, EpsgCode, Extent, RasterName, Region};

use crate::effects::GisRuntime;
use crate::errors::ExportError;
use crate::raster::RasterImporter;
use crate::region::RegionStore;
use crate::render::{RenderOptions, Renderer};
use crate::session::{write_session_descriptor, SessionHandle};
use crate::transform::{ExtentTransform, Separator};
use crate::workspace::{EphemeralWorkspace, Workspace};


/// Which bounds the exported image covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// The caller's computational region, reprojected.
    #[default]
    RegionPreserving,
    /// The raster's own extent in the target CRS.
    MapExtent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Init,
    RegionCaptured,
    WorkspaceCreating,
    SessionSwitched,
    RegionOrRasterReprojected,
    Rendered,
    ExtentWritten,
    TearingDown,
    Done,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportStage::Init => "init",
            ExportStage::RegionCaptured => "region_captured",
            ExportStage::WorkspaceCreating => "workspace_creating",
            ExportStage::SessionSwitched => "session_switched",
            ExportStage::RegionOrRasterReprojected => "region_or_raster_reprojected",
            ExportStage::Rendered => "rendered",
            ExportStage::ExtentWritten => "extent_written",
            ExportStage::TearingDown => "tearing_down",
            ExportStage::Done => "done",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub raster: RasterName,
    pub output: PathBuf,
    pub epsg: EpsgCode,
    pub mode: ExportMode,
    pub render: RenderOptions,
    pub wgs84_file: Option<PathBuf>,
    /// Named region to read the source region from, instead of the one the
    /// session carries.
    pub region_override: Option<String>,
}

impl ExportRequest {
    pub fn new(raster: RasterName, output: impl Into<PathBuf>, epsg: EpsgCode) -> Self {
        Self {
            raster,
            output: output.into(),
            epsg,
            mode: ExportMode::default(),
            render: RenderOptions::default(),
            wgs84_file: None,
            region_override: None,
        }
    }

    /// `<output>.wgs84`, the conventional extent file next to the image.
    pub fn default_wgs84_file(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_owned();
        name.push(".wgs84");
        PathBuf::from(name)
    }

    fn validate(&self) -> Result<(), ExportError> {
        if self.render.compression > 9 {
            return Err(ExportError::InvalidRequest(format!(
                "compression must be between 0 and 9, got {}",
                self.render.compression
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ExportError::InvalidRequest("output path is empty".to_string()));
        }
        let is_png = self
            .output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(ExportError::InvalidRequest(format!(
                "output {} must end in .png",
                self.output.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub tmp_root: PathBuf,
    pub separator: Separator,
    pub keep_workspace: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            tmp_root: std::env::temp_dir(),
            separator: Separator::default(),
            keep_workspace: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub raster: String,
    pub epsg: u32,
    pub mode: ExportMode,
    pub image: PathBuf,
    pub world_file: Option<PathBuf>,
    pub wgs84_extent: Option<Extent>,
    pub wgs84_file: Option<PathBuf>,
    /// Set only when the workspace was kept for inspection.
    pub kept_workspace: Option<PathBuf>,
    pub teardown_warnings: Vec<String>,
}

/// A failed export after teardown has run.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExportFailure {
    pub error: ExportError,
    /// Last stage reached before the failure.
    pub stage: ExportStage,
    /// Image left on disk when a step after rendering failed.
    pub rendered_image: Option<PathBuf>,
    pub teardown: Vec<ExportError>,
}

impl ExportFailure {
    fn early(error: ExportError, stage: ExportStage) -> Self {
        Self {
            error,
            stage,
            rendered_image: None,
            teardown: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_user_error(&self) -> bool {
        self.error.is_user_error()
    }

    #[must_use]
    pub fn details(&self) -> Value {
        json!({
            "reason": self.error.reason(),
            "stage": self.stage,
            "rendered_image": self.rendered_image,
            "teardown": self.teardown.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }
}

struct Progress<'r> {
    raster: &'r RasterName,
    stage: ExportStage,
    rendered: Option<PathBuf>,
}

impl<'r> Progress<'r> {
    fn new(raster: &'r RasterName) -> Self {
        Self {
            raster,
            stage: ExportStage::Init,
            rendered: None,
        }
    }

    fn advance(&mut self, stage: ExportStage) {
        tracing::debug!(raster = %self.raster, from = %self.stage, to = %stage, "export stage");
        self.stage = stage;
    }
}

/// Source region and CRS captured before the session is switched.
struct CapturedRegion {
    region: Region,
    proj: String,
}

pub struct ReprojectionOrchestrator<'a> {
    gis: &'a dyn GisRuntime,
    settings: &'a ExportSettings,
}

impl<'a> ReprojectionOrchestrator<'a> {
    pub fn new(gis: &'a dyn GisRuntime, settings: &'a ExportSettings) -> Self {
        Self { gis, settings }
    }

    /// Exports one raster. `session` is redirected for the duration of the
    /// call and is back to its original pointer and region override when
    /// this returns, on success and on failure alike.
    pub fn export(
        &self,
        session: &mut SessionHandle,
        request: &ExportRequest,
    ) -> Result<ExportReport, ExportFailure> {
        let mut progress = Progress::new(&request.raster);
        request
            .validate()
            .map_err(|err| ExportFailure::early(err, progress.stage))?;

        let source = Workspace::from_session(session, request.raster.mapset_or_empty())
            .map_err(|err| ExportFailure::early(err, progress.stage))?;
        if !source.exists() {
            return Err(ExportFailure::early(
                ExportError::InvalidRequest(format!(
                    "mapset {} does not exist",
                    source.mapset_path().display()
                )),
                progress.stage,
            ));
        }

        let captured = match request.mode {
            ExportMode::RegionPreserving => {
                let capture_session = match &request.region_override {
                    Some(name) => session.clone().with_wind_override(Some(name.clone())),
                    None => session.clone(),
                };
                let captured = self
                    .capture_region(&capture_session)
                    .map_err(|err| ExportFailure::early(err, progress.stage))?;
                progress.advance(ExportStage::RegionCaptured);
                Some(captured)
            }
            ExportMode::MapExtent => None,
        };

        progress.advance(ExportStage::WorkspaceCreating);
        let mut ephemeral = EphemeralWorkspace::allocate(&self.settings.tmp_root, request.epsg)
            .map_err(|err| ExportFailure::early(err, progress.stage))?;
        tracing::info!(
            raster = %request.raster,
            crs = %request.epsg,
            workspace = %ephemeral.id(),
            "reprojecting"
        );

        let saved = session.save();
        let result = self.run_isolated(
            session,
            &mut ephemeral,
            &source,
            captured,
            request,
            &mut progress,
        );

        let failed_at = progress.stage;
        progress.advance(ExportStage::TearingDown);
        let mut teardown = Vec::new();
        if let Err(err) = session.restore(saved) {
            teardown.push(err);
        }
        let kept_workspace = if self.settings.keep_workspace {
            let kept = ephemeral.database().to_path_buf();
            tracing::warn!(path = %kept.display(), "keeping temporary workspace");
            Some(kept)
        } else {
            teardown.extend(ephemeral.teardown());
            None
        };
        for err in &teardown {
            tracing::warn!(reason = err.reason(), "cleanup failed: {err}");
        }

        match result {
            Ok(mut report) => {
                progress.advance(ExportStage::Done);
                report.kept_workspace = kept_workspace;
                report.teardown_warnings = teardown.iter().map(ToString::to_string).collect();
                Ok(report)
            }
            Err(error) => Err(ExportFailure {
                error,
                stage: failed_at,
                rendered_image: progress.rendered,
                teardown,
            }),
        }
    }

    fn capture_region(&self, session: &SessionHandle) -> Result<CapturedRegion, ExportError> {
        let store = RegionStore::new(self.gis, session);
        Ok(CapturedRegion {
            region: store.get()?,
            proj: store.location_proj_string()?,
        })
    }

    fn run_isolated(
        &self,
        session: &mut SessionHandle,
        ephemeral: &mut EphemeralWorkspace,
        source: &Workspace,
        captured: Option<CapturedRegion>,
        request: &ExportRequest,
        progress: &mut Progress<'_>,
    ) -> Result<ExportReport, ExportError> {
        let descriptor = write_session_descriptor(&self.settings.tmp_root, ephemeral.id())?;
        ephemeral.attach_descriptor(descriptor.clone());
        session.redirect(&descriptor);
        let session: &SessionHandle = session;

        let target = Workspace::create(self.gis, session, ephemeral.database(), request.epsg)?;
        target.set_as_current(session, None)?;
        progress.advance(ExportStage::SessionSwitched);

        let store = RegionStore::new(self.gis, session);
        let transform = ExtentTransform::new(self.gis, session, self.settings.separator.clone());
        let importer = RasterImporter::new(self.gis, session);
        match captured {
            Some(captured) => {
                let target_proj = store.location_proj_string()?;
                let bounds = transform.reproject(
                    captured.region.extent(),
                    &CrsDefinition::Proj(captured.proj),
                    &CrsDefinition::Proj(target_proj),
                )?;
                store.set(&captured.region.with_bounds(bounds))?;
            }
            None => {
                let fields = importer.destination_region(source, &request.raster)?;
                store.set_fields(&fields)?;
            }
        }
        importer.import(source, &request.raster)?;
        progress.advance(ExportStage::RegionOrRasterReprojected);

        tracing::info!(raster = %request.raster, output = %request.output.display(), "rendering");
        let rendered = Renderer::new(self.gis, session).render(
            &request.raster,
            &request.output,
            &request.render,
        )?;
        progress.rendered = Some(rendered.image.clone());
        progress.advance(ExportStage::Rendered);

        let mut wgs84_extent = None;
        if let Some(path) = &request.wgs84_file {
            tracing::debug!(path = %path.display(), "projecting bounds to LL WGS84");
            let native = match request.mode {
                // the image spans the region, which may be larger than the map
                ExportMode::RegionPreserving => store.get()?.extent(),
                ExportMode::MapExtent => {
                    store.raster_extent(&RasterName::new(request.raster.name.clone()))?
                }
            };
            let extent = transform.to_wgs84(native)?;
            extent
                .write_file(path)
                .map_err(|err| ExportError::ExtentWrite {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
            wgs84_extent = Some(extent);
            progress.advance(ExportStage::ExtentWritten);
        }

        Ok(ExportReport {
            raster: request.raster.to_string(),
            epsg: request.epsg.code(),
            mode: request.mode,
            image: rendered.image,
            world_file: rendered.world_file,
            wgs84_extent,
            wgs84_file: request.wgs84_file.clone(),
            kept_workspace: None,
            teardown_warnings: Vec::new(),
        })
    }
}
