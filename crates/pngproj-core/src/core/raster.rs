use pngproj_domain::{parse_key_val_words, RasterName, RegionFields};

use crate::effects::GisRuntime;
use crate::errors::{spawn_diagnostics, ExportError};
use crate::module::ModuleCall;
use crate::process::RunOutput;
use crate::session::SessionHandle;
use crate::workspace::Workspace;

/// Pulls a raster map from a source workspace into the session's current
/// one with `r.proj`, which handles the resampling.
pub struct RasterImporter<'a> {
    gis: &'a dyn GisRuntime,
    session: &'a SessionHandle,
}

impl<'a> RasterImporter<'a> {
    pub fn new(gis: &'a dyn GisRuntime, session: &'a SessionHandle) -> Self {
        Self { gis, session }
    }

    /// Region that would hold the whole map once reprojected, as printed by
    /// `r.proj -g`. The fields go straight to `g.region`.
    pub fn destination_region(
        &self,
        source: &Workspace,
        raster: &RasterName,
    ) -> Result<RegionFields, ExportError> {
        let call = import_call(source, raster).flags("g");
        let output = self.run(&call, raster)?;
        let fields = parse_key_val_words(&output.stdout);
        if fields.is_empty() {
            return Err(ExportError::RasterImport {
                raster: raster.to_string(),
                diagnostics: "no destination region reported".to_string(),
            });
        }
        Ok(RegionFields::from(fields))
    }

    /// Imports `raster` under its bare name into the current region.
    pub fn import(&self, source: &Workspace, raster: &RasterName) -> Result<(), ExportError> {
        let call = import_call(source, raster).quiet();
        self.run(&call, raster)?;
        tracing::debug!(%raster, source = %source.id(), "imported raster");
        Ok(())
    }

    fn run(&self, call: &ModuleCall, raster: &RasterName) -> Result<RunOutput, ExportError> {
        let failed = |diagnostics: String| ExportError::RasterImport {
            raster: raster.to_string(),
            diagnostics,
        };
        let output = self
            .gis
            .run(call, self.session)
            .map_err(|err| failed(spawn_diagnostics(&err)))?;
        if output.success() {
            Ok(output)
        } else {
            Err(failed(output.diagnostics()))
        }
    }
}

fn import_call(source: &Workspace, raster: &RasterName) -> ModuleCall {
    let id = source.id();
    ModuleCall::new("r.proj")
        .param("input", &raster.name)
        .param("location", &id.location)
        .param("mapset", &id.mapset)
        .param("dbase", id.database.display())
        .param("output", &raster.name)
}
