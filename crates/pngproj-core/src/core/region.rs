//! Computational region of the session's current workspace.

use pngproj_domain::{parse_key_val, Extent, RasterName, Region, RegionFields};

use crate::effects::GisRuntime;
use crate::errors::{spawn_diagnostics, ExportError};
use crate::module::ModuleCall;
use crate::process::RunOutput;
use crate::session::SessionHandle;

/// Reads and writes the region through `g.region`, always inside the given
/// session.
pub struct RegionStore<'a> {
    gis: &'a dyn GisRuntime,
    session: &'a SessionHandle,
}

impl<'a> RegionStore<'a> {
    pub fn new(gis: &'a dyn GisRuntime, session: &'a SessionHandle) -> Self {
        Self { gis, session }
    }

    pub fn get(&self) -> Result<Region, ExportError> {
        let call = ModuleCall::new("g.region").flags("pg");
        let output = self.run(&call, read_failed)?;
        Region::from_fields(&parse_key_val(&output.stdout)).map_err(|err| {
            ExportError::RegionRead {
                reason: err.to_string(),
            }
        })
    }

    pub fn set(&self, region: &Region) -> Result<(), ExportError> {
        self.set_fields(&region.to_fields())
    }

    /// Applies a loosely typed update. Bounds may be spelled `n` or
    /// `north`; all four must be present. Other keys are forwarded as is.
    pub fn set_fields(&self, fields: &RegionFields) -> Result<(), ExportError> {
        let params = fields
            .normalized()
            .map_err(|err| ExportError::RegionFieldMismatch {
                reason: err.to_string(),
            })?;
        let call = ModuleCall::new("g.region").params(params).quiet();
        self.run(&call, |reason| ExportError::RegionWrite { reason })?;
        tracing::debug!(gisrc = ?self.session.gisrc(), "region updated");
        Ok(())
    }

    /// PROJ definition of the current location, as printed by `g.proj -jf`.
    pub fn location_proj_string(&self) -> Result<String, ExportError> {
        let call = ModuleCall::new("g.proj").flags("jf");
        let output = self.run(&call, read_failed)?;
        let definition = output.stdout.trim();
        if definition.is_empty() {
            return Err(ExportError::RegionRead {
                reason: "location has no projection definition".to_string(),
            });
        }
        Ok(definition.to_string())
    }

    /// Native bounds of a raster map, from `r.info -g`.
    pub fn raster_extent(&self, raster: &RasterName) -> Result<Extent, ExportError> {
        let call = ModuleCall::new("r.info")
            .flags("g")
            .param("map", raster);
        let output = self.run(&call, read_failed)?;
        Extent::from_fields(&parse_key_val(&output.stdout)).map_err(|err| {
            ExportError::RegionRead {
                reason: format!("{raster}: {err}"),
            }
        })
    }

    fn run(
        &self,
        call: &ModuleCall,
        failed: impl Fn(String) -> ExportError,
    ) -> Result<RunOutput, ExportError> {
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

fn read_failed(reason: String) -> ExportError {
    ExportError::RegionRead { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_support::{FakeGis, SourceFixture};

    #[test]
    fn get_reads_fixture_region() {
        let fixture = SourceFixture::new();
        let store = RegionStore::new(&fixture.gis, &fixture.session);
        let region = store.get().unwrap();
        assert_eq!(region, fixture.region);
    }

    #[test]
    fn set_then_get_round_trips_bounds_and_grid() {
        let fixture = SourceFixture::new();
        let store = RegionStore::new(&fixture.gis, &fixture.session);
        let target = Region::from_extent(Extent::new(20.0, 60.0, 10.0, 40.0), 20, 10);
        store.set(&target).unwrap();
        let back = store.get().unwrap();
        assert!(back.extent().approx_eq(&target.extent(), 1e-9));
        assert_eq!((back.rows, back.cols), (20, 10));
        assert!((back.nsres - 1.0).abs() < 1e-9);
    }

    #[test]
    fn set_fields_accepts_mixed_spellings() {
        let fixture = SourceFixture::new();
        let store = RegionStore::new(&fixture.gis, &fixture.session);
        let mut fields = RegionFields::new();
        fields.insert("north", "5");
        fields.insert("s", "1");
        fields.insert("east", "8");
        fields.insert("w", "4");
        fields.insert("rows", "4");
        fields.insert("cols", "4");
        store.set_fields(&fields).unwrap();
        let region = store.get().unwrap();
        assert_eq!(region.extent(), Extent::new(8.0, 5.0, 4.0, 1.0));
    }

    #[test]
    fn set_fields_missing_bound_is_field_mismatch() {
        let fixture = SourceFixture::new();
        let store = RegionStore::new(&fixture.gis, &fixture.session);
        let mut fields = RegionFields::new();
        fields.insert("n", "5");
        fields.insert("s", "1");
        fields.insert("e", "8");
        let err = store.set_fields(&fields).unwrap_err();
        assert!(matches!(
            err,
            ExportError::RegionFieldMismatch { ref reason } if reason.contains('w')
        ));
        assert_eq!(store.get().unwrap(), fixture.region);
    }

    #[test]
    fn module_failure_is_region_read() {
        let fixture = SourceFixture::new();
        fixture.gis.fail("g.region", "ERROR: region file missing");
        let err = RegionStore::new(&fixture.gis, &fixture.session)
            .get()
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::RegionRead { ref reason } if reason.contains("region file missing")
        ));
    }

    #[test]
    fn location_proj_string_is_trimmed() {
        let fixture = SourceFixture::new();
        let store = RegionStore::new(&fixture.gis, &fixture.session);
        assert_eq!(store.location_proj_string().unwrap(), fixture.proj);
    }

    #[test]
    fn raster_extent_reads_map_bounds() {
        let fixture = SourceFixture::new();
        let store = RegionStore::new(&fixture.gis, &fixture.session);
        let extent = store.raster_extent(&"elevation".parse().unwrap()).unwrap();
        assert_eq!(extent, fixture.raster_extent);
    }

    #[test]
    fn no_session_fails_before_running() {
        let gis = FakeGis::new();
        let session = SessionHandle::detached();
        let err = RegionStore::new(&gis, &session).get().unwrap_err();
        assert!(matches!(err, ExportError::RegionRead { .. }));
    }
}
