//! Batch export of several rasters for a Leaflet page.
//!
//! Every map goes through [`ReprojectionOrchestrator`] on its own. The CSV and
//! JS manifests are rewritten after each map, so a failure part way through
//! still leaves manifests describing the maps exported so far.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use pngproj_domain::{EpsgCode, Extent, LayerInfo, LayerManifest, RasterName};

use crate::effects::GisRuntime;
use crate::errors::{spawn_diagnostics, ExportError};
use crate::export::{
    ExportFailure, ExportMode, ExportRequest, ExportSettings, ReprojectionOrchestrator,
};
use crate::module::ModuleCall;
use crate::render::{RenderBackend, RenderOptions, DEFAULT_COMPRESSION};
use crate::session::SessionHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum LeafletInput {
    Rasters(Vec<RasterName>),
    /// Maps registered in a space time raster dataset, optionally filtered
    /// by a temporal SQL condition.
    Strds {
        name: String,
        where_clause: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct LeafletRequest {
    pub input: LeafletInput,
    pub output_dir: PathBuf,
    pub epsg: EpsgCode,
    /// One value for all maps, or one per map.
    pub opacity: Vec<f64>,
    pub compression: u8,
    pub no_transparency: bool,
    pub world_file: bool,
    pub backend: RenderBackend,
    pub mode: ExportMode,
}

impl LeafletRequest {
    pub fn new(input: LeafletInput, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output_dir: output_dir.into(),
            epsg: EpsgCode::WEB_MERCATOR,
            opacity: vec![1.0],
            compression: DEFAULT_COMPRESSION,
            no_transparency: false,
            world_file: false,
            backend: RenderBackend::default(),
            mode: ExportMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafletReport {
    pub output_dir: PathBuf,
    pub layers: Vec<LayerInfo>,
    pub csv_file: PathBuf,
    pub js_file: PathBuf,
    pub teardown_warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LeafletError {
    #[error(transparent)]
    Request(ExportError),
    #[error("failed to export {raster} ({exported} of {total} maps done): {failure}")]
    Map {
        raster: String,
        exported: usize,
        total: usize,
        failure: ExportFailure,
    },
    #[error("failed to write {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },
}

impl LeafletError {
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            LeafletError::Request(err) => err.is_user_error(),
            LeafletError::Map { failure, .. } => failure.is_user_error(),
            LeafletError::Manifest { .. } => false,
        }
    }

    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            LeafletError::Request(err) => json!({ "reason": err.reason() }),
            LeafletError::Map {
                raster,
                exported,
                total,
                failure,
            } => {
                let mut details = failure.details();
                details["raster"] = json!(raster);
                details["exported"] = json!(exported);
                details["total"] = json!(total);
                details
            }
            LeafletError::Manifest { path, .. } => json!({
                "reason": "manifest_write",
                "path": path,
            }),
        }
    }
}

/// Exports every requested map into `output_dir` as `<name>.png` with its
/// `.wgs84` extent file, and writes `data_file.csv` and `data_file.js`.
/// Stops at the first map that fails.
pub fn export_leaflet(
    gis: &dyn GisRuntime,
    settings: &ExportSettings,
    session: &mut SessionHandle,
    request: &LeafletRequest,
) -> Result<LeafletReport, LeafletError> {
    let maps = resolve_maps(gis, session, &request.input)?;
    if !request.output_dir.is_dir() {
        return Err(invalid(format!(
            "output directory {} does not exist; create it before exporting",
            request.output_dir.display()
        )));
    }
    let opacities = expand_opacity(&request.opacity, maps.len())?;

    let orchestrator = ReprojectionOrchestrator::new(gis, settings);
    let mut manifest = LayerManifest::new();
    let mut teardown_warnings = Vec::new();
    for (index, (raster, opacity)) in maps.iter().zip(opacities).enumerate() {
        let file = format!("{}.png", raster.name);
        let image = request.output_dir.join(&file);
        let wgs84_file = ExportRequest::default_wgs84_file(&image);
        let export = ExportRequest {
            raster: raster.clone(),
            output: image,
            epsg: request.epsg,
            mode: request.mode,
            render: RenderOptions {
                compression: request.compression,
                transparent_nulls: !request.no_transparency,
                world_file: request.world_file,
                backend: request.backend,
            },
            wgs84_file: Some(wgs84_file.clone()),
            region_override: None,
        };
        tracing::info!(raster = %raster, "exporting map {} of {}", index + 1, maps.len());
        let report = orchestrator
            .export(session, &export)
            .map_err(|failure| LeafletError::Map {
                raster: raster.to_string(),
                exported: index,
                total: maps.len(),
                failure,
            })?;
        teardown_warnings.extend(report.teardown_warnings);

        let bounds = Extent::read_file(&wgs84_file).map_err(|err| LeafletError::Manifest {
            path: wgs84_file.clone(),
            reason: format!("{err:#}"),
        })?;
        manifest.push(LayerInfo {
            title: raster.name.clone(),
            file,
            bounds,
            opacity,
        });
        write_manifests(&request.output_dir, &manifest)?;
    }

    Ok(LeafletReport {
        output_dir: request.output_dir.clone(),
        layers: manifest.layers().to_vec(),
        csv_file: request.output_dir.join(LayerManifest::CSV_FILE),
        js_file: request.output_dir.join(LayerManifest::JS_FILE),
        teardown_warnings,
    })
}

fn resolve_maps(
    gis: &dyn GisRuntime,
    session: &SessionHandle,
    input: &LeafletInput,
) -> Result<Vec<RasterName>, LeafletError> {
    match input {
        LeafletInput::Rasters(maps) if maps.is_empty() => {
            Err(invalid("at least one raster map is required".to_string()))
        }
        LeafletInput::Rasters(maps) => Ok(maps.clone()),
        LeafletInput::Strds { name, where_clause } => {
            let maps = list_strds(gis, session, name, where_clause.as_deref())?;
            if maps.is_empty() {
                return Err(invalid(format!(
                    "no maps in space time raster dataset <{name}>; the dataset is empty \
                     or the WHERE condition filtered all maps out"
                )));
            }
            Ok(maps)
        }
    }
}

fn list_strds(
    gis: &dyn GisRuntime,
    session: &SessionHandle,
    name: &str,
    where_clause: Option<&str>,
) -> Result<Vec<RasterName>, LeafletError> {
    let call = ModuleCall::new("t.rast.list")
        .flags("u")
        .param("input", name)
        .param("columns", "id")
        .param_opt("where", where_clause.filter(|clause| !clause.trim().is_empty()))
        .quiet();
    let output = gis
        .run(&call, session)
        .map_err(|err| invalid(spawn_diagnostics(&err)))?;
    if !output.success() {
        return Err(invalid(output.diagnostics()));
    }
    output
        .stdout
        .split(|c: char| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<RasterName>()
                .map_err(|err| invalid(format!("unexpected map id `{id}`: {err}")))
        })
        .collect()
}

fn expand_opacity(opacity: &[f64], maps: usize) -> Result<Vec<f64>, LeafletError> {
    if let Some(bad) = opacity.iter().find(|value| !(0.0..=1.0).contains(*value)) {
        return Err(invalid(format!("opacity {bad} is outside 0-1")));
    }
    match opacity {
        [] => Ok(vec![1.0; maps]),
        [single] => Ok(vec![*single; maps]),
        values if values.len() == maps => Ok(values.to_vec()),
        values => Err(invalid(format!(
            "number of opacities <{}> does not match number of maps <{maps}>",
            values.len()
        ))),
    }
}

fn write_manifests(dir: &Path, manifest: &LayerManifest) -> Result<(), LeafletError> {
    for (name, contents) in [
        (LayerManifest::CSV_FILE, manifest.render_csv()),
        (LayerManifest::JS_FILE, manifest.render_js()),
    ] {
        let path = dir.join(name);
        fs::write(&path, contents).map_err(|err| LeafletError::Manifest {
            path: path.clone(),
            reason: err.to_string(),
        })?;
    }
    Ok(())
}

fn invalid(message: String) -> LeafletError {
    LeafletError::Request(ExportError::InvalidRequest(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_support::SourceFixture;
    use tempfile::tempdir;

    fn settings(fixture: &SourceFixture) -> ExportSettings {
        ExportSettings {
            tmp_root: fixture.tmp_root.clone(),
            ..ExportSettings::default()
        }
    }

    fn rasters(names: &[&str]) -> LeafletInput {
        LeafletInput::Rasters(names.iter().map(|name| name.parse().unwrap()).collect())
    }

    fn request(input: LeafletInput, dir: &Path) -> LeafletRequest {
        let mut request = LeafletRequest::new(input, dir);
        request.backend = RenderBackend::RoutPng;
        request
    }

    #[test]
    fn two_maps_produce_well_formed_manifests() {
        let fixture = SourceFixture::new();
        fixture.add_raster("slope", Extent::new(640.0, 225.0, 635.0, 220.0), 5, 5);
        let out = tempdir().unwrap();
        let mut req = request(rasters(&["elevation", "slope@user1"]), out.path());
        req.opacity = vec![0.5, 1.0];

        let mut session = fixture.session.clone();
        let report = export_leaflet(&fixture.gis, &settings(&fixture), &mut session, &req).unwrap();

        assert_eq!(report.layers.len(), 2);
        assert_eq!(
            fs::read_to_string(out.path().join("data_file.csv")).unwrap(),
            "elevation,elevation.png\nslope,slope.png\n"
        );
        let js = fs::read_to_string(out.path().join("data_file.js")).unwrap();
        assert!(js.starts_with("/* This file was generated"));
        assert!(js.contains(
            "var layerInfos = [\n   {title: \"elevation\", file: \"elevation.png\""
        ));
        assert!(js.contains("opacity: 0.5}\n,   {title: \"slope\""));
        assert!(js.ends_with("opacity: 1}\n];\n"));
        for name in ["elevation", "slope"] {
            assert!(out.path().join(format!("{name}.png")).is_file());
            assert!(out.path().join(format!("{name}.png.wgs84")).is_file());
        }

        let render = fixture.gis.module_calls("r.out.png");
        assert!(render.iter().all(|recorded| recorded.call.has_flag('t')));
        assert_eq!(session, fixture.session);
        assert!(fixture.scratch_entries().is_empty());
    }

    #[test]
    fn strds_members_are_listed_with_where_clause() {
        let fixture = SourceFixture::new();
        fixture.add_raster("temp_1", Extent::new(640.0, 225.0, 635.0, 220.0), 5, 5);
        fixture.add_raster("temp_2", Extent::new(640.0, 225.0, 635.0, 220.0), 5, 5);
        fixture.gis.add_strds("temps", &["temp_1@user1", "temp_2@user1"]);
        let out = tempdir().unwrap();
        let mut req = request(
            LeafletInput::Strds {
                name: "temps".into(),
                where_clause: Some("start_time > '2020-01-01'".into()),
            },
            out.path(),
        );
        req.no_transparency = true;

        let mut session = fixture.session.clone();
        let report = export_leaflet(&fixture.gis, &settings(&fixture), &mut session, &req).unwrap();
        let titles: Vec<_> = report.layers.iter().map(|layer| layer.title.as_str()).collect();
        assert_eq!(titles, ["temp_1", "temp_2"]);

        let list = &fixture.gis.module_calls("t.rast.list")[0];
        assert_eq!(list.call.param_value("where"), Some("start_time > '2020-01-01'"));
        assert_eq!(list.session, fixture.session);
        assert!(fixture
            .gis
            .module_calls("r.out.png")
            .iter()
            .all(|recorded| !recorded.call.has_flag('t')));
    }

    #[test]
    fn empty_strds_is_user_error() {
        let fixture = SourceFixture::new();
        fixture.gis.add_strds("empty", &[]);
        let out = tempdir().unwrap();
        let req = request(
            LeafletInput::Strds {
                name: "empty".into(),
                where_clause: None,
            },
            out.path(),
        );
        let mut session = fixture.session.clone();
        let err =
            export_leaflet(&fixture.gis, &settings(&fixture), &mut session, &req).unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn opacity_count_must_match_maps() {
        assert_eq!(expand_opacity(&[0.3], 3).unwrap(), vec![0.3; 3]);
        assert_eq!(expand_opacity(&[0.1, 0.2], 2).unwrap(), vec![0.1, 0.2]);
        assert!(expand_opacity(&[0.1, 0.2], 3).is_err());
        assert!(expand_opacity(&[1.5], 1).is_err());
        assert!(expand_opacity(&[-0.1, 0.5], 2).is_err());
    }

    #[test]
    fn missing_output_directory_is_rejected_before_exporting() {
        let fixture = SourceFixture::new();
        let out = tempdir().unwrap();
        let req = request(rasters(&["elevation"]), &out.path().join("nope"));
        let mut session = fixture.session.clone();
        let err =
            export_leaflet(&fixture.gis, &settings(&fixture), &mut session, &req).unwrap_err();
        assert!(matches!(err, LeafletError::Request(ExportError::InvalidRequest(_))));
        assert!(fixture.gis.calls().is_empty());
    }

    #[test]
    fn failing_map_stops_batch_and_keeps_earlier_entries() {
        let fixture = SourceFixture::new();
        let out = tempdir().unwrap();
        fixture
            .gis
            .fail_when("r.proj", "input", "missing", "ERROR: Raster map <missing> not found");
        let req = request(rasters(&["elevation", "missing", "elevation"]), out.path());
        let mut session = fixture.session.clone();
        let err =
            export_leaflet(&fixture.gis, &settings(&fixture), &mut session, &req).unwrap_err();

        match &err {
            LeafletError::Map {
                raster,
                exported,
                failure,
                ..
            } => {
                assert_eq!(raster, "missing");
                assert_eq!(*exported, 1);
                assert!(matches!(failure.error, ExportError::RasterImport { .. }));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(err.details()["reason"], "raster_import");
        assert_eq!(
            fs::read_to_string(out.path().join("data_file.csv")).unwrap(),
            "elevation,elevation.png\n"
        );
        assert_eq!(session, fixture.session);
        assert!(fixture.scratch_entries().is_empty());
    }
}
