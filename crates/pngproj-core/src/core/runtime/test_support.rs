//! In-memory stand-in for the GIS modules, backed by real directories.
//!
//! Locations, regions and raster maps are plain files under a temp dir so the
//! workspace lifecycle can be checked on disk. Coordinates are "reprojected"
//! by a per-CRS scale factor, which is enough to tell CRSs apart.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use indexmap::IndexMap;
use pngproj_domain::{parse_key_val, Extent, GisEnv, Region, WorkspaceId, PERMANENT_MAPSET};
use tempfile::TempDir;

use super::effects::{Effects, GisRuntime};
use super::module::ModuleCall;
use super::process::RunOutput;
use crate::session::SessionHandle;

pub(crate) const PROJ_FILE: &str = "PROJ_INFO";
pub(crate) const SOURCE_PROJ: &str = "+proj=utm +zone=33 +datum=WGS84 +init=epsg:32633";

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub call: ModuleCall,
    pub session: SessionHandle,
}

#[derive(Debug, Clone)]
enum Action {
    Respond(RunOutput),
    Fail(String),
    FailAfterEffects(String),
}

#[derive(Debug, Clone)]
struct Script {
    module: String,
    when: Option<(String, String)>,
    action: Action,
}

impl Script {
    fn matches(&self, call: &ModuleCall) -> bool {
        self.module == call.name
            && self
                .when
                .as_ref()
                .map_or(true, |(key, value)| call.param_value(key) == Some(value.as_str()))
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RecordedCall>,
    scripts: Vec<Script>,
    strds: HashMap<String, Vec<String>>,
    strays: Vec<(String, String)>,
}

#[derive(Default)]
pub(crate) struct FakeGis {
    state: Mutex<FakeState>,
}

impl FakeGis {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub(crate) fn module_calls(&self, name: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|recorded| recorded.call.name == name)
            .collect()
    }

    /// Answers every call to `module` with `output` and no side effects.
    pub(crate) fn respond(&self, module: &str, output: RunOutput) {
        self.script(module, None, Action::Respond(output));
    }

    /// Makes every call to `module` exit non-zero without side effects.
    pub(crate) fn fail(&self, module: &str, stderr: &str) {
        self.script(module, None, Action::Fail(stderr.to_string()));
    }

    /// Like [`FakeGis::fail`] but only when `key=value` is passed.
    pub(crate) fn fail_when(&self, module: &str, key: &str, value: &str, stderr: &str) {
        self.script(
            module,
            Some((key.to_string(), value.to_string())),
            Action::Fail(stderr.to_string()),
        );
    }

    /// Runs the module's usual side effects, then exits non-zero.
    pub(crate) fn fail_after_materializing(&self, module: &str, stderr: &str) {
        self.script(module, None, Action::FailAfterEffects(stderr.to_string()));
    }

    /// Drops a file called `name` into the active database root whenever
    /// `module` runs, before any scripted outcome applies.
    pub(crate) fn leave_stray_file(&self, module: &str, name: &str) {
        self.lock()
            .strays
            .push((module.to_string(), name.to_string()));
    }

    pub(crate) fn add_strds(&self, name: &str, maps: &[&str]) {
        self.lock().strds.insert(
            name.to_string(),
            maps.iter().map(ToString::to_string).collect(),
        );
    }

    fn script(&self, module: &str, when: Option<(String, String)>, action: Action) {
        self.lock().scripts.push(Script {
            module: module.to_string(),
            when,
            action,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emulate(&self, call: &ModuleCall, session: &SessionHandle) -> Result<String, String> {
        match call.name.as_str() {
            "m.proj" => m_proj(call, session),
            "t.rast.list" => self.t_rast_list(call),
            _ => {
                let current = session
                    .current(None)
                    .map_err(|err| format!("ERROR: {err}"))?;
                let ctx = Ctx {
                    current,
                    wind_override: session.wind_override().map(ToOwned::to_owned),
                };
                match call.name.as_str() {
                    "g.proj" => ctx.g_proj(call),
                    "g.region" => ctx.g_region(call),
                    "r.info" => ctx.r_info(call),
                    "r.proj" => ctx.r_proj(call),
                    "r.out.png" => ctx.r_out_png(call),
                    "d.rast" => ctx.d_rast(call),
                    other => Err(format!("ERROR: unknown module {other}")),
                }
            }
        }
    }

    fn t_rast_list(&self, call: &ModuleCall) -> Result<String, String> {
        let input = call.param_value("input").unwrap_or_default();
        let state = self.lock();
        let maps = state
            .strds
            .get(input)
            .ok_or_else(|| format!("ERROR: space time raster dataset <{input}> not found"))?;
        Ok(maps.iter().map(|map| format!("{map}\n")).collect())
    }
}

impl GisRuntime for FakeGis {
    fn run(&self, call: &ModuleCall, session: &SessionHandle) -> Result<RunOutput> {
        let script = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                call: call.clone(),
                session: session.clone(),
            });
            let strays: Vec<String> = state
                .strays
                .iter()
                .filter(|(module, _)| *module == call.name)
                .map(|(_, name)| name.clone())
                .collect();
            let action = state
                .scripts
                .iter()
                .find(|script| script.matches(call))
                .map(|script| script.action.clone());
            (strays, action)
        };
        let (strays, script) = script;
        if !strays.is_empty() {
            let current = session.current(None)?;
            for name in strays {
                fs::write(current.database.join(name), "stray\n")?;
            }
        }
        let output = match script {
            Some(Action::Respond(output)) => output,
            Some(Action::Fail(stderr)) => failed(stderr),
            Some(Action::FailAfterEffects(stderr)) => {
                let _ = self.emulate(call, session);
                failed(stderr)
            }
            None => match self.emulate(call, session) {
                Ok(stdout) => RunOutput {
                    code: 0,
                    stdout,
                    stderr: String::new(),
                },
                Err(stderr) => failed(stderr),
            },
        };
        Ok(output)
    }
}

fn failed(stderr: String) -> RunOutput {
    RunOutput {
        code: 1,
        stdout: String::new(),
        stderr,
    }
}

struct Ctx {
    current: WorkspaceId,
    wind_override: Option<String>,
}

impl Ctx {
    fn g_proj(&self, call: &ModuleCall) -> Result<String, String> {
        if call.has_flag('c') {
            let epsg = call.param_value("epsg").ok_or("ERROR: epsg required")?;
            let location = call.param_value("location").ok_or("ERROR: location required")?;
            let permanent = self
                .current
                .database
                .join(location)
                .join(PERMANENT_MAPSET);
            fs::create_dir_all(&permanent).map_err(io_err)?;
            fs::write(permanent.join(PROJ_FILE), format!("+init=epsg:{epsg}\n")).map_err(io_err)?;
            let default = Region::from_extent(Extent::new(1.0, 1.0, 0.0, 0.0), 1, 1);
            write_region(&permanent.join("WIND"), &default)?;
            return Ok(String::new());
        }
        location_proj(&self.current).map(|proj| format!("{proj}\n"))
    }

    fn region_file(&self) -> PathBuf {
        let mapset = self.current.mapset_path();
        match &self.wind_override {
            Some(name) => mapset.join("windows").join(name),
            None => mapset.join("WIND"),
        }
    }

    fn region(&self) -> Result<Region, String> {
        read_region(&self.region_file())
    }

    fn g_region(&self, call: &ModuleCall) -> Result<String, String> {
        if call.params.is_empty() {
            let region = self.region()?;
            return Ok(format!(
                "projection=99\nzone=0\n{}nsres={}\newres={}\ncells={}\n",
                region_body(&region, "\n"),
                region.nsres,
                region.ewres,
                region.rows * region.cols,
            ));
        }
        let region = self.region()?;
        let number = |key: &str, fallback: f64| -> Result<f64, String> {
            call.param_value(key).map_or(Ok(fallback), |raw| {
                raw.parse::<f64>()
                    .map_err(|_| format!("ERROR: invalid {key}={raw}"))
            })
        };
        let extent = Extent::new(
            number("e", region.east)?,
            number("n", region.north)?,
            number("w", region.west)?,
            number("s", region.south)?,
        );
        let rows = number("rows", region.rows as f64)? as u64;
        let cols = number("cols", region.cols as f64)? as u64;
        write_region(&self.region_file(), &Region::from_extent(extent, rows, cols))?;
        Ok(String::new())
    }

    fn r_info(&self, call: &ModuleCall) -> Result<String, String> {
        let map = call.param_value("map").ok_or("ERROR: map required")?;
        let (name, mapset) = match map.split_once('@') {
            Some((name, mapset)) => (name, Some(mapset)),
            None => (map, None),
        };
        let mapset_path = match mapset {
            Some(mapset) => self.current.location_path().join(mapset),
            None => self.current.mapset_path(),
        };
        let region = read_region(&mapset_path.join("cell").join(name))
            .map_err(|_| format!("ERROR: Raster map <{map}> not found"))?;
        Ok(format!(
            "{}nsres={}\newres={}\ndatatype=FCELL\n",
            region_body(&region, "\n"),
            region.nsres,
            region.ewres
        ))
    }

    fn r_proj(&self, call: &ModuleCall) -> Result<String, String> {
        let param = |key: &str| {
            call.param_value(key)
                .ok_or_else(|| format!("ERROR: {key} required"))
        };
        let input = param("input")?;
        let source = WorkspaceId::new(param("dbase")?, param("location")?, param("mapset")?);
        let map = read_region(&source.mapset_path().join("cell").join(input))
            .map_err(|_| format!("ERROR: Raster map <{input}@{}> not found", source.mapset))?;
        let factor = scale(&location_proj(&self.current)?) / scale(&location_proj(&source)?);
        let extent = map.extent();
        let reprojected = Region::from_extent(
            Extent::new(
                extent.east * factor,
                extent.north * factor,
                extent.west * factor,
                extent.south * factor,
            ),
            map.rows,
            map.cols,
        );
        if call.has_flag('g') {
            return Ok(format!("{}\n", region_body(&reprojected, " ").trim_end()));
        }
        let output = param("output")?;
        let cell = self.current.mapset_path().join("cell");
        fs::create_dir_all(&cell).map_err(io_err)?;
        write_region(&cell.join(output), &reprojected)?;
        Ok(String::new())
    }

    fn r_out_png(&self, call: &ModuleCall) -> Result<String, String> {
        let input = call.param_value("input").ok_or("ERROR: input required")?;
        let output = PathBuf::from(call.param_value("output").ok_or("ERROR: output required")?);
        if !self.current.mapset_path().join("cell").join(input).is_file() {
            return Err(format!("ERROR: Raster map <{input}> not found"));
        }
        let region = self.region()?;
        fs::write(&output, format!("PNG {}x{}\n", region.cols, region.rows)).map_err(io_err)?;
        if call.has_flag('w') {
            fs::write(
                output.with_extension("wld"),
                format!(
                    "{}\n0\n0\n{}\n{}\n{}\n",
                    region.ewres, -region.nsres, region.west, region.north
                ),
            )
            .map_err(io_err)?;
        }
        Ok(String::new())
    }

    fn d_rast(&self, call: &ModuleCall) -> Result<String, String> {
        let map = call.param_value("map").ok_or("ERROR: map required")?;
        if !self.current.mapset_path().join("cell").join(map).is_file() {
            return Err(format!("ERROR: Raster map <{map}> not found"));
        }
        let file = call
            .env_value("GRASS_RENDER_FILE")
            .ok_or("ERROR: no render file")?;
        let width = call.env_value("GRASS_RENDER_WIDTH").unwrap_or("0");
        let height = call.env_value("GRASS_RENDER_HEIGHT").unwrap_or("0");
        fs::write(file, format!("PNG {width}x{height}\n")).map_err(io_err)?;
        Ok(String::new())
    }
}

fn m_proj(call: &ModuleCall, session: &SessionHandle) -> Result<String, String> {
    let current_proj = || -> Result<String, String> {
        let current = session.current(None).map_err(|err| format!("ERROR: {err}"))?;
        location_proj(&current)
    };
    let from = if call.has_flag('i') {
        1.0
    } else {
        match call.param_value("proj_in") {
            Some(proj) => scale(proj),
            None => scale(&current_proj()?),
        }
    };
    let to = if call.has_flag('o') {
        1.0
    } else {
        match call.param_value("proj_out") {
            Some(proj) => scale(proj),
            None => scale(&current_proj()?),
        }
    };
    let sep = match call.param_value("separator").unwrap_or("pipe") {
        "space" => " ",
        "comma" => ",",
        "pipe" => "|",
        "tab" => "\t",
        other => other,
    }
    .to_string();
    let input = call.input.as_deref().unwrap_or_default();
    let mut out = String::new();
    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let fields: Vec<&str> = if sep.trim().is_empty() {
            line.split_whitespace().collect()
        } else {
            line.split(sep.as_str()).map(str::trim).collect()
        };
        let coord = |index: usize| -> Result<f64, String> {
            fields
                .get(index)
                .and_then(|raw| raw.parse::<f64>().ok())
                .ok_or_else(|| format!("ERROR: cannot parse `{line}`"))
        };
        let (x, y) = (coord(0)? * to / from, coord(1)? * to / from);
        out.push_str(&format!("{x}{sep}{y}{sep}0\n"));
    }
    Ok(out)
}

/// Units per degree of the fake projections.
pub(crate) fn scale(proj: &str) -> f64 {
    if proj.contains("epsg:3857") {
        100_000.0
    } else if proj.contains("epsg:32633") {
        1_000.0
    } else {
        1.0
    }
}

fn location_proj(id: &WorkspaceId) -> Result<String, String> {
    let path = id.location_path().join(PERMANENT_MAPSET).join(PROJ_FILE);
    fs::read_to_string(&path)
        .map(|text| text.trim().to_string())
        .map_err(|_| format!("ERROR: no projection information in {}", path.display()))
}

fn region_body(region: &Region, sep: &str) -> String {
    format!(
        "n={n}{sep}s={s}{sep}w={w}{sep}e={e}{sep}rows={rows}{sep}cols={cols}{sep}",
        n = region.north,
        s = region.south,
        w = region.west,
        e = region.east,
        rows = region.rows,
        cols = region.cols,
    )
}

pub(crate) fn write_region(path: &Path, region: &Region) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, region_body(region, "\n")).map_err(io_err)
}

fn read_region(path: &Path) -> Result<Region, String> {
    let text = fs::read_to_string(path).map_err(io_err)?;
    let fields: IndexMap<String, String> = parse_key_val(&text);
    let extent = Extent::from_fields(&fields).map_err(|err| err.to_string())?;
    let count = |key: &str| {
        fields
            .get(key)
            .and_then(|raw| raw.parse::<u64>().ok())
            .ok_or_else(|| format!("ERROR: bad {key} in {}", path.display()))
    };
    Ok(Region::from_extent(extent, count("rows")?, count("cols")?))
}

/// [`Effects`] backed by a [`FakeGis`], for code that goes through a command
/// context.
#[derive(Default)]
pub(crate) struct FakeEffects {
    pub gis: FakeGis,
}

impl FakeEffects {
    pub(crate) fn new(gis: FakeGis) -> Self {
        Self { gis }
    }
}

impl Effects for FakeEffects {
    fn gis(&self) -> &dyn GisRuntime {
        &self.gis
    }
}

fn io_err(err: std::io::Error) -> String {
    format!("ERROR: {err}")
}

/// A source database with one location, a user mapset holding a raster map,
/// and a session descriptor pointing at it.
pub(crate) struct SourceFixture {
    pub gis: FakeGis,
    pub session: SessionHandle,
    pub gisrc: PathBuf,
    pub source: WorkspaceId,
    pub region: Region,
    pub raster_extent: Extent,
    pub proj: String,
    pub tmp_root: PathBuf,
    pub dir: TempDir,
}

impl SourceFixture {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = WorkspaceId::new(dir.path().join("grassdata"), "utm33", "user1");
        let permanent = source.location_path().join(PERMANENT_MAPSET);
        fs::create_dir_all(&permanent).unwrap();
        fs::write(permanent.join(PROJ_FILE), format!("{SOURCE_PROJ}\n")).unwrap();

        let region = Region::from_extent(Extent::new(650.0, 230.0, 630.0, 215.0), 15, 20);
        write_region(&source.mapset_path().join("WIND"), &region).unwrap();
        let raster = Region::from_extent(Extent::new(660.0, 240.0, 620.0, 210.0), 30, 40);
        write_region(&source.mapset_path().join("cell").join("elevation"), &raster).unwrap();

        let gisrc = dir.path().join("gisrc");
        fs::write(&gisrc, GisEnv::for_workspace(&source).render()).unwrap();
        let tmp_root = dir.path().join("scratch");
        fs::create_dir_all(&tmp_root).unwrap();

        Self {
            gis: FakeGis::new(),
            session: SessionHandle::new(&gisrc),
            gisrc,
            source,
            region,
            raster_extent: raster.extent(),
            proj: SOURCE_PROJ.to_string(),
            tmp_root,
            dir,
        }
    }

    /// Adds another raster map to the source mapset.
    pub(crate) fn add_raster(&self, name: &str, extent: Extent, rows: u64, cols: u64) {
        let path = self.source.mapset_path().join("cell").join(name);
        write_region(&path, &Region::from_extent(extent, rows, cols)).unwrap();
    }

    /// Stores a named region usable as a region override.
    pub(crate) fn add_saved_region(&self, name: &str, region: &Region) {
        let path = self.source.mapset_path().join("windows").join(name);
        write_region(&path, region).unwrap();
    }

    /// Entries left in the scratch directory.
    pub(crate) fn scratch_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.tmp_root)
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }
}
