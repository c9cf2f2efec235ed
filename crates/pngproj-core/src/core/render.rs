//! Image rendering through one of two GIS backends.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pngproj_domain::RasterName;

use crate::effects::GisRuntime;
use crate::errors::{spawn_diagnostics, ExportError};
use crate::module::ModuleCall;
use crate::region::RegionStore;
use crate::session::SessionHandle;

pub const DEFAULT_COMPRESSION: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderBackend {
    /// Direct export with `r.out.png`.
    #[serde(rename = "r.out.png")]
    RoutPng,
    /// Display module `d.rast` on the cairo driver.
    #[serde(rename = "d.rast")]
    DRast,
}

impl RenderBackend {
    #[must_use]
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            RenderBackend::DRast
        } else {
            RenderBackend::RoutPng
        }
    }
}

impl Default for RenderBackend {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl FromStr for RenderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "r.out.png" => Ok(RenderBackend::RoutPng),
            "d.rast" => Ok(RenderBackend::DRast),
            other => Err(format!(
                "unknown render backend `{other}` (expected r.out.png or d.rast)"
            )),
        }
    }
}

impl fmt::Display for RenderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderBackend::RoutPng => "r.out.png",
            RenderBackend::DRast => "d.rast",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub compression: u8,
    pub transparent_nulls: bool,
    pub world_file: bool,
    pub backend: RenderBackend,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            transparent_nulls: false,
            world_file: false,
            backend: RenderBackend::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedImage {
    pub image: PathBuf,
    pub world_file: Option<PathBuf>,
}

/// Path `r.out.png -w` writes the world file to.
pub fn world_file_path(image: &Path) -> PathBuf {
    image.with_extension("wld")
}

pub struct Renderer<'a> {
    gis: &'a dyn GisRuntime,
    session: &'a SessionHandle,
}

impl<'a> Renderer<'a> {
    pub fn new(gis: &'a dyn GisRuntime, session: &'a SessionHandle) -> Self {
        Self { gis, session }
    }

    /// Renders `raster` in the current region to `output`. On failure the
    /// partial image is removed, and so is the world file if one was requested.
    pub fn render(
        &self,
        raster: &RasterName,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<RenderedImage, ExportError> {
        match self.render_with(raster, output, options) {
            Ok(image) => Ok(image),
            Err(err) => {
                remove_partial(output, options.world_file);
                Err(err)
            }
        }
    }

    fn render_with(
        &self,
        raster: &RasterName,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<RenderedImage, ExportError> {
        let failed = |diagnostics: String| ExportError::Render {
            output: output.to_path_buf(),
            diagnostics,
        };
        let call = match options.backend {
            RenderBackend::RoutPng => self.rout_png_call(raster, output, options),
            RenderBackend::DRast => self.d_rast_call(raster, output, options)?,
        };
        let result = self
            .gis
            .run(&call, self.session)
            .map_err(|err| failed(spawn_diagnostics(&err)))?;
        if !result.success() {
            return Err(failed(result.diagnostics()));
        }
        if !output.is_file() {
            return Err(failed(format!("{} did not produce an image", options.backend)));
        }
        let world_file = match options.backend {
            RenderBackend::RoutPng if options.world_file => {
                Some(world_file_path(output)).filter(|path| path.is_file())
            }
            RenderBackend::DRast if options.world_file => {
                tracing::warn!(
                    backend = %options.backend,
                    "world file in the target CRS is not generated by this backend"
                );
                None
            }
            _ => None,
        };
        tracing::debug!(
            %raster,
            output = %output.display(),
            backend = %options.backend,
            "rendered"
        );
        Ok(RenderedImage {
            image: output.to_path_buf(),
            world_file,
        })
    }

    fn rout_png_call(
        &self,
        raster: &RasterName,
        output: &Path,
        options: &RenderOptions,
    ) -> ModuleCall {
        let mut call = ModuleCall::new("r.out.png")
            .param("input", &raster.name)
            .param("output", output.display())
            .param("compression", options.compression);
        if options.transparent_nulls {
            call = call.flags("t");
        }
        if options.world_file {
            call = call.flags("w");
        }
        call.quiet()
    }

    fn d_rast_call(
        &self,
        raster: &RasterName,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<ModuleCall, ExportError> {
        let region = RegionStore::new(self.gis, self.session)
            .get()
            .map_err(|err| ExportError::Render {
                output: output.to_path_buf(),
                diagnostics: err.to_string(),
            })?;
        let (width, height) = region.render_size();
        let transparent = if options.transparent_nulls { "TRUE" } else { "FALSE" };
        let mut call = ModuleCall::new("d.rast")
            .param("map", &raster.name)
            .env("GRASS_RENDER_WIDTH", width)
            .env("GRASS_RENDER_HEIGHT", height)
            .env("GRASS_RENDER_IMMEDIATE", "cairo")
            .env("GRASS_RENDER_BACKGROUNDCOLOR", "ffffff")
            .env("GRASS_RENDER_TRUECOLOR", "TRUE")
            .env("GRASS_RENDER_TRANSPARENT", transparent);
        if options.compression > 0 {
            call = call.env("GRASS_RENDER_FILE_COMPRESSION", options.compression);
        }
        Ok(call
            .env("GRASS_RENDER_FILE", output.display())
            .quiet())
    }
}

fn remove_partial(output: &Path, world_file: bool) {
    let mut paths = vec![output.to_path_buf()];
    if world_file {
        paths.push(world_file_path(output));
    }
    for path in paths {
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), %err, "failed to remove partial output");
            }
        }
    }
}
