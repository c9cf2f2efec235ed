//! Bounding box reprojection through the line based transform module.

use std::fmt;
use std::str::FromStr;

use pngproj_domain::{CrsDefinition, Extent};

use crate::effects::GisRuntime;
use crate::errors::{spawn_diagnostics, ExportError};
use crate::module::ModuleCall;
use crate::session::SessionHandle;

/// Field separator used on the transform module's stdin and stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Separator {
    #[default]
    Space,
    Comma,
    Pipe,
    Tab,
    Literal(String),
}

impl Separator {
    /// Value for the module's `separator=` option.
    pub fn module_value(&self) -> &str {
        match self {
            Separator::Space => "space",
            Separator::Comma => "comma",
            Separator::Pipe => "pipe",
            Separator::Tab => "tab",
            Separator::Literal(text) => text,
        }
    }

    /// Text placed between fields.
    pub fn text(&self) -> &str {
        match self {
            Separator::Space => " ",
            Separator::Comma => ",",
            Separator::Pipe => "|",
            Separator::Tab => "\t",
            Separator::Literal(text) => text,
        }
    }

    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        let text = self.text();
        if text.trim().is_empty() {
            line.split_whitespace().collect()
        } else {
            line.split(text).map(str::trim).collect()
        }
    }
}

impl FromStr for Separator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("separator must not be empty".to_string()),
            "space" | " " => Ok(Separator::Space),
            "comma" | "," => Ok(Separator::Comma),
            "pipe" | "|" => Ok(Separator::Pipe),
            "tab" | "\t" => Ok(Separator::Tab),
            other => Ok(Separator::Literal(other.to_string())),
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_value())
    }
}

/// Reprojects extents corner by corner. Runs inside whatever session it is
/// given, which decides what [`CrsDefinition::CurrentLocation`] means.
pub struct ExtentTransform<'a> {
    gis: &'a dyn GisRuntime,
    session: &'a SessionHandle,
    separator: Separator,
}

impl<'a> ExtentTransform<'a> {
    pub fn new(gis: &'a dyn GisRuntime, session: &'a SessionHandle, separator: Separator) -> Self {
        Self {
            gis,
            session,
            separator,
        }
    }

    pub fn reproject(
        &self,
        extent: Extent,
        from: &CrsDefinition,
        to: &CrsDefinition,
    ) -> Result<Extent, ExportError> {
        if from == to {
            return Ok(extent);
        }
        let call = self.call(extent, from, to);
        let output = self
            .gis
            .run(&call, self.session)
            .map_err(|err| reprojection(spawn_diagnostics(&err)))?;
        if !output.success() {
            return Err(reprojection(output.diagnostics()));
        }
        let reprojected = self.parse_response(&output.stdout).map_err(|reason| {
            let stderr = output.stderr.trim();
            if stderr.is_empty() {
                reprojection(reason)
            } else {
                reprojection(format!("{reason}: {stderr}"))
            }
        })?;
        tracing::debug!(%from, %to, ?extent, ?reprojected, "reprojected extent");
        Ok(reprojected)
    }

    /// From the current location to geographic WGS84 in decimal degrees.
    pub fn to_wgs84(&self, extent: Extent) -> Result<Extent, ExportError> {
        self.reproject(
            extent,
            &CrsDefinition::CurrentLocation,
            &CrsDefinition::LatLongWgs84,
        )
    }

    fn call(&self, extent: Extent, from: &CrsDefinition, to: &CrsDefinition) -> ModuleCall {
        let mut call = ModuleCall::new("m.proj")
            .param("input", "-")
            .param("separator", self.separator.module_value())
            .input(self.request(extent));
        if *from == CrsDefinition::LatLongWgs84 {
            call = call.flags("i");
        }
        if *to == CrsDefinition::LatLongWgs84 {
            call = call.flags("od");
        }
        call.param_opt("proj_in", from.proj_string())
            .param_opt("proj_out", to.proj_string())
    }

    fn request(&self, extent: Extent) -> String {
        let sep = self.separator.text();
        format!(
            "{}{sep}{}\n{}{sep}{}\n",
            extent.east, extent.north, extent.west, extent.south
        )
    }

    fn parse_response(&self, stdout: &str) -> Result<Extent, String> {
        let lines: Vec<&str> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.len() < 2 {
            return Err(format!(
                "expected two coordinate lines, got {}",
                lines.len()
            ));
        }
        let (east, north) = self.corner(lines[0])?;
        let (west, south) = self.corner(lines[1])?;
        Ok(Extent::new(east, north, west, south))
    }

    fn corner(&self, line: &str) -> Result<(f64, f64), String> {
        let fields = self.separator.split(line);
        if fields.len() < 2 {
            return Err(format!("malformed coordinate line `{line}`"));
        }
        let number = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| format!("non-numeric coordinate `{raw}` in `{line}`"))
        };
        Ok((number(fields[0])?, number(fields[1])?))
    }
}

fn reprojection(diagnostics: String) -> ExportError {
    ExportError::Reprojection { diagnostics }
}
