use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Prefix of the location created for each reprojection target.
pub const LOCATION_PREFIX: &str = "reproj_location_";

const EPSG_MAX: u32 = 100_000;

/// An EPSG code accepted as a reprojection target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpsgCode(u32);

impl EpsgCode {
    /// Web Mercator, the default projection of Leaflet maps.
    pub const WEB_MERCATOR: EpsgCode = EpsgCode(3857);
    pub const WGS84: EpsgCode = EpsgCode(4326);

    pub fn new(code: u32) -> Result<Self, ParseError> {
        if (1..=EPSG_MAX).contains(&code) {
            Ok(Self(code))
        } else {
            Err(ParseError::InvalidEpsg(code.to_string()))
        }
    }

    pub fn code(self) -> u32 {
        self.0
    }

    /// Location name used for an ephemeral workspace in this CRS.
    ///
    /// Deterministic on purpose: isolation comes from the random database root.
    pub fn location_name(self) -> String {
        format!("{LOCATION_PREFIX}{}", self.0)
    }

    /// PROJ definition understood by `m.proj`.
    pub fn proj_init(self) -> String {
        format!("+init=epsg:{}", self.0)
    }
}

impl fmt::Display for EpsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for EpsgCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        let code = digits
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidEpsg(s.to_string()))?;
        Self::new(code).map_err(|_| ParseError::InvalidEpsg(s.to_string()))
    }
}

/// Coordinate reference system as seen by the coordinate transform service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrsDefinition {
    /// Whatever CRS the active location defines.
    CurrentLocation,
    /// Geographic WGS84 in decimal degrees.
    LatLongWgs84,
    Epsg(EpsgCode),
    /// A PROJ definition string, e.g. the output of `g.proj -jf`.
    Proj(String),
}

impl CrsDefinition {
    /// The PROJ string to hand to the transform service, if one is needed.
    pub fn proj_string(&self) -> Option<String> {
        match self {
            CrsDefinition::CurrentLocation | CrsDefinition::LatLongWgs84 => None,
            CrsDefinition::Epsg(code) => Some(code.proj_init()),
            CrsDefinition::Proj(definition) => Some(definition.clone()),
        }
    }
}

impl fmt::Display for CrsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsDefinition::CurrentLocation => f.write_str("current location"),
            CrsDefinition::LatLongWgs84 => f.write_str("LL WGS84"),
            CrsDefinition::Epsg(code) => write!(f, "{code}"),
            CrsDefinition::Proj(definition) => f.write_str(definition),
        }
    }
}
