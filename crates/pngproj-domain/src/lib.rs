#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod crs;
pub mod error;
pub mod extent;
pub mod gisenv;
pub mod keyval;
pub mod leaflet;
pub mod raster;
pub mod region;

pub use crs::{CrsDefinition, EpsgCode, LOCATION_PREFIX};
pub use error::{GisEnvError, ParseError};
pub use extent::Extent;
pub use gisenv::{GisEnv, WorkspaceId, GISDBASE, LOCATION_NAME, MAPSET};
pub use keyval::{parse_key_val, parse_key_val_words};
pub use leaflet::{LayerInfo, LayerManifest};
pub use raster::RasterName;
pub use region::{Region, RegionFields, BOUND_FIELDS, PERMANENT_MAPSET};
