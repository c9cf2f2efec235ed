//! Export pipeline internals: sessions, workspaces, regions, reprojection,
//! rendering, and the command layer on top.

pub mod commands;
pub mod config;
pub mod errors;
pub mod export;
pub mod leaflet;
pub mod raster;
pub mod region;
pub mod render;
pub mod runtime;
pub mod session;
pub mod tooling;
pub mod transform;
pub mod workspace;
