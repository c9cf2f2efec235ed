#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

mod core;

pub use crate::core::{
    errors, export, leaflet, raster, region, render, session, transform, workspace,
};
pub use crate::core::runtime::{effects, module, process};

pub(crate) use crate::core::config;
pub(crate) use crate::core::config::context;
#[cfg(test)]
pub(crate) use crate::core::runtime;
pub(crate) use crate::core::tooling::outcome;

pub use crate::core::commands::{export_raster, leaflet_export, session_show};
pub use crate::core::config::context::{CommandContext, CommandInfo};
pub use crate::core::config::{Config, ExportConfig, GlobalOptions, RenderConfig};
pub use crate::core::errors::ExportError;
pub use crate::core::export::{
    ExportFailure, ExportMode, ExportReport, ExportRequest, ExportSettings, ExportStage,
    ReprojectionOrchestrator,
};
pub use crate::core::leaflet::{
    export_leaflet, LeafletError, LeafletInput, LeafletReport, LeafletRequest,
};
pub use crate::core::render::{RenderBackend, RenderOptions, DEFAULT_COMPRESSION};
pub use crate::core::runtime::effects::{Effects, GisRuntime, SharedEffects, SystemEffects};
pub use crate::core::runtime::process::RunOutput;
pub use crate::core::runtime::CommandGroup;
pub use crate::core::session::SessionHandle;
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::core::tooling::response::{format_status_message, to_json_response};
pub use crate::core::transform::Separator;
