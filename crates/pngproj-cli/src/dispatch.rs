use color_eyre::Result;
use pngproj_core::{
    CommandContext, CommandGroup, CommandInfo, ExecutionOutcome, ExportMode, ExportRequest,
    LeafletInput, LeafletRequest, RenderOptions,
};

use crate::cli::{CommandGroupCli, ExportArgs, LeafletArgs, RenderArgs, SessionCommand};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    match group {
        CommandGroupCli::Export(args) => {
            let info = CommandInfo::new(CommandGroup::Export, "export");
            let request = export_request_from_args(ctx, args);
            core_call(info, || pngproj_core::export_raster(ctx, &request))
        }
        CommandGroupCli::Leaflet(args) => {
            let info = CommandInfo::new(CommandGroup::Leaflet, "leaflet");
            let request = leaflet_request_from_args(ctx, args);
            core_call(info, || pngproj_core::leaflet_export(ctx, &request))
        }
        CommandGroupCli::Session(SessionCommand::Show) => {
            let info = CommandInfo::new(CommandGroup::Session, "show");
            core_call(info, || pngproj_core::session_show(ctx))
        }
    }
}

fn export_request_from_args(ctx: &CommandContext, args: &ExportArgs) -> ExportRequest {
    let mut request = ExportRequest::new(args.raster.clone(), &args.output, args.epsg);
    request.mode = mode(&args.render);
    request.render = RenderOptions {
        compression: args.render.compression,
        transparent_nulls: args.transparent,
        world_file: args.render.world_file,
        backend: backend(ctx, &args.render),
    };
    request.wgs84_file = match (&args.wgs84_file, args.wgs84) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(ExportRequest::default_wgs84_file(&args.output)),
        (None, false) => None,
    };
    request.region_override = args.region.clone();
    request
}

fn leaflet_request_from_args(ctx: &CommandContext, args: &LeafletArgs) -> LeafletRequest {
    let input = match &args.strds {
        Some(name) => LeafletInput::Strds {
            name: name.clone(),
            where_clause: args.where_clause.clone(),
        },
        None => LeafletInput::Rasters(args.raster.clone()),
    };
    let mut request = LeafletRequest::new(input, &args.output);
    request.epsg = args.epsg;
    request.opacity = args.opacity.clone();
    request.compression = args.render.compression;
    request.no_transparency = args.no_transparency;
    request.world_file = args.render.world_file;
    request.backend = backend(ctx, &args.render);
    request.mode = mode(&args.render);
    request
}

fn mode(render: &RenderArgs) -> ExportMode {
    if render.map_extent {
        ExportMode::MapExtent
    } else {
        ExportMode::RegionPreserving
    }
}

fn backend(ctx: &CommandContext, render: &RenderArgs) -> pngproj_core::RenderBackend {
    render
        .backend
        .map_or(ctx.config().render().backend, Into::into)
}

fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => {
            let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
            Ok((
                info,
                ExecutionOutcome::failure(
                    err.to_string(),
                    serde_json::json!({
                        "reason": "internal_error",
                        "error": err.to_string(),
                        "issues": issues,
                        "hint": "Re-run with `-v` for module-level logs.",
                    }),
                ),
            ))
        }
    }
}
