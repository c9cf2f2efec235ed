use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand, ValueEnum};
use pngproj_core::RenderBackend;
use pngproj_domain::{EpsgCode, RasterName};

pub const PNGPROJ_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const PNGPROJ_BEFORE_HELP: &str = concat!(
    "pngproj ",
    env!("CARGO_PKG_VERSION"),
    " – Reprojected PNG export for GRASS raster maps\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  export           Render one raster map as a PNG in another projection.\n",
    "  leaflet          Export several maps plus data_file.csv/.js for a Leaflet viewer.\n",
    "  session show     Print the workspace the current session points at.\n",
);

const LEAFLET_USAGE: &str =
    "pngproj leaflet (--raster MAP[,MAP...] | --strds NAME [--where SQL]) --output DIR";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = PNGPROJ_BEFORE_HELP,
    help_template = PNGPROJ_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct PngprojCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(long, help = "Enable debug logging", global = true)]
    pub debug: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        about = "Render a raster map as a PNG image in the given EPSG projection.",
        override_usage = "pngproj export <RASTER> --output FILE --epsg CODE [-t] [-w] [-l]"
    )]
    Export(ExportArgs),
    #[command(
        about = "Export raster maps or a space time raster dataset for a Leaflet web map.",
        override_usage = LEAFLET_USAGE
    )]
    Leaflet(LeafletArgs),
    #[command(subcommand, about = "Inspect the active session.")]
    Session(SessionCommand),
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    #[command(about = "Print the database, location and mapset of the current session.")]
    Show,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportArgs {
    #[arg(value_name = "RASTER", help = "Raster map to export, optionally as name@mapset")]
    pub raster: RasterName,
    #[arg(short, long, value_name = "FILE", help = "PNG file to write")]
    pub output: PathBuf,
    #[arg(long, value_name = "CODE", help = "Target EPSG code, e.g. 3857")]
    pub epsg: EpsgCode,
    #[command(flatten)]
    pub render: RenderArgs,
    #[arg(short = 't', long, help = "Make NULL cells transparent")]
    pub transparent: bool,
    #[arg(
        short = 'l',
        long = "wgs84",
        help = "Also write the image bounds in LL WGS84 to <FILE>.wgs84"
    )]
    pub wgs84: bool,
    #[arg(
        long,
        value_name = "PATH",
        help = "Write the LL WGS84 bounds to PATH instead of <FILE>.wgs84"
    )]
    pub wgs84_file: Option<PathBuf>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Read the source region from a saved region instead of the current one"
    )]
    pub region: Option<String>,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct LeafletArgs {
    #[arg(
        long,
        value_name = "MAP",
        value_delimiter = ',',
        conflicts_with = "strds",
        required_unless_present = "strds",
        help = "Raster maps to export"
    )]
    pub raster: Vec<RasterName>,
    #[arg(long, value_name = "NAME", help = "Space time raster dataset to export")]
    pub strds: Option<String>,
    #[arg(
        long = "where",
        value_name = "SQL",
        requires = "strds",
        conflicts_with = "raster",
        help = "Temporal condition selecting maps of the dataset"
    )]
    pub where_clause: Option<String>,
    #[arg(
        short,
        long,
        value_name = "DIR",
        help = "Existing directory for the images and manifests"
    )]
    pub output: PathBuf,
    #[arg(
        long,
        value_name = "CODE",
        default_value = "3857",
        help = "Target EPSG code (Leaflet uses 3857)"
    )]
    pub epsg: EpsgCode,
    #[arg(
        long,
        value_name = "VALUE",
        value_delimiter = ',',
        default_value = "1",
        help = "One opacity for all maps or one per map, each between 0 and 1"
    )]
    pub opacity: Vec<f64>,
    #[command(flatten)]
    pub render: RenderArgs,
    #[arg(short = 'n', long, help = "Keep NULL cells opaque")]
    pub no_transparency: bool,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(
        long,
        default_value_t = pngproj_core::DEFAULT_COMPRESSION,
        value_parser = value_parser!(u8).range(0..=9),
        help = "PNG compression (0 = none, 1 = fastest, 9 = best)"
    )]
    pub compression: u8,
    #[arg(short = 'w', long, help = "Write a world file next to each image")]
    pub world_file: bool,
    #[arg(
        long,
        help = "Cover the whole map in the target projection instead of the current region"
    )]
    pub map_extent: bool,
    #[arg(
        long,
        value_enum,
        help = "Rendering module (defaults to PNGPROJ_RENDER_BACKEND or the platform choice)"
    )]
    pub backend: Option<BackendArg>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    #[value(name = "r.out.png")]
    RoutPng,
    #[value(name = "d.rast")]
    DRast,
}

impl From<BackendArg> for RenderBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::RoutPng => RenderBackend::RoutPng,
            BackendArg::DRast => RenderBackend::DRast,
        }
    }
}
