#![deny(clippy::all, warnings)]

use std::sync::Arc;

use atty::Stream;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use pngproj_core::{
    CommandContext, CommandInfo, CommandStatus, ExecutionOutcome, GlobalOptions, SharedEffects,
    SystemEffects,
};
use serde_json::Value;

mod cli;
mod dispatch;
mod style;

use cli::PngprojCli;
use style::Style;

/// Detail keys naming files a command produced, in display order.
const PRODUCED_FILES: [&str; 6] = [
    "image",
    "world_file",
    "wgs84_file",
    "csv_file",
    "js_file",
    "kept_workspace",
];

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PngprojCli::parse();
    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        debug: cli.debug,
        json: cli.json,
    };
    init_tracing(&global);

    let effects: SharedEffects = Arc::new(SystemEffects::new());
    let ctx = CommandContext::new(&global, effects).map_err(|err| eyre!("{err:?}"))?;
    let (info, outcome) = dispatch::dispatch_command(&ctx, &cli.command)?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn log_level(global: &GlobalOptions) -> &'static str {
    if global.trace || global.verbose > 1 {
        "trace"
    } else if global.debug || global.verbose == 1 {
        "debug"
    } else {
        "info"
    }
}

fn init_tracing(global: &GlobalOptions) {
    let level = log_level(global);
    let filter = format!("pngproj={level},pngproj_core={level},pngproj_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &PngprojCli, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = pngproj_core::to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet || outcome.status != CommandStatus::Ok {
        let message = pngproj_core::format_status_message(info, &outcome.message);
        println!("{}", style.status(&outcome.status, &message));
        if let Some(hint) = hint_from_details(&outcome.details) {
            println!("{}", style.info(&format!("Hint: {hint}")));
        }
        if !cli.quiet {
            for line in detail_lines(&outcome.details) {
                println!("{}", style.detail(&line));
            }
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn detail_lines(details: &Value) -> Vec<String> {
    let Some(map) = details.as_object() else {
        return Vec::new();
    };
    let mut lines: Vec<String> = PRODUCED_FILES
        .iter()
        .filter_map(|key| {
            map.get(*key)
                .and_then(Value::as_str)
                .map(|path| format!("{}: {path}", key.replace('_', " ")))
        })
        .collect();
    if let Some(stage) = map.get("stage").and_then(Value::as_str) {
        lines.push(format!("failed after stage: {stage}"));
    }
    if let Some(warnings) = map
        .get("teardown_warnings")
        .or_else(|| map.get("teardown"))
        .and_then(Value::as_array)
    {
        lines.extend(
            warnings
                .iter()
                .filter_map(Value::as_str)
                .map(|warning| format!("cleanup warning: {warning}")),
        );
    }
    lines
}
