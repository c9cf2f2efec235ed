#![allow(dead_code)]

use std::{fs, path::Path, path::PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;

/// A `pngproj` command with no session or configuration inherited from the
/// caller.
pub fn pngproj() -> Command {
    let mut cmd = cargo_bin_cmd!("pngproj");
    for key in [
        "GISRC",
        "WIND_OVERRIDE",
        "PNGPROJ_TMPDIR",
        "PNGPROJ_MPROJ_SEPARATOR",
        "PNGPROJ_RENDER_BACKEND",
        "PNGPROJ_KEEP_WORKSPACE",
        "NO_COLOR",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Writes a session file naming `database/location/mapset`.
pub fn write_gisrc(dir: &Path, database: &Path, location: &str, mapset: &str) -> PathBuf {
    let path = dir.join("gisrc");
    fs::write(
        &path,
        format!(
            "GISDBASE: {}\nLOCATION_NAME: {location}\nMAPSET: {mapset}\nGUI: text\n",
            database.display()
        ),
    )
    .expect("write gisrc");
    path
}

pub fn parse_json(assert: &Assert) -> Value {
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("invalid json ({err}): {stdout}"))
}

pub fn stderr(assert: &Assert) -> String {
    String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 stderr")
}
