use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::export::ExportSettings;
use crate::render::RenderBackend;
use crate::session::{SessionHandle, GISRC_VAR, WIND_OVERRIDE_VAR};
use crate::transform::Separator;

pub const TMPDIR_VAR: &str = "PNGPROJ_TMPDIR";
pub const SEPARATOR_VAR: &str = "PNGPROJ_MPROJ_SEPARATOR";
pub const BACKEND_VAR: &str = "PNGPROJ_RENDER_BACKEND";
pub const KEEP_WORKSPACE_VAR: &str = "PNGPROJ_KEEP_WORKSPACE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub debug: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        matches!(self.vars.get(key).map(String::as_str), Some("1"))
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Session taken from `GISRC` and `WIND_OVERRIDE` as they were when the
    /// snapshot was captured.
    pub(crate) fn session(&self) -> SessionHandle {
        SessionHandle::from_vars(self.var(GISRC_VAR), self.var(WIND_OVERRIDE_VAR))
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug)]
pub struct Config {
    pub(crate) export: ExportConfig,
    pub(crate) render: RenderConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if a `PNGPROJ_*` variable holds an unusable value.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let tmp_root = match snapshot.var(TMPDIR_VAR) {
            Some(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => env::temp_dir(),
        };
        let separator = match snapshot.var(SEPARATOR_VAR) {
            Some(value) => value
                .parse::<Separator>()
                .map_err(|err| anyhow!("{SEPARATOR_VAR}: {err}"))?,
            None => Separator::default(),
        };
        let backend = match snapshot.var(BACKEND_VAR) {
            Some(value) if !value.is_empty() => value
                .parse::<RenderBackend>()
                .map_err(|err| anyhow!("{BACKEND_VAR}: {err}"))?,
            _ => RenderBackend::platform_default(),
        };
        Ok(Self {
            export: ExportConfig {
                tmp_root,
                separator,
                keep_workspace: snapshot.flag_is_enabled(KEEP_WORKSPACE_VAR),
            },
            render: RenderConfig { backend },
        })
    }

    #[must_use]
    pub fn export(&self) -> &ExportConfig {
        &self.export
    }

    #[must_use]
    pub fn render(&self) -> &RenderConfig {
        &self.render
    }

    #[must_use]
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            tmp_root: self.export.tmp_root.clone(),
            separator: self.export.separator.clone(),
            keep_workspace: self.export.keep_workspace,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub tmp_root: PathBuf,
    pub separator: Separator,
    pub keep_workspace: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub backend: RenderBackend,
}
