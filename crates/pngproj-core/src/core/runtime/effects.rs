use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::module::ModuleCall;
use super::process::{run_command, RunOutput};
use crate::session::SessionHandle;

/// Runs GIS modules inside an explicit session.
pub trait GisRuntime: Send + Sync {
    /// Runs `call` with the session's pointer and region override in the
    /// child environment. A non-zero exit is reported through
    /// [`RunOutput::code`], not as an error.
    fn run(&self, call: &ModuleCall, session: &SessionHandle) -> Result<RunOutput>;
}

pub trait Effects: Send + Sync {
    fn gis(&self) -> &dyn GisRuntime;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    gis: Arc<SystemGisRuntime>,
}

impl SystemEffects {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gis: Arc::new(SystemGisRuntime::from_env()),
        }
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl Effects for SystemEffects {
    fn gis(&self) -> &dyn GisRuntime {
        self.gis.as_ref()
    }
}

/// Spawns modules found on `PATH` or inside the installation named by
/// `GISBASE`.
struct SystemGisRuntime {
    fallback_dirs: Vec<PathBuf>,
}

impl SystemGisRuntime {
    fn from_env() -> Self {
        let fallback_dirs = env::var_os("GISBASE")
            .map(PathBuf::from)
            .map(|base| vec![base.join("bin"), base.join("scripts")])
            .unwrap_or_default();
        Self { fallback_dirs }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
        if !self.fallback_dirs.is_empty() {
            let search = env::join_paths(&self.fallback_dirs)
                .context("invalid GISBASE module directories")?;
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if let Ok(path) = which::which_in(name, Some(search), cwd) {
                return Ok(path);
            }
        }
        anyhow::bail!("GIS module `{name}` not found on PATH or under GISBASE")
    }
}

impl GisRuntime for SystemGisRuntime {
    fn run(&self, call: &ModuleCall, session: &SessionHandle) -> Result<RunOutput> {
        let program = self.resolve(&call.name)?;
        let mut envs = session.child_env();
        envs.extend(call.env.iter().cloned());
        tracing::debug!(module = %call, gisrc = ?session.gisrc(), "running module");
        let output = run_command(
            &program,
            &call.args(),
            &envs,
            None,
            call.input.as_deref(),
        )?;
        if !output.success() {
            tracing::debug!(
                module = %call.name,
                code = output.code,
                stderr = %output.stderr.trim(),
                "module failed"
            );
        }
        Ok(output)
    }
}
