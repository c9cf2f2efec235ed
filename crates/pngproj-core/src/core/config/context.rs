use anyhow::Result;

use crate::config::{Config, EnvSnapshot, GlobalOptions};
use crate::effects::{Effects, GisRuntime, SharedEffects};
use crate::session::SessionHandle;
use crate::CommandGroup;

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
    session: SessionHandle,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options. The
    /// session is captured from the environment here and never re-read.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be prepared.
    pub fn new(global: &'a GlobalOptions, effects: SharedEffects) -> Result<Self> {
        Self::from_snapshot(global, &EnvSnapshot::capture(), effects)
    }

    pub(crate) fn from_snapshot(
        global: &'a GlobalOptions,
        env: &EnvSnapshot,
        effects: SharedEffects,
    ) -> Result<Self> {
        Ok(Self {
            global,
            config: Config::from_snapshot(env)?,
            session: env.session(),
            effects,
        })
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    pub fn gis(&self) -> &dyn GisRuntime {
        self.effects.gis()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A private copy of the session captured at startup. Commands redirect
    /// their copy freely; the original stays untouched.
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }
}
