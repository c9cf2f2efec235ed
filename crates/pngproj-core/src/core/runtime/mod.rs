//! Module execution: the effects seam, the process runner, and module calls.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod effects;
pub mod module;
pub mod process;
#[cfg(test)]
pub(crate) mod test_support;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandGroup {
    Export,
    Leaflet,
    Session,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Export => "export",
            CommandGroup::Leaflet => "leaflet",
            CommandGroup::Session => "session",
        };
        f.write_str(name)
    }
}
