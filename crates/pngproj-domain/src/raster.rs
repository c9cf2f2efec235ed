use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A raster map reference, optionally qualified as `name@mapset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterName {
    pub name: String,
    pub mapset: Option<String>,
}

impl RasterName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mapset: None,
        }
    }

    /// Mapset qualifier, empty when the map lives in the current mapset.
    pub fn mapset_or_empty(&self) -> &str {
        self.mapset.as_deref().unwrap_or("")
    }
}

impl FromStr for RasterName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (name, mapset) = match trimmed.split_once('@') {
            Some((name, mapset)) => (name, Some(mapset.to_string()).filter(|m| !m.is_empty())),
            None => (trimmed, None),
        };
        if name.is_empty() {
            return Err(ParseError::EmptyRasterName);
        }
        Ok(Self {
            name: name.to_string(),
            mapset,
        })
    }
}

impl fmt::Display for RasterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mapset {
            Some(mapset) => write!(f, "{}@{mapset}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_mapset_qualifier() {
        let raster: RasterName = "elevation@PERMANENT".parse().unwrap();
        assert_eq!(raster.name, "elevation");
        assert_eq!(raster.mapset.as_deref(), Some("PERMANENT"));
        assert_eq!(raster.to_string(), "elevation@PERMANENT");
    }

    #[test]
    fn unqualified_name_has_no_mapset() {
        let raster: RasterName = "landuse".parse().unwrap();
        assert_eq!(raster.mapset_or_empty(), "");
    }

    #[test]
    fn rejects_empty_name() {
        assert_eq!(
            "@PERMANENT".parse::<RasterName>(),
            Err(ParseError::EmptyRasterName)
        );
    }
}
