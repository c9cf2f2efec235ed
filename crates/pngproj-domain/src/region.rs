//! Computational region values and the `g.region` field vocabulary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::extent::{parse_number, Extent};

/// Mapset every new location starts with.
pub const PERMANENT_MAPSET: &str = "PERMANENT";

/// Short and long spellings of the four bound fields.
pub const BOUND_FIELDS: [(&str, &str); 4] = [
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub rows: u64,
    pub cols: u64,
    pub nsres: f64,
    pub ewres: f64,
}

impl Region {
    /// Region spanning `extent` with the given grid; resolution follows.
    pub fn from_extent(extent: Extent, rows: u64, cols: u64) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            north: extent.north,
            south: extent.south,
            east: extent.east,
            west: extent.west,
            rows,
            cols,
            nsres: extent.height() / rows as f64,
            ewres: extent.width() / cols as f64,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.east, self.north, self.west, self.south)
    }

    /// Moves the region onto new bounds keeping the row and column counts;
    /// resolution is recomputed so the grid stays consistent.
    pub fn with_bounds(&self, extent: Extent) -> Self {
        Self::from_extent(extent, self.rows, self.cols)
    }

    /// Parses `g.region -g` style output (`n=`, `s=`, ..., `ewres=`).
    pub fn from_fields(fields: &IndexMap<String, String>) -> Result<Self, ParseError> {
        let extent = Extent::from_fields(fields)?;
        let count = |key: &str| -> Result<u64, ParseError> {
            let raw = fields
                .get(key)
                .ok_or_else(|| ParseError::MissingField(key.to_string()))?;
            raw.trim().parse::<u64>().map_err(|_| ParseError::InvalidNumber {
                field: key.to_string(),
                value: raw.clone(),
            })
        };
        let resolution = |key: &str| -> Result<f64, ParseError> {
            let raw = fields
                .get(key)
                .ok_or_else(|| ParseError::MissingField(key.to_string()))?;
            parse_number(key, raw)
        };
        Ok(Self {
            north: extent.north,
            south: extent.south,
            east: extent.east,
            west: extent.west,
            rows: count("rows")?,
            cols: count("cols")?,
            nsres: resolution("nsres")?,
            ewres: resolution("ewres")?,
        })
    }

    /// Fields written back to `g.region`. Resolution is left out so the
    /// module derives it from bounds and grid size.
    pub fn to_fields(&self) -> RegionFields {
        let mut fields = RegionFields::new();
        fields.insert("n", self.north.to_string());
        fields.insert("s", self.south.to_string());
        fields.insert("e", self.east.to_string());
        fields.insert("w", self.west.to_string());
        fields.insert("rows", self.rows.to_string());
        fields.insert("cols", self.cols.to_string());
        fields
    }

    /// Image size that keeps every row and column, oversampling the axis with
    /// the finer resolution so cells stay square.
    pub fn render_size(&self) -> (u64, u64) {
        let (width, height) = if self.nsres > self.ewres {
            (
                self.cols as f64,
                self.rows as f64 * (self.nsres / self.ewres),
            )
        } else {
            (
                self.cols as f64 * (self.ewres / self.nsres),
                self.rows as f64,
            )
        };
        (width.round() as u64, height.round() as u64)
    }
}

/// Loosely typed region update as handed to `g.region`.
///
/// Bounds may be spelled short (`n`) or long (`north`); anything else is
/// passed through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionFields {
    fields: IndexMap<String, String>,
}

impl RegionFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rewrites long bound names to their short form and checks that all four
    /// bounds are present.
    pub fn normalized(&self) -> Result<Vec<(String, String)>, ParseError> {
        let mut missing = Vec::new();
        let mut bounds = Vec::with_capacity(BOUND_FIELDS.len());
        for (short, long) in BOUND_FIELDS {
            match (self.fields.get(short), self.fields.get(long)) {
                (Some(a), Some(b)) if a != b => {
                    return Err(ParseError::ConflictingField { short, long });
                }
                (Some(value), _) | (None, Some(value)) => {
                    bounds.push((short.to_string(), value.clone()));
                }
                (None, None) => missing.push(long),
            }
        }
        if !missing.is_empty() {
            return Err(ParseError::MissingBounds(missing));
        }
        let rest = self.fields.iter().filter(|(key, _)| {
            !BOUND_FIELDS
                .iter()
                .any(|(short, long)| key.as_str() == *short || key.as_str() == *long)
        });
        bounds.extend(rest.map(|(key, value)| (key.clone(), value.clone())));
        Ok(bounds)
    }
}

impl From<IndexMap<String, String>> for RegionFields {
    fn from(fields: IndexMap<String, String>) -> Self {
        Self { fields }
    }
}
