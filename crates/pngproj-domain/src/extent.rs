use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Bounding box given by its four edges in some CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub east: f64,
    pub north: f64,
    pub west: f64,
    pub south: f64,
}

impl Extent {
    pub fn new(east: f64, north: f64, west: f64, south: f64) -> Self {
        Self {
            east,
            north,
            west,
            south,
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Builds an extent from parsed module output, accepting `n`/`north` style
    /// keys interchangeably.
    pub fn from_fields(fields: &IndexMap<String, String>) -> Result<Self, ParseError> {
        let edge = |short: &str, long: &str| -> Result<f64, ParseError> {
            let (key, raw) = fields
                .get_key_value(short)
                .or_else(|| fields.get_key_value(long))
                .ok_or_else(|| ParseError::MissingField(long.to_string()))?;
            parse_number(key, raw)
        };
        Ok(Self {
            east: edge("e", "east")?,
            north: edge("n", "north")?,
            west: edge("w", "west")?,
            south: edge("s", "south")?,
        })
    }

    /// Two corner lines, `east north` then `west south`.
    pub fn to_file_content(&self) -> String {
        format!(
            "{} {}\n{} {}\n",
            self.east, self.north, self.west, self.south
        )
    }

    pub fn parse_file_content(text: &str) -> Result<Self, ParseError> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let (east, north) = corner(lines.next(), "east", "north")?;
        let (west, south) = corner(lines.next(), "west", "south")?;
        Ok(Self::new(east, north, west, south))
    }

    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.to_file_content())
    }

    pub fn read_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse_file_content(&text)?)
    }

    /// Leaflet `LatLngBounds` literal: `[[south, east], [north, west]]`.
    pub fn leaflet_bounds(&self) -> String {
        format!(
            "[[{}, {}], [{}, {}]]",
            self.south, self.east, self.north, self.west
        )
    }

    pub fn approx_eq(&self, other: &Extent, tolerance: f64) -> bool {
        (self.east - other.east).abs() <= tolerance
            && (self.north - other.north).abs() <= tolerance
            && (self.west - other.west).abs() <= tolerance
            && (self.south - other.south).abs() <= tolerance
    }
}

fn corner(line: Option<&str>, x_name: &str, y_name: &str) -> Result<(f64, f64), ParseError> {
    let line = line.ok_or_else(|| ParseError::MissingField(x_name.to_string()))?;
    let mut parts = line.split_whitespace();
    let x = parts
        .next()
        .ok_or_else(|| ParseError::MalformedLine(line.to_string()))?;
    let y = parts
        .next()
        .ok_or_else(|| ParseError::MalformedLine(line.to_string()))?;
    Ok((parse_number(x_name, x)?, parse_number(y_name, y)?))
}

pub(crate) fn parse_number(field: &str, raw: &str) -> Result<f64, ParseError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber {
            field: field.to_string(),
            value: raw.to_string(),
        })
}
