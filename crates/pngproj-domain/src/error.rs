use std::path::PathBuf;

/// Failures while reading module output or user supplied values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("missing required bound fields: {}", .0.join(", "))]
    MissingBounds(Vec<&'static str>),
    #[error("field `{short}` conflicts with `{long}`")]
    ConflictingField {
        short: &'static str,
        long: &'static str,
    },
    #[error("invalid number for `{field}`: {value:?}")]
    InvalidNumber { field: String, value: String },
    #[error("malformed line: {0:?}")]
    MalformedLine(String),
    #[error("invalid EPSG code {0:?} (expected 1-100000)")]
    InvalidEpsg(String),
    #[error("raster name must not be empty")]
    EmptyRasterName,
}

/// Failures around the session descriptor (`gisrc`) file.
#[derive(Debug, thiserror::Error)]
pub enum GisEnvError {
    #[error("failed to read session file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {} has a malformed line: {line:?}", path.display())]
    Malformed { path: PathBuf, line: String },
    #[error("session file {} does not define {key}", path.display())]
    MissingKey { path: PathBuf, key: &'static str },
}
