//! Error types for the bleed square generator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required key is absent from the slicer configuration
    #[error("missing configuration key `{0}`")]
    MissingKey(String),

    /// A key is present but its value does not parse
    #[error("invalid value `{value}` for configuration key `{key}`")]
    InvalidValue { key: String, value: String },

    /// `bed_shape` is not a list of `XxY` corners
    #[error("malformed bed shape `{0}`")]
    BedShape(String),

    /// Any other configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// Computed sizes that are non-positive or do not fit
    #[error("geometry error: {0}")]
    Geometry(String),

    /// A value that does not fit its fixed-width header field
    #[error("{field} value {value} does not fit in {digits} hex digits")]
    EncodingOverflow {
        field: &'static str,
        value: f64,
        digits: usize,
    },

    /// A header field that cannot be read back
    #[error("cannot decode `{0}`")]
    Decode(String),

    /// A move with no axis words
    #[error("refusing to emit illegal move: {0}")]
    IllegalMove(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }
}
