use binrw::Error as BrwError;
use thiserror::Error;

/// Shorthand for results produced anywhere in the conversion pipeline.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Every way a single file's conversion can fail. All variants are fatal for
/// the file being converted.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The stream had no header line, or a header could not be mapped.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A row map lacks a required field under every accepted spelling.
    #[error("Not found \"{field}\" in \"{file}.csv\" header.")]
    MissingColumn { field: String, file: String },

    #[error("Invalid {ty} literal: \"{raw}\"")]
    InvalidLiteral { ty: String, raw: String },

    #[error("Invalid boolean literal: \"{0}\"")]
    InvalidBoolean(String),

    #[error("\"{raw}\" is not a member of {enumeration}")]
    UnknownEnumMember { enumeration: String, raw: String },

    #[error("Unsupported field type: {0}")]
    UnsupportedType(String),

    /// The CSV file name has no table in the schema.
    #[error("No table named \"{0}\" in schema")]
    UnknownTable(String),

    /// A row setter received a value of a different kind than it stores.
    #[error("Field \"{field}\" of table \"{table}\": {detail}")]
    FieldMismatch {
        table: String,
        field: String,
        detail: String,
    },

    #[error("Unsupported text encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary write error: {0}")]
    Binary(#[from] BrwError),
}

impl ConvertError {
    #[inline]
    pub(crate) fn invalid_literal<T: ToString, R: Into<String>>(ty: T, raw: R) -> Self {
        Self::InvalidLiteral {
            ty: ty.to_string(),
            raw: raw.into(),
        }
    }
}
