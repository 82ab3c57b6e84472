use std::path::PathBuf;

use thiserror::Error;

/// The stroke table does not carry a column the extractor cannot do without.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("stroke table has no '{0}' column")]
    MissingColumn(String),
}

/// Fatal failures while turning a stroke source into a table.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed stroke table: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed stroke records: {0}")]
    Records(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Why a single artifact candidate could not be loaded.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid artifact document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("artifact of kind '{kind}' cannot be used as a {expected}")]
    Role { kind: String, expected: &'static str },

    #[error("invalid artifact parameters: {0}")]
    Invalid(String),
}

/// Runtime failures raised by predictors and transformers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("operation '{operation}' is not supported by this model")]
    Unsupported { operation: &'static str },

    #[error("X has {actual} features, but {stage} is expecting {expected} features as input")]
    WidthMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("input is missing feature column '{0}'")]
    MissingColumn(String),

    #[error("{0} requires named columns but received a bare matrix")]
    NeedsTable(&'static str),

    #[error("stage '{0}' cannot transform its input")]
    NotATransformer(String),

    #[error("input has no rows")]
    EmptyInput,
}
