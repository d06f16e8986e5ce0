//! Error types for the WMTS client workspace.

use thiserror::Error;

use crate::crs::CrsError;

/// Result type alias using WmtsError.
pub type WmtsResult<T> = Result<T, WmtsError>;

/// Primary error type for WMTS configuration resolution.
///
/// All variants describe a malformed or self-contradictory capabilities
/// document. A layer that is simply absent is not an error; the resolver
/// reports that as absence instead.
#[derive(Debug, Error)]
pub enum WmtsError {
    // === Capabilities document errors ===
    #[error("Tile matrix set not found in capabilities: {0}")]
    MatrixSetNotFound(String),

    #[error("Tile matrix set '{0}' declares no tile matrices")]
    EmptyMatrixSet(String),

    #[error("Layer '{0}' declares no tile matrix set links")]
    NoMatrixSetLinks(String),

    #[error("Layer '{0}' advertises no formats")]
    NoFormats(String),

    #[error("Layer '{0}' declares no styles")]
    NoStyles(String),

    #[error("Dimension '{0}' declares neither a default nor any allowed values")]
    DimensionWithoutValues(String),

    #[error("GetEncoding constraint on '{0}' is missing its allowed values")]
    ConstraintWithoutValues(String),

    #[error("No GetTile URL could be negotiated for layer '{0}'")]
    NoTileUrls(String),

    // === CRS errors ===
    #[error("Invalid CRS: {0}")]
    InvalidCrs(#[from] CrsError),

    // === Document shape errors ===
    #[error("Invalid capabilities document: {0}")]
    InvalidDocument(String),
}

impl From<serde_json::Error> for WmtsError {
    fn from(err: serde_json::Error) -> Self {
        WmtsError::InvalidDocument(format!("JSON error: {}", err))
    }
}
