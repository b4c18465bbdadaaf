use std::path::PathBuf;

use thiserror::Error;

/// Raised when a light-level label does not belong to a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown {catalog} level {label:?} (expected one of: {expected})")]
    UnknownLabel {
        catalog: &'static str,
        label: String,
        expected: String,
    },
}

/// Failure of a single background texture load.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to read texture {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode texture {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("texture {} has no pixels", .path.display())]
    Empty { path: PathBuf },
}
