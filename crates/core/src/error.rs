//! Top-level error type.

use thiserror::Error;

/// Errors surfaced at the application boundary.
///
/// The rhi and resources crates carry their own error enums; this type is
/// what the renderer and app crates report when a whole stage fails.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or surface management failed.
    #[error("window error: {0}")]
    Window(String),

    /// GPU bring-up or per-frame rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// Asset loading failed.
    #[error("resource error: {0}")]
    Resource(String),

    /// IO errors (shader sources, model files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
