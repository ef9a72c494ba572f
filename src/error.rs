//! Error types for every failure class of the pipeline.
//!
//! Per-item failures (`ResolveError`, `ExtractError`, `RenderError`,
//! `ExportError`) are contained by their callers: they are counted and logged
//! and never abort a batch.

use std::path::PathBuf;

use thiserror::Error;

/// Turning an item reference into a file-system location failed.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("loading `{type_identifier}` failed: {reason}")]
    Load {
        type_identifier: String,
        reason: String,
    },

    #[error("loading the url object failed: {0}")]
    UrlObject(String),

    #[error("embedded url bytes are not valid utf-8")]
    InvalidEncoding,

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("`{0}` is not a local file url")]
    NotAFileUrl(url::Url),

    #[error("resolved path does not exist: {}", .0.display())]
    Missing(PathBuf),
}

/// No icon representation could be produced for a resolved path.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("file does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("there was an i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("error while loading the image (via the `image` crate): {0}")]
    Image(#[from] image::ImageError),

    #[error("error while reading the bundle property list: {0}")]
    Plist(#[from] plist::Error),

    #[error("the image is too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("bundle has no decodable icon: {}", .0.display())]
    NoBundleIcon(PathBuf),

    #[error("icon unavailable for {}: {reason}", .path.display())]
    Unavailable { path: PathBuf, reason: String },
}

/// Rasterizing an icon into a fixed-size buffer failed.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid target dimensions: {0}x{0}")]
    InvalidDimensions(u32),

    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Exporting a single item failed. The rest of a batch is unaffected.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("writing {} failed: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("an ingestion batch is already in flight")]
    BatchInFlight,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config failed: {0}")]
    Json(#[from] serde_json::Error),
}
