//! Error types for the certificate pipeline.
//!
//! Each stage gets its own enum so callers can tell a rejected CSV apart from a
//! failed rasterization. The binary wraps all of them in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures of a CSV import. Row-level problems never surface here, they
/// are skipped and logged instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("CSV file has no data rows")]
    EmptyFile,

    #[error("Required header '{0}' is missing")]
    MissingHeader(String),

    #[error("CSV file contains no valid participant rows")]
    NoValidRows,
}

/// Manual entry validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Participant name is required")]
    MissingName,

    #[error("Participant time is required")]
    MissingTime,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Participant id {0} already exists")]
    DuplicateId(String),

    #[error("Participant id {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Entry(#[from] EntryError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid hex color '{0}', expected #rgb or #rrggbb")]
    InvalidHex(String),
}

/// Rejections of the upload precondition checks.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File {name} is {size_mb:.1}MB, larger than the {max_mb}MB limit")]
    TooLarge {
        name: String,
        size_mb: f64,
        max_mb: f64,
    },

    #[error("File {name} has unsupported type {mime}, expected {accept}")]
    UnsupportedType {
        name: String,
        mime: String,
        accept: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Failures while painting a scene graph into pixels.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("Failed to parse generated scene: {0}")]
    Scene(String),

    #[error("Failed to encode PNG: {0}")]
    Encode(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Rasterization failed for {participant}: {source}")]
    Raster {
        participant: String,
        #[source]
        source: RasterError,
    },

    #[error("Rasterization task for {participant} did not complete: {message}")]
    Task { participant: String, message: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Batch export aborted at {participant} after {completed} of {total} certificates: {source}"
    )]
    BatchAborted {
        participant: String,
        completed: usize,
        total: usize,
        #[source]
        source: Box<ExportError>,
    },
}
