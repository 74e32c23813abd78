use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PagediffError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Text extraction error: {0}")]
    Text(#[from] TextError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

/// Failures while opening or rasterizing a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read document '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Page {index} out of range for '{path}'")]
    PageOutOfRange { path: PathBuf, index: u32 },

    #[error("Failed to render page: {0}")]
    Render(String),

    #[error("Failed to decode rendered page: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid relative path: {0}")]
    InvalidRelativePath(String),
}

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("Failed to write overlay SVG: {0}")]
    Overlay(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to encode task payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode task '{handle}': {source}")]
    Decode {
        handle: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Queue database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum TextError {
    #[error("Text extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Text extraction service returned status {status}")]
    Status { status: u16 },

    #[error("Text extraction is disabled")]
    Disabled,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker pool needs at least one worker")]
    NoWorkers,

    #[error("Failed to install signal handler: {0}")]
    Signal(String),
}

pub type Result<T> = std::result::Result<T, PagediffError>;
