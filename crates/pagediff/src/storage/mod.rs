//! Job file storage: uploaded document trees, overlays and text artifacts.

pub mod filesystem;
pub mod pdf;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use image::RgbImage;
use serde::Serialize;

use crate::error::{DocumentError, StorageError};

pub use filesystem::FsStorage;

/// Which of the two compared trees a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SetSide {
    #[serde(rename = "setA")]
    A,
    #[serde(rename = "setB")]
    B,
}

impl SetSide {
    pub const BOTH: [SetSide; 2] = [SetSide::A, SetSide::B];

    /// Directory and artifact stem for this side.
    pub fn dir_name(self) -> &'static str {
        match self {
            SetSide::A => "setA",
            SetSide::B => "setB",
        }
    }
}

impl fmt::Display for SetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Access to stored documents and artifact outputs.
///
/// Document paths passed to `open_document`, `render_page` and
/// `read_document` are the values returned by `resolve`.
pub trait StorageProvider: Send + Sync {
    /// Returns the page count of a document.
    fn open_document(&self, path: &Path) -> Result<u32, DocumentError>;

    /// Rasterizes one zero-based page at the given resolution.
    fn render_page(&self, path: &Path, page_index: u32, dpi: u32)
        -> Result<RgbImage, DocumentError>;

    fn read_document(&self, path: &Path) -> Result<Vec<u8>, DocumentError>;

    /// Lists the relative paths of all documents uploaded on one side.
    fn list_files(&self, job_id: &str, side: SetSide) -> Result<Vec<String>, StorageError>;

    fn resolve(&self, job_id: &str, side: SetSide, relative_path: &str)
        -> Result<PathBuf, StorageError>;

    fn write_overlay(
        &self,
        job_id: &str,
        file_id: &str,
        page_index: u32,
        svg: &str,
    ) -> Result<PathBuf, StorageError>;

    fn write_text(
        &self,
        job_id: &str,
        file_id: &str,
        side: SetSide,
        text: &str,
    ) -> Result<PathBuf, StorageError>;
}

/// Rejects empty, absolute and parent-escaping relative paths.
pub fn ensure_relative_path(relative_path: &str) -> Result<&Path, StorageError> {
    let path = Path::new(relative_path);
    if relative_path.is_empty() {
        return Err(StorageError::InvalidRelativePath(relative_path.to_string()));
    }
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(StorageError::InvalidRelativePath(relative_path.to_string()));
    }
    Ok(path)
}
