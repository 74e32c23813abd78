use std::path::{Path, PathBuf};

use image::RgbImage;
use walkdir::WalkDir;

use super::{ensure_relative_path, pdf, SetSide, StorageProvider};
use crate::error::{DocumentError, StorageError};

/// Filesystem layout under the data directory:
///
/// ```text
/// jobs/<job>/setA/<relative path>
/// jobs/<job>/setB/<relative path>
/// jobs/<job>/artifacts/<file>/page_<n>.svg
/// jobs/<job>/text/<file>/setA.txt
/// ```
pub struct FsStorage {
    data_directory: PathBuf,
}

impl FsStorage {
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.as_ref().to_path_buf(),
        }
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    pub fn job_directory(&self, job_id: &str) -> PathBuf {
        self.data_directory.join("jobs").join(job_id)
    }

    pub fn side_directory(&self, job_id: &str, side: SetSide) -> PathBuf {
        self.job_directory(job_id).join(side.dir_name())
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn write_artifact(&self, path: PathBuf, content: &[u8]) -> Result<PathBuf, StorageError> {
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }
        std::fs::write(&path, content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

impl StorageProvider for FsStorage {
    fn open_document(&self, path: &Path) -> Result<u32, DocumentError> {
        pdf::page_count(path)
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: u32,
        dpi: u32,
    ) -> Result<RgbImage, DocumentError> {
        pdf::render_page(path, page_index, dpi)
    }

    fn read_document(&self, path: &Path) -> Result<Vec<u8>, DocumentError> {
        std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound(path.to_path_buf())
            } else {
                DocumentError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })
    }

    fn list_files(&self, job_id: &str, side: SetSide) -> Result<Vec<String>, StorageError> {
        let root = self.side_directory(job_id, side);
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(|e| StorageError::ScanFailed {
                path: root.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
        files.sort();
        Ok(files)
    }

    fn resolve(
        &self,
        job_id: &str,
        side: SetSide,
        relative_path: &str,
    ) -> Result<PathBuf, StorageError> {
        let relative = ensure_relative_path(relative_path)?;
        Ok(self.side_directory(job_id, side).join(relative))
    }

    fn write_overlay(
        &self,
        job_id: &str,
        file_id: &str,
        page_index: u32,
        svg: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self
            .job_directory(job_id)
            .join("artifacts")
            .join(file_id)
            .join(format!("page_{}.svg", page_index));
        self.write_artifact(path, svg.as_bytes())
    }

    fn write_text(
        &self,
        job_id: &str,
        file_id: &str,
        side: SetSide,
        text: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self
            .job_directory(job_id)
            .join("text")
            .join(file_id)
            .join(format!("{}.txt", side.dir_name()));
        self.write_artifact(path, text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_files_is_sorted_and_relative() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::new(temp_dir.path());
        let side = storage.side_directory("job1", SetSide::A);
        std::fs::create_dir_all(side.join("nested")).unwrap();
        std::fs::write(side.join("b.pdf"), b"b").unwrap();
        std::fs::write(side.join("nested").join("a.pdf"), b"a").unwrap();

        let files = storage.list_files("job1", SetSide::A).unwrap();
        assert_eq!(files, vec!["b.pdf".to_string(), "nested/a.pdf".to_string()]);
    }

    #[test]
    fn test_list_files_missing_side_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::new(temp_dir.path());
        assert!(storage.list_files("job1", SetSide::B).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let storage = FsStorage::new("/data");
        let ok = storage.resolve("job1", SetSide::B, "x/y.pdf").unwrap();
        assert_eq!(ok, PathBuf::from("/data/jobs/job1/setB/x/y.pdf"));
        assert!(storage.resolve("job1", SetSide::B, "../setA/y.pdf").is_err());
    }

    #[test]
    fn test_write_overlay_and_text_layout() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsStorage::new(temp_dir.path());

        let overlay = storage.write_overlay("job1", "file1", 2, "<svg/>").unwrap();
        assert!(overlay.ends_with("jobs/job1/artifacts/file1/page_2.svg"));
        assert_eq!(std::fs::read_to_string(&overlay).unwrap(), "<svg/>");

        let text = storage
            .write_text("job1", "file1", SetSide::B, "hello")
            .unwrap();
        assert!(text.ends_with("jobs/job1/text/file1/setB.txt"));
    }

    #[test]
    fn test_read_document_not_found() {
        let storage = FsStorage::new("/data");
        let err = storage
            .read_document(Path::new("/nonexistent/doc.pdf"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }
}
