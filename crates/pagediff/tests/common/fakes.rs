//! In-memory stand-ins for storage, the task queue and text extraction.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use image::RgbImage;

use pagediff::db::DatabaseError;
use pagediff::{
    DocumentError, QueueError, SetSide, StorageError, StorageProvider, Task, TaskHandle,
    TaskQueue, TextError, TextExtractor,
};

const ROOT: &str = "/fake";

/// A stored document.
#[derive(Clone)]
pub enum FakeDocument {
    /// Opens fine and renders the given pages. `text` is what
    /// `read_document` hands to the text extractor.
    Pages { pages: Vec<RgbImage>, text: String },
    /// Reports `count` pages but fails to render any of them.
    Unrenderable { count: u32 },
    /// Cannot be opened at all.
    Corrupt,
}

impl FakeDocument {
    pub fn pages(pages: Vec<RgbImage>) -> Self {
        let text = format!("document with {} pages", pages.len());
        FakeDocument::Pages { pages, text }
    }

    pub fn with_text(pages: Vec<RgbImage>, text: &str) -> Self {
        FakeDocument::Pages {
            pages,
            text: text.to_string(),
        }
    }
}

/// Storage provider backed by maps keyed on resolved paths.
#[derive(Default)]
pub struct FakeStorage {
    documents: Mutex<BTreeMap<PathBuf, FakeDocument>>,
    artifacts: Mutex<HashMap<PathBuf, String>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn side_root(job_id: &str, side: SetSide) -> PathBuf {
        Path::new(ROOT).join(job_id).join(side.dir_name())
    }

    pub fn put(&self, job_id: &str, side: SetSide, relative_path: &str, document: FakeDocument) {
        let path = Self::side_root(job_id, side).join(relative_path);
        self.documents.lock().unwrap().insert(path, document);
    }

    pub fn remove(&self, job_id: &str, side: SetSide, relative_path: &str) {
        let path = Self::side_root(job_id, side).join(relative_path);
        self.documents.lock().unwrap().remove(&path);
    }

    pub fn artifact(&self, path: &str) -> Option<String> {
        self.artifacts.lock().unwrap().get(Path::new(path)).cloned()
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }

    fn document(&self, path: &Path) -> Result<FakeDocument, DocumentError> {
        self.documents
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(path.to_path_buf()))
    }

    fn store(&self, path: PathBuf, content: &str) -> PathBuf {
        self.artifacts
            .lock()
            .unwrap()
            .insert(path.clone(), content.to_string());
        path
    }
}

impl StorageProvider for FakeStorage {
    fn open_document(&self, path: &Path) -> Result<u32, DocumentError> {
        match self.document(path)? {
            FakeDocument::Pages { pages, .. } => Ok(pages.len() as u32),
            FakeDocument::Unrenderable { count } => Ok(count),
            FakeDocument::Corrupt => Err(DocumentError::Unreadable {
                path: path.to_path_buf(),
                reason: "not a PDF".to_string(),
            }),
        }
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: u32,
        _dpi: u32,
    ) -> Result<RgbImage, DocumentError> {
        match self.document(path)? {
            FakeDocument::Pages { pages, .. } => {
                pages
                    .get(page_index as usize)
                    .cloned()
                    .ok_or_else(|| DocumentError::PageOutOfRange {
                        path: path.to_path_buf(),
                        index: page_index,
                    })
            }
            FakeDocument::Unrenderable { .. } => {
                Err(DocumentError::Render("renderer crashed".to_string()))
            }
            FakeDocument::Corrupt => Err(DocumentError::Unreadable {
                path: path.to_path_buf(),
                reason: "not a PDF".to_string(),
            }),
        }
    }

    fn read_document(&self, path: &Path) -> Result<Vec<u8>, DocumentError> {
        match self.document(path)? {
            FakeDocument::Pages { text, .. } => Ok(text.into_bytes()),
            FakeDocument::Unrenderable { .. } | FakeDocument::Corrupt => Ok(b"%PDF-junk".to_vec()),
        }
    }

    fn list_files(&self, job_id: &str, side: SetSide) -> Result<Vec<String>, StorageError> {
        let root = Self::side_root(job_id, side);
        Ok(self
            .documents
            .lock()
            .unwrap()
            .keys()
            .filter_map(|path| path.strip_prefix(&root).ok())
            .map(|relative| relative.to_string_lossy().into_owned())
            .collect())
    }

    fn resolve(
        &self,
        job_id: &str,
        side: SetSide,
        relative_path: &str,
    ) -> Result<PathBuf, StorageError> {
        let relative = pagediff::storage::ensure_relative_path(relative_path)?;
        Ok(Self::side_root(job_id, side).join(relative))
    }

    fn write_overlay(
        &self,
        job_id: &str,
        file_id: &str,
        page_index: u32,
        svg: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = Path::new(ROOT)
            .join(job_id)
            .join("artifacts")
            .join(file_id)
            .join(format!("page_{}.svg", page_index));
        Ok(self.store(path, svg))
    }

    fn write_text(
        &self,
        job_id: &str,
        file_id: &str,
        side: SetSide,
        text: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = Path::new(ROOT)
            .join(job_id)
            .join("text")
            .join(file_id)
            .join(format!("{}.txt", side.dir_name()));
        Ok(self.store(path, text))
    }
}

/// Queue that records submissions in FIFO order for the harness to run.
#[derive(Default)]
pub struct RecordingQueue {
    tasks: Mutex<VecDeque<(TaskHandle, Task)>>,
    revoked: Mutex<Vec<TaskHandle>>,
    failing: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `enqueue` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn pop(&self) -> Option<(TaskHandle, Task)> {
        self.tasks.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.tasks.lock().unwrap().clear();
    }

    pub fn queued(&self) -> Vec<(TaskHandle, Task)> {
        self.tasks.lock().unwrap().iter().cloned().collect()
    }

    pub fn compare_tasks(&self) -> Vec<(TaskHandle, i64)> {
        self.queued()
            .into_iter()
            .filter_map(|(handle, task)| match task {
                Task::ComparePage { page_id } => Some((handle, page_id)),
                _ => None,
            })
            .collect()
    }

    pub fn revoked(&self) -> Vec<TaskHandle> {
        self.revoked.lock().unwrap().clone()
    }
}

impl TaskQueue for RecordingQueue {
    fn enqueue(&self, handle: &TaskHandle, task: &Task) -> Result<(), QueueError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QueueError::Database(DatabaseError::LockPoisoned));
        }
        self.tasks
            .lock()
            .unwrap()
            .push_back((handle.clone(), task.clone()));
        Ok(())
    }

    fn revoke(&self, handle: &TaskHandle) -> Result<bool, QueueError> {
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|(queued, _)| queued != handle);
        let removed = tasks.len() != before;
        if removed {
            self.revoked.lock().unwrap().push(handle.clone());
        }
        Ok(removed)
    }
}

/// Echoes the document bytes back as text; documents whose text starts
/// with `broken` make the service answer 500.
#[derive(Default)]
pub struct FakeTextExtractor;

impl TextExtractor for FakeTextExtractor {
    fn extract_text(&self, document: &[u8]) -> Result<String, TextError> {
        let text = String::from_utf8_lossy(document).into_owned();
        if text.starts_with("broken") {
            return Err(TextError::Status { status: 500 });
        }
        Ok(text)
    }
}
