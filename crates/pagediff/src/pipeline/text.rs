use tracing::{debug, info_span, warn};

use crate::db::file_repo::{self, JobFileRow};
use crate::db::job_repo;
use crate::db::{JobStatus, TextStatus};
use crate::error::DocumentError;
use crate::storage::SetSide;

use super::error::PipelineError;
use super::runner::Pipeline;

#[derive(Default)]
struct ExtractedText {
    set_a: Option<String>,
    set_b: Option<String>,
}

impl ExtractedText {
    fn set(&mut self, side: SetSide, path: String) {
        match side {
            SetSide::A => self.set_a = Some(path),
            SetSide::B => self.set_b = Some(path),
        }
    }

    fn is_empty(&self) -> bool {
        self.set_a.is_none() && self.set_b.is_none()
    }
}

impl Pipeline {
    /// Extracts the text of both sides of a job file.
    ///
    /// Runs independently of page comparison; extraction failures are
    /// recorded on the file and never returned.
    pub fn extract_text(&self, file_id: &str) -> Result<(), PipelineError> {
        let _span = info_span!("pipeline.extract_text", file_id = %file_id).entered();

        let Some(file) = file_repo::find_by_id(&self.db, file_id)? else {
            debug!("File no longer exists, dropping task");
            return Ok(());
        };
        let job_status = self.db.with_conn(|conn| job_repo::status_in(conn, &file.job_id))?;
        if matches!(job_status, None | Some(JobStatus::Cancelled)) {
            debug!("Job is gone or cancelled, skipping text extraction");
            return Ok(());
        }

        file_repo::set_text_status(&self.db, file_id, TextStatus::Running, None)?;

        let mut extracted = ExtractedText::default();
        for side in SetSide::BOTH {
            if let Err(e) = self.extract_side(&file, side, &mut extracted) {
                warn!(side = %side, "Text extraction failed: {}", e);
                file_repo::finish_text(
                    &self.db,
                    file_id,
                    TextStatus::Failed,
                    extracted.set_a.as_deref(),
                    extracted.set_b.as_deref(),
                    Some(&e.to_string()),
                )?;
                return Ok(());
            }
        }

        let status = if file.is_missing() || extracted.is_empty() {
            TextStatus::Missing
        } else {
            TextStatus::Done
        };
        file_repo::finish_text(
            &self.db,
            file_id,
            status,
            extracted.set_a.as_deref(),
            extracted.set_b.as_deref(),
            None,
        )?;
        debug!(status = %status, "Text extraction finished");
        Ok(())
    }

    fn extract_side(
        &self,
        file: &JobFileRow,
        side: SetSide,
        extracted: &mut ExtractedText,
    ) -> Result<(), PipelineError> {
        let relative_path = match side {
            SetSide::A => file.set_a_path.as_deref(),
            SetSide::B => file.set_b_path.as_deref(),
        };
        let Some(relative_path) = relative_path else {
            return Ok(());
        };

        let path = self.storage.resolve(&file.job_id, side, relative_path)?;
        let document = match self.storage.read_document(&path) {
            Ok(bytes) => bytes,
            Err(DocumentError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let text = self.text.extract_text(&document)?;
        let written = self.storage.write_text(&file.job_id, &file.id, side, &text)?;
        extracted.set(side, written.to_string_lossy().into_owned());
        Ok(())
    }
}
