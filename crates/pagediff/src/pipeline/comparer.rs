use std::time::Instant;

use tracing::{debug, info_span, warn};

use crate::broadcast::PageEvent;
use crate::db::job_repo;
use crate::db::page_repo::{self, PageContext, PageOutcome};
use crate::db::JobStatus;
use crate::diff::{compare_rasters, overlay, Comparison};
use crate::queue::TaskHandle;
use crate::storage::SetSide;

use super::error::PipelineError;
use super::runner::Pipeline;

const CANCELLED_MESSAGE: &str = "cancelled";

impl Pipeline {
    /// Compares one page and records its terminal outcome.
    ///
    /// `handle` is the dispatch handle the task was submitted with; a
    /// delivery whose handle no longer matches the page, or that arrives
    /// after the page finished, is dropped without writes. Failures while
    /// rendering or diffing end up as a `failed` page, never as an error
    /// from this function.
    pub fn compare_page(
        &self,
        page_id: i64,
        handle: Option<&TaskHandle>,
    ) -> Result<(), PipelineError> {
        let _span = info_span!("pipeline.compare_page", page_id).entered();
        let handle = handle.map(TaskHandle::as_str);

        let Some(ctx) = page_repo::load_context(&self.db, page_id)? else {
            debug!("Page no longer exists, dropping task");
            return Ok(());
        };
        if !ctx.page.status.is_unfinished() || ctx.page.task_handle.as_deref() != handle {
            debug!(status = %ctx.page.status, "Stale delivery, dropping task");
            return Ok(());
        }

        if ctx.job_status == JobStatus::Cancelled {
            let outcome = PageOutcome::Failed {
                message: CANCELLED_MESSAGE.to_string(),
            };
            if page_repo::finalize(&self.db, page_id, handle, &outcome)? {
                self.emit(&ctx, &outcome);
            }
            return Ok(());
        }

        if !page_repo::mark_running(&self.db, page_id, handle)? {
            debug!("Page was taken over, dropping task");
            return Ok(());
        }

        let started = Instant::now();
        let outcome = if ctx.page.is_missing() {
            PageOutcome::Missing
        } else {
            self.compute_outcome(&ctx).unwrap_or_else(|e| {
                warn!(page_index = ctx.page.page_index, "Page comparison failed: {}", e);
                PageOutcome::Failed {
                    message: e.to_string(),
                }
            })
        };

        let job_status = self.db.with_conn(|conn| job_repo::status_in(conn, &ctx.job_id))?;
        if job_status == Some(JobStatus::Cancelled) {
            debug!("Job was cancelled while comparing, discarding outcome");
            return Ok(());
        }

        if !page_repo::finalize(&self.db, page_id, handle, &outcome)? {
            debug!("Page changed while comparing, discarding outcome");
            return Ok(());
        }

        debug!(
            status = %outcome.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Page finished"
        );
        self.emit(&ctx, &outcome);

        self.dispatch_pages(&ctx.job_id)?;
        self.try_complete_job(&ctx.job_id)?;
        Ok(())
    }

    fn compute_outcome(&self, ctx: &PageContext) -> Result<PageOutcome, PipelineError> {
        let file = &ctx.file;
        let index = ctx.page.page_index;
        let dpi = self.config.render_dpi;

        let path_a = self.storage.resolve(
            &ctx.job_id,
            SetSide::A,
            file.set_a_path.as_deref().unwrap_or(&file.relative_path),
        )?;
        let path_b = self.storage.resolve(
            &ctx.job_id,
            SetSide::B,
            file.set_b_path.as_deref().unwrap_or(&file.relative_path),
        )?;

        let raster_a = self.storage.render_page(&path_a, index, dpi)?;
        let raster_b = self.storage.render_page(&path_b, index, dpi)?;

        let diff = match compare_rasters(&raster_a, &raster_b, self.config.diff_threshold) {
            Comparison::IncompatibleSize { set_a, set_b } => {
                debug!(?set_a, ?set_b, "Page sizes differ");
                return Ok(PageOutcome::IncompatibleSize);
            }
            Comparison::Compared(diff) => diff,
        };

        let svg = overlay::build_overlay_svg(
            diff.width,
            diff.height,
            &diff.markers,
            self.config.marker_radius,
        )?;
        let overlay_path = self.storage.write_overlay(&ctx.job_id, &file.id, index, &svg)?;

        Ok(PageOutcome::Done {
            diff_score: diff.score,
            overlay_svg_path: overlay_path.to_string_lossy().into_owned(),
        })
    }

    fn emit(&self, ctx: &PageContext, outcome: &PageOutcome) {
        let (score, error) = match outcome {
            PageOutcome::Done { diff_score, .. } => (Some(*diff_score), None),
            PageOutcome::Failed { message } => (None, Some(message.as_str())),
            PageOutcome::Missing | PageOutcome::IncompatibleSize => (None, None),
        };
        self.events.send(
            PageEvent::new(
                &ctx.job_id,
                &ctx.file.id,
                ctx.page.id,
                ctx.page.page_index,
                outcome.status(),
            )
            .with_score(score)
            .with_error(error),
        );
    }
}
