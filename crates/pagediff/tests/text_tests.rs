//! Text extraction side channel.

mod common;

use common::*;

use pagediff::{JobStatus, PageStatus, SetSide, TextStatus};

#[test]
fn test_text_extracted_for_both_sides() {
    let h = TestHarness::new();
    let job = h.job_with(vec![
        (SetSide::A, "doc.pdf", FakeDocument::with_text(blank_pages(1), "old terms")),
        (SetSide::B, "doc.pdf", FakeDocument::with_text(blank_pages(1), "new terms")),
    ]);
    h.run_job_to_end(&job.id);

    let file = h.file(&job.id, "doc.pdf");
    assert_eq!(file.text_status, TextStatus::Done);
    assert!(file.text_error.is_none());
    let set_a = h.storage.artifact(file.text_set_a_path.as_deref().unwrap()).unwrap();
    let set_b = h.storage.artifact(file.text_set_b_path.as_deref().unwrap()).unwrap();
    assert_eq!(set_a, "old terms");
    assert_eq!(set_b, "new terms");
}

#[test]
fn test_text_failure_is_isolated_to_its_file() {
    let h = TestHarness::new();
    let job = h.job_with(vec![
        (SetSide::A, "bad.pdf", FakeDocument::with_text(blank_pages(1), "broken")),
        (SetSide::B, "bad.pdf", FakeDocument::with_text(blank_pages(1), "fine")),
        (SetSide::A, "good.pdf", FakeDocument::with_text(blank_pages(1), "a")),
        (SetSide::B, "good.pdf", FakeDocument::with_text(blank_pages(1), "b")),
    ]);
    h.run_job_to_end(&job.id);

    let bad = h.file(&job.id, "bad.pdf");
    assert_eq!(bad.text_status, TextStatus::Failed);
    assert!(bad.text_error.as_deref().unwrap().contains("500"));

    assert_eq!(h.file(&job.id, "good.pdf").text_status, TextStatus::Done);
    assert_eq!(h.pages(&job.id, "bad.pdf")[0].status, PageStatus::Done);
    assert_eq!(h.job(&job.id).status, JobStatus::Completed);
}

#[test]
fn test_one_sided_file_text_is_missing() {
    let h = TestHarness::new();
    let job = h.job_with(vec![(
        SetSide::B,
        "added.pdf",
        FakeDocument::with_text(blank_pages(1), "brand new"),
    )]);
    h.run_job_to_end(&job.id);

    let file = h.file(&job.id, "added.pdf");
    assert_eq!(file.text_status, TextStatus::Missing);
    assert!(file.text_set_a_path.is_none());
    let set_b = h.storage.artifact(file.text_set_b_path.as_deref().unwrap()).unwrap();
    assert_eq!(set_b, "brand new");
}

#[test]
fn test_blank_text_is_still_extracted() {
    let h = TestHarness::new();
    let job = h.job_with(TestHarness::both(
        "scan.pdf",
        FakeDocument::with_text(blank_pages(1), "   "),
    ));
    h.run_job_to_end(&job.id);

    let file = h.file(&job.id, "scan.pdf");
    assert_eq!(file.text_status, TextStatus::Done);
    for path in [&file.text_set_a_path, &file.text_set_b_path] {
        let written = h.storage.artifact(path.as_deref().unwrap()).unwrap();
        assert_eq!(written, "   ");
    }
}

#[test]
fn test_unreadable_sides_leave_text_missing() {
    let h = TestHarness::new();
    let job = h.job_with(TestHarness::both("doc.pdf", FakeDocument::pages(blank_pages(1))));
    h.pipeline.start_job(&job.id).unwrap();
    assert!(h.run_next());

    h.storage.remove(&job.id, SetSide::A, "doc.pdf");
    h.storage.remove(&job.id, SetSide::B, "doc.pdf");
    let file = h.file(&job.id, "doc.pdf");
    h.pipeline.extract_text(&file.id).unwrap();

    let file = h.file(&job.id, "doc.pdf");
    assert_eq!(file.text_status, TextStatus::Missing);
    assert!(file.text_set_a_path.is_none() && file.text_set_b_path.is_none());
}

#[test]
fn test_text_extraction_skipped_for_cancelled_job() {
    let h = TestHarness::new();
    let job = h.job_with(TestHarness::both(
        "doc.pdf",
        FakeDocument::with_text(blank_pages(1), "terms"),
    ));
    h.pipeline.start_job(&job.id).unwrap();
    assert!(h.run_next());

    h.pipeline.cancel_job(&job.id).unwrap();
    h.run_all();

    assert_eq!(h.file(&job.id, "doc.pdf").text_status, TextStatus::Pending);
}

#[test]
fn test_text_queue_failure_marks_file_failed() {
    let h = TestHarness::new();
    let job = h.job_with(TestHarness::both("doc.pdf", FakeDocument::pages(blank_pages(1))));
    h.pipeline.start_job(&job.id).unwrap();

    h.queue.set_failing(true);
    assert!(h.run_next());
    h.queue.set_failing(false);

    let file = h.file(&job.id, "doc.pdf");
    assert_eq!(file.text_status, TextStatus::Failed);
    assert!(file.text_error.is_some());
}
