//! PDF page counting (lopdf) and rasterization (poppler's `pdftoppm`).

use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;

use crate::error::DocumentError;

/// Returns the number of pages in a PDF.
pub fn page_count(path: &Path) -> Result<u32, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }

    let doc = lopdf::Document::load(path).map_err(|e| DocumentError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(doc.get_pages().len() as u32)
}

/// Renders a zero-based page of a PDF to an RGB raster.
pub fn render_page(path: &Path, page_index: u32, dpi: u32) -> Result<RgbImage, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }

    // pdftoppm numbers pages from 1
    let page_num = (page_index + 1).to_string();
    let output_prefix = std::env::temp_dir().join(format!("pagediff_page_{}", uuid::Uuid::new_v4()));

    let output = Command::new("pdftoppm")
        .args(["-png", "-singlefile", "-r", &dpi.to_string()])
        .args(["-f", &page_num, "-l", &page_num])
        .arg(path)
        .arg(&output_prefix)
        .output()
        .map_err(|e| {
            DocumentError::Render(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    let image_path = PathBuf::from(format!("{}.png", output_prefix.display()));

    if !output.status.success() {
        let _ = std::fs::remove_file(&image_path);
        return Err(DocumentError::Render(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    if !image_path.exists() {
        return Err(DocumentError::PageOutOfRange {
            path: path.to_path_buf(),
            index: page_index,
        });
    }

    let decoded = image::open(&image_path);
    let _ = std::fs::remove_file(&image_path);

    Ok(decoded?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    /// Writes a PDF with `pages` blank letter-sized pages.
    fn write_blank_pdf(path: &Path, pages: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                })
                .into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        write_blank_pdf(&path, 3);

        assert_eq!(page_count(&path).unwrap(), 3);
    }

    #[test]
    fn test_page_count_missing_file() {
        let err = page_count(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[test]
    fn test_page_count_garbage_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = page_count(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Unreadable { .. }));
    }
}
