//! Markdown export of analyzed documents.

use std::path::{Path, PathBuf};

use crate::error::PagelensError;
use crate::types::DocumentResults;

/// Render one document as Markdown, one section per page.
pub fn render_markdown(document: &DocumentResults) -> String {
    let mut out = format!("# Analysis Results: {}\n\n", document.name);
    for (i, result) in document.results.iter().enumerate() {
        out.push_str(&format!("## Page {}\n\n", i + 1));
        out.push_str(&format!(
            "**Analysis Text:**\n```\n{}\n```\n\n",
            result.display_text()
        ));
        out.push_str("---\n\n");
    }
    out
}

/// File name for a document's export, with path separators neutralised.
pub fn markdown_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{safe}_analysis.md")
}

/// Write one document's Markdown into `dir`, returning the file path.
pub fn export_document(dir: &Path, document: &DocumentResults) -> Result<PathBuf, PagelensError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(markdown_file_name(&document.name));
    std::fs::write(&path, render_markdown(document))?;
    tracing::info!("Exported {:?}", path);
    Ok(path)
}

/// Write every document with at least one page into `dir`.
pub fn export_all(dir: &Path, documents: &[DocumentResults]) -> Result<Vec<PathBuf>, PagelensError> {
    let mut written = Vec::with_capacity(documents.len());
    for document in documents {
        if document.results.is_empty() {
            tracing::warn!("Skipping {:?}: no page results", document.name);
            continue;
        }
        written.push(export_document(dir, document)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::types::{AnalysisResult, ImageRef};

    fn document() -> DocumentResults {
        DocumentResults::new(
            "report",
            vec![
                AnalysisResult::success(ImageRef::new(0, "page_1.png"), "Title page."),
                AnalysisResult::failure(
                    ImageRef::new(1, "page_2.png"),
                    &AnalysisError::ContentBlocked("SAFETY".to_string()),
                ),
            ],
        )
    }

    #[test]
    fn test_render_markdown_layout() {
        let md = render_markdown(&document());
        let expected = "# Analysis Results: report\n\n\
            ## Page 1\n\n**Analysis Text:**\n```\nTitle page.\n```\n\n---\n\n\
            ## Page 2\n\n**Analysis Text:**\n```\nError: Content generation blocked - SAFETY\n```\n\n---\n\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn test_file_name_is_flat() {
        assert_eq!(markdown_file_name("report"), "report_analysis.md");
        assert_eq!(markdown_file_name("a/b"), "a_b_analysis.md");
    }

    #[test]
    fn test_export_all_skips_empty_documents() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![document(), DocumentResults::new("empty", vec![])];

        let written = export_all(dir.path(), &docs).unwrap();
        assert_eq!(written, vec![dir.path().join("report_analysis.md")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert!(content.starts_with("# Analysis Results: report"));
    }
}
