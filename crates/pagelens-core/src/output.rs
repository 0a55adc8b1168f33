//! Result serialization for JSON, JSON Lines, and Markdown output.
//!
//! JSON writes one array of documents. JSON Lines writes one page record per
//! line, tagged with its document name. Markdown concatenates the per-document
//! export layout.

use serde::Serialize;
use std::io::{self, Write};

use crate::export::render_markdown;
use crate::types::{AnalysisResult, DocumentResults};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON array of documents
    Json,
    /// One page record per line (newline-delimited JSON)
    JsonLines,
    /// Human-readable Markdown report
    Markdown,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// One page in JSON Lines output.
#[derive(Serialize)]
struct PageRecord<'a> {
    document: &'a str,
    #[serde(flatten)]
    result: &'a AnalysisResult,
}

/// Serializes analysis results in the chosen format.
pub struct ResultWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    pages_written: usize,
}

impl<W: Write> ResultWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            pages_written: 0,
        }
    }

    /// Write a single page record as one JSON line, whatever the format.
    pub fn write_page(&mut self, document: &str, result: &AnalysisResult) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &PageRecord { document, result })
            .map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.pages_written += 1;
        Ok(())
    }

    /// Write every document in the configured format.
    pub fn write_documents(&mut self, documents: &[DocumentResults]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, documents)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, documents)
                        .map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
                self.pages_written += documents.iter().map(|d| d.results.len()).sum::<usize>();
            }
            OutputFormat::JsonLines => {
                for document in documents {
                    for result in &document.results {
                        self.write_page(&document.name, result)?;
                    }
                }
            }
            OutputFormat::Markdown => {
                for document in documents {
                    self.writer.write_all(render_markdown(document).as_bytes())?;
                    self.pages_written += document.results.len();
                }
            }
        }
        Ok(())
    }

    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageRef;

    fn documents() -> Vec<DocumentResults> {
        vec![
            DocumentResults::new(
                "report",
                vec![
                    AnalysisResult::success(ImageRef::new(0, "report/page_1.png"), "cover"),
                    AnalysisResult::success(ImageRef::new(1, "report/page_2.png"), "contents"),
                ],
            ),
            DocumentResults::new(
                "memo",
                vec![AnalysisResult::success(ImageRef::new(0, "memo.png"), "memo text")],
            ),
        ]
    }

    #[test]
    fn test_write_json_array() {
        let mut buffer = Vec::new();
        let mut writer = ResultWriter::new(&mut buffer, OutputFormat::Json, false);
        writer.write_documents(&documents()).unwrap();
        assert_eq!(writer.pages_written(), 3);

        let output = String::from_utf8(buffer).unwrap();
        let parsed: Vec<DocumentResults> = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed, documents());
    }

    #[test]
    fn test_write_jsonl_one_page_per_line() {
        let mut buffer = Vec::new();
        let mut writer = ResultWriter::new(&mut buffer, OutputFormat::JsonLines, true);
        writer.write_documents(&documents()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);
        let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last["document"], "memo");
        assert_eq!(last["status"], "analysis");
        assert_eq!(last["text"], "memo text");
    }

    #[test]
    fn test_write_markdown() {
        let mut buffer = Vec::new();
        let mut writer = ResultWriter::new(&mut buffer, OutputFormat::Markdown, false);
        writer.write_documents(&documents()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("# Analysis Results: report"));
        assert!(output.contains("# Analysis Results: memo"));
        assert_eq!(output.matches("## Page").count(), 3);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("invalid"), None);
    }
}
