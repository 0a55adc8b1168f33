//! Page image discovery.
//!
//! A directory input is one document whose pages are the image files
//! directly inside it, ordered by natural page number. A file input is a
//! single-page document.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DiscoveryConfig;

/// A rasterized document: a name and its page images in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub pages: Vec<PathBuf>,
}

/// Finds page images on disk.
pub struct PageDiscovery {
    config: DiscoveryConfig,
}

impl PageDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Discover one document per input path. Inputs that yield no pages are skipped.
    pub fn discover(&self, inputs: &[PathBuf]) -> Vec<Document> {
        inputs
            .iter()
            .filter_map(|input| {
                let document = self.discover_one(input);
                if document.is_none() {
                    tracing::warn!("No page images found at {input:?}");
                }
                document
            })
            .collect()
    }

    fn discover_one(&self, path: &Path) -> Option<Document> {
        let name = document_name(path);

        if path.is_file() {
            return self.is_supported(path).then(|| Document {
                name,
                pages: vec![path.to_path_buf()],
            });
        }

        let mut pages: Vec<PathBuf> = WalkDir::new(path)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|entry| entry.into_path())
            .filter(|p| p.is_file() && self.is_supported(p))
            .collect();

        if pages.is_empty() {
            return None;
        }
        pages.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));

        tracing::debug!(document = %name, pages = pages.len(), "Discovered document");
        Some(Document { name, pages })
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.to_lowercase() == ext_lower)
            })
            .unwrap_or(false)
    }
}

fn document_name(path: &Path) -> String {
    let raw = if path.is_file() {
        path.file_stem()
    } else {
        path.file_name()
    };
    raw.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Compare strings so embedded numbers sort by value (`page_2` < `page_10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_number(&mut a);
                let right = take_number(&mut b);
                let ord = left
                    .trim_start_matches('0')
                    .len()
                    .cmp(&right.trim_start_matches('0').len())
                    .then_with(|| left.trim_start_matches('0').cmp(right.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}
