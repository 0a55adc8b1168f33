//! Input side of the pipeline: turning paths into documents of page images.

pub mod discovery;

pub use discovery::{Document, PageDiscovery};
