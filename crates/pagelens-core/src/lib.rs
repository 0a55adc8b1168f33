//! Pagelens Core - vision LLM analysis for rasterized document pages.
//!
//! Pagelens sends page images to a vision-capable LLM (Gemini, OpenAI, or an
//! OpenAI-compatible endpoint such as Volcano Engine Ark) and collects one
//! analysis result per page.
//!
//! # Architecture
//!
//! ```text
//! Pages → Discover → Dispatcher (rate limit, timeout, retry) → Provider → Results → JSON / Markdown
//! ```
//!
//! Per-request overrides (API key, model, base URL, prompts) are resolved for
//! each call. Configured baselines are never mutated.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pagelens_core::{AnalysisRequest, Config, Dispatcher};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pagelens_core::Result<()> {
//!     let config = Config::load()?;
//!     let dispatcher = Dispatcher::from_config(&config);
//!     let request = AnalysisRequest::new("gemini", &config.general.system_prompt);
//!
//!     let pages = vec!["report/page_1.png".into()];
//!     let results = dispatcher
//!         .analyze_batch(&pages, &request, &CancellationToken::new())
//!         .await?;
//!     println!("{}", results[0].display_text());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod ratelimit;
pub mod types;

// Re-exports for convenient access
pub use cache::ResultCache;
pub use config::Config;
pub use error::{AnalysisError, ConfigError, DispatchError, PagelensError, Result};
pub use llm::{
    AnalysisRequest, DispatchOptions, Dispatcher, Overrides, ProviderRegistry, VisionProvider,
};
pub use output::{OutputFormat, ResultWriter};
pub use pipeline::{Document, PageDiscovery};
pub use ratelimit::RateLimiter;
pub use types::{
    AnalysisResult, DocumentResults, ErrorKind, ImageRef, ModelInfo, ModelListing, Outcome,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dispatcher_from_default_config() {
        let dispatcher = Dispatcher::from_config(&Config::default());
        assert_eq!(dispatcher.options().parallel, 4);
        assert!(dispatcher.registry().get("gemini").is_ok());
    }
}
