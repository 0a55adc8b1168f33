//! Vision LLM integration for page analysis.
//!
//! Provides a provider abstraction over Gemini and OpenAI-compatible
//! backends, a registry of loaded clients, and a concurrent dispatcher that
//! analyzes batches of page images with per-image failure isolation.

pub(crate) mod dispatcher;
pub(crate) mod gemini;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod registry;
pub(crate) mod retry;

pub use dispatcher::{DispatchOptions, Dispatcher};
pub use gemini::GeminiProvider;
pub use openai::{Flavor, OpenAiCompatProvider, OPENAI, VOLCANO};
pub use provider::{
    AnalysisRequest, ImageInput, Overrides, ProviderSettings, ResolvedSettings, VisionProvider,
};
pub use registry::{ProviderRegistry, KNOWN_PROVIDERS};
