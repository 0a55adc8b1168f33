//! Batch dispatcher: fans page images out to one provider concurrently.
//!
//! Every image that enters a batch produces exactly one [`AnalysisResult`].
//! Provider errors, timeouts, content blocks, task panics, and cancellation
//! are all folded into per-image error results. Only batch-level problems
//! (unknown provider, empty batch) come back as a [`DispatchError`].

use super::provider::{AnalysisRequest, ImageInput, Overrides, VisionProvider};
use super::registry::ProviderRegistry;
use super::retry;
use crate::config::{Config, DispatchConfig};
use crate::error::{AnalysisError, DispatchError};
use crate::ratelimit::RateLimiter;
use crate::types::{AnalysisResult, ImageRef, ModelListing};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Maximum concurrent provider calls
    pub parallel: usize,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum retries per image for transient failures
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatchOptions {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            parallel: config.parallel,
            timeout_ms: config.timeout_ms,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// Concurrent multi-provider analysis engine.
pub struct Dispatcher {
    registry: ProviderRegistry,
    options: DispatchOptions,
    limiter: Option<Arc<RateLimiter>>,
}

impl Dispatcher {
    pub fn new(registry: ProviderRegistry, options: DispatchOptions) -> Self {
        Self {
            registry,
            options,
            limiter: None,
        }
    }

    /// Gate every outbound provider call through `limiter`.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build registry, options, and limiter from configuration.
    pub fn from_config(config: &Config) -> Self {
        let dispatcher = Self::new(
            ProviderRegistry::from_config(config),
            DispatchOptions::from(&config.dispatch),
        );
        if config.rate_limit.enabled {
            dispatcher.with_rate_limiter(Arc::new(RateLimiter::new(
                config.rate_limit.tokens_per_second,
                config.rate_limit.max_tokens,
            )))
        } else {
            dispatcher
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Analyze a batch, returning results in request order.
    pub async fn analyze_batch(
        &self,
        images: &[PathBuf],
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnalysisResult>, DispatchError> {
        self.analyze_batch_with(images, request, cancel, |_| {}).await
    }

    /// Analyze a single page image.
    pub async fn analyze_image(
        &self,
        image: &Path,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, DispatchError> {
        let mut results = self
            .analyze_batch(&[image.to_path_buf()], request, &CancellationToken::new())
            .await?;
        results.pop().ok_or(DispatchError::EmptyBatch)
    }

    /// Analyze a batch, calling `on_result` for each result as it completes.
    ///
    /// Spawns one tokio task per image, bounded by a semaphore. The returned
    /// vector is sorted by [`ImageRef::index`]; the callback sees completion
    /// order.
    pub async fn analyze_batch_with<F>(
        &self,
        images: &[PathBuf],
        request: &AnalysisRequest,
        cancel: &CancellationToken,
        on_result: F,
    ) -> Result<Vec<AnalysisResult>, DispatchError>
    where
        F: Fn(&AnalysisResult) + Send + Sync + 'static,
    {
        if images.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        let provider = self.registry.get(request.provider())?;

        tracing::info!(
            provider = provider.id(),
            images = images.len(),
            parallel = self.options.parallel,
            "Dispatching batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.parallel.max(1)));
        let on_result = Arc::new(on_result);
        let request = Arc::new(request.clone());
        let mut handles = Vec::with_capacity(images.len());
        let mut results = Vec::with_capacity(images.len());

        for (index, path) in images.iter().enumerate() {
            let image = ImageRef::new(index, path.clone());

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                let result = AnalysisResult::failure(image, &AnalysisError::Cancelled);
                on_result(&result);
                results.push(result);
                continue;
            };

            let provider = provider.clone();
            let request = request.clone();
            let options = self.options.clone();
            let limiter = self.limiter.clone();
            let cancel = cancel.clone();
            let on_result = on_result.clone();
            let task_image = image.clone();

            let handle = tokio::spawn(async move {
                let result = analyze_one(
                    provider.as_ref(),
                    task_image,
                    &request,
                    &options,
                    limiter.as_deref(),
                    &cancel,
                )
                .await;
                drop(permit); // Release concurrency permit before callback
                on_result(&result);
                result
            });

            handles.push((image, handle));
        }

        for (image, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Analysis task for {:?} panicked: {e}", image.path);
                    let result = AnalysisResult::failure(
                        image,
                        &AnalysisError::Unknown(format!("analysis task failed: {e}")),
                    );
                    on_result(&result);
                    results.push(result);
                }
            }
        }

        results.sort_by_key(|r| r.image.index);

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            succeeded = results.len() - failed,
            failed,
            "Batch complete"
        );

        Ok(results)
    }

    /// Enumerate models for a provider. Listing failures come back inside the
    /// [`ModelListing`]; only an unknown or unloaded provider is an `Err`.
    pub async fn list_models(
        &self,
        provider: &str,
        overrides: &Overrides,
    ) -> Result<ModelListing, DispatchError> {
        let provider = self.registry.get(provider)?;
        Ok(provider.list_models(overrides).await)
    }
}

/// Analyze one image, converting every failure into an error result.
async fn analyze_one(
    provider: &dyn VisionProvider,
    image: ImageRef,
    request: &AnalysisRequest,
    options: &DispatchOptions,
    limiter: Option<&RateLimiter>,
    cancel: &CancellationToken,
) -> AnalysisResult {
    match analyze_with_retry(provider, &image.path, request, options, limiter, cancel).await {
        Ok(text) => AnalysisResult::success(image, text),
        Err(e) => {
            tracing::warn!(path = ?image.path, kind = ?e.kind(), "Page analysis failed: {e}");
            AnalysisResult::failure(image, &e)
        }
    }
}

async fn analyze_with_retry(
    provider: &dyn VisionProvider,
    path: &Path,
    request: &AnalysisRequest,
    options: &DispatchOptions,
    limiter: Option<&RateLimiter>,
    cancel: &CancellationToken,
) -> Result<String, AnalysisError> {
    let input = ImageInput::load(path).await?;
    let timeout = Duration::from_millis(options.timeout_ms);

    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        if let Some(limiter) = limiter {
            wait_for_token(limiter, cancel).await?;
        }

        let outcome = match tokio::time::timeout(timeout, provider.analyze(&input, request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AnalysisError::Timeout {
                provider: provider.display_name().to_string(),
                timeout_ms: options.timeout_ms,
            }),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(e) if attempt < options.retry_attempts && retry::is_retryable(&e) => {
                let delay = retry::jittered_backoff(attempt, options.retry_delay_ms);
                attempt += 1;
                tracing::debug!(
                    "Retry {attempt}/{} for {path:?} after {delay:?}: {e}",
                    options.retry_attempts
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(e),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Take one limiter token, waiting if the bucket is empty.
async fn wait_for_token(
    limiter: &RateLimiter,
    cancel: &CancellationToken,
) -> Result<(), AnalysisError> {
    if limiter.consume(1.0) {
        return Ok(());
    }
    tracing::debug!("Rate limit reached, waiting for a token");
    tokio::select! {
        _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
        _ = limiter.consume_async(1.0) => Ok(()),
    }
}
