//! The `pagelens analyze` command.

use clap::{Args, ValueEnum};
use pagelens_core::{
    export, AnalysisRequest, Config, Dispatcher, Overrides, PageDiscovery, ResultCache,
    ResultWriter,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Supported output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array of documents
    Json,
    /// One page record per line (newline-delimited)
    Jsonl,
    /// Markdown report; with --output, one file per document in that directory
    Markdown,
}

impl From<OutputFormat> for pagelens_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Jsonl => Self::JsonLines,
            OutputFormat::Markdown => Self::Markdown,
        }
    }
}

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directories of page images (one document each) or single page images
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Provider: gemini, openai or volcano (defaults to config)
    #[arg(short = 'P', long)]
    pub provider: Option<String>,

    /// Model name, overriding the provider's configured model
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key for this run only
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL for OpenAI-compatible providers
    #[arg(long)]
    pub base_url: Option<String>,

    /// System prompt, overriding the configured default
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Extra user-turn prompt sent with every page
    #[arg(long)]
    pub user_prompt: Option<String>,

    /// Maximum concurrent provider calls
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Retries for transient failures (timeouts, 429, 5xx)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Output format (defaults to config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output file for json/jsonl, or directory for markdown (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Disable the outbound rate limiter
    #[arg(long)]
    pub no_rate_limit: bool,
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs, mut config: Config) -> anyhow::Result<()> {
    apply_args(&args, &mut config);
    let format = resolve_format(&args, &config)?;

    let documents = PageDiscovery::new(config.discovery.clone()).discover(&args.inputs);
    if documents.is_empty() {
        tracing::warn!("No page images found in {:?}", args.inputs);
        return Ok(());
    }
    let total_pages: usize = documents.iter().map(|d| d.pages.len()).sum();
    tracing::info!(
        "Found {} document(s), {} page(s) to analyze",
        documents.len(),
        total_pages
    );

    let dispatcher = Dispatcher::from_config(&config);
    let request = build_request(&args, &config);

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let progress = create_progress_bar(total_pages as u64);
    let start_time = Instant::now();
    let mut cache = ResultCache::new();

    for document in documents {
        progress.set_message(document.name.clone());
        let pb = progress.clone();
        let results = dispatcher
            .analyze_batch_with(&document.pages, &request, &cancel, move |result| {
                if !result.is_success() {
                    pb.println(format!(
                        "  {}: {}",
                        result.image.path.display(),
                        result.display_text()
                    ));
                }
                pb.inc(1);
            })
            .await?;
        cache.insert(&document.name, results);
    }
    progress.finish_and_clear();

    write_output(&args, format, &config, &cache)?;
    print_summary(&cache, start_time.elapsed(), cancel.is_cancelled());

    Ok(())
}

/// Fold CLI flags into the loaded configuration.
fn apply_args(args: &AnalyzeArgs, config: &mut Config) {
    if let Some(parallel) = args.parallel {
        config.dispatch.parallel = parallel.max(1);
    }
    if let Some(retries) = args.retries {
        config.dispatch.retry_attempts = retries;
    }
    if args.no_rate_limit {
        config.rate_limit.enabled = false;
    }
    if args.pretty {
        config.output.pretty = true;
    }
}

fn resolve_format(args: &AnalyzeArgs, config: &Config) -> anyhow::Result<pagelens_core::OutputFormat> {
    match args.format {
        Some(format) => Ok(format.into()),
        None => pagelens_core::OutputFormat::parse(&config.output.format).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown output.format {:?} in config (expected json, jsonl or markdown)",
                config.output.format
            )
        }),
    }
}

fn build_request(args: &AnalyzeArgs, config: &Config) -> AnalysisRequest {
    let provider = args
        .provider
        .clone()
        .unwrap_or_else(|| config.general.default_provider.clone());
    let user_prompt = args
        .user_prompt
        .clone()
        .or_else(|| Some(config.general.user_prompt.clone()));

    AnalysisRequest::new(provider, config.general.system_prompt.clone()).with_overrides(
        Overrides {
            api_key: args.api_key.clone(),
            model: args.model.clone(),
            base_url: args.base_url.clone(),
            system_prompt: args.system_prompt.clone(),
            user_prompt,
        },
    )
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted: finishing in-flight pages, skipping the rest");
            cancel.cancel();
        }
    });
}

fn write_output(
    args: &AnalyzeArgs,
    format: pagelens_core::OutputFormat,
    config: &Config,
    cache: &ResultCache,
) -> anyhow::Result<()> {
    let output = args
        .output
        .as_ref()
        .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()));

    match (format, output) {
        (pagelens_core::OutputFormat::Markdown, Some(dir)) => {
            let written = export::export_all(&dir, cache.documents())?;
            tracing::info!("Wrote {} Markdown file(s) to {:?}", written.len(), dir);
        }
        (format, Some(path)) => {
            let file = File::create(&path)?;
            let mut writer = ResultWriter::new(BufWriter::new(file), format, config.output.pretty);
            writer.write_documents(cache.documents())?;
            writer.flush()?;
            tracing::info!("Output written to {:?}", path);
        }
        (format, None) => {
            let stdout = std::io::stdout();
            let mut writer = ResultWriter::new(stdout.lock(), format, config.output.pretty);
            writer.write_documents(cache.documents())?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the run.
fn print_summary(cache: &ResultCache, elapsed: std::time::Duration, cancelled: bool) {
    let total: usize = cache.documents().iter().map(|d| d.results.len()).sum();
    let failed: usize = cache.documents().iter().map(|d| d.failed()).sum();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        total as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    let mut err = std::io::stderr().lock();
    let _ = writeln!(err);
    let _ = writeln!(err, "  ====================================");
    let _ = writeln!(err, "               Summary");
    let _ = writeln!(err, "  ====================================");
    let _ = writeln!(err, "    Documents:    {:>8}", cache.len());
    let _ = writeln!(err, "    Succeeded:    {:>8}", total - failed);
    if failed > 0 {
        let _ = writeln!(err, "    Failed:       {:>8}", failed);
    }
    if cancelled {
        let _ = writeln!(err, "    (cancelled)");
    }
    let _ = writeln!(err, "  ------------------------------------");
    let _ = writeln!(err, "    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    let _ = writeln!(err, "    Rate:         {:>7.1} pages/sec", rate);
    let _ = writeln!(err, "  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: AnalyzeArgs,
    }

    fn parse(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["analyze"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_request_prefers_flags_over_config() {
        let mut config = Config::default();
        config.general.user_prompt = "config user prompt".to_string();
        let args = parse(&[
            "pages/",
            "--provider",
            "OpenAI",
            "--api-key",
            "sk-flag",
            "--system-prompt",
            "Transcribe tables.",
        ]);

        let request = build_request(&args, &config);
        assert_eq!(request.provider(), "openai");
        assert_eq!(request.system_prompt(), "Transcribe tables.");
        assert_eq!(request.user_prompt(), Some("config user prompt"));
        assert_eq!(request.overrides().api_key(), Some("sk-flag"));
    }

    #[test]
    fn test_request_falls_back_to_config_defaults() {
        let config = Config::default();
        let request = build_request(&parse(&["pages/"]), &config);
        assert_eq!(request.provider(), "gemini");
        assert_eq!(request.system_prompt(), pagelens_core::config::DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.user_prompt(), None);
    }

    #[test]
    fn test_apply_args_updates_dispatch() {
        let mut config = Config::default();
        let args = parse(&["pages/", "--parallel", "0", "--retries", "2", "--no-rate-limit"]);
        apply_args(&args, &mut config);
        assert_eq!(config.dispatch.parallel, 1);
        assert_eq!(config.dispatch.retry_attempts, 2);
        assert!(!config.rate_limit.enabled);
    }

    #[test]
    fn test_resolve_format() {
        let mut config = Config::default();
        let args = parse(&["pages/", "--format", "markdown"]);
        assert_eq!(
            resolve_format(&args, &config).unwrap(),
            pagelens_core::OutputFormat::Markdown
        );

        config.output.format = "yaml".to_string();
        assert!(resolve_format(&parse(&["pages/"]), &config).is_err());
    }

    #[test]
    fn test_markdown_output_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let args = parse(&["pages/", "--output", out.to_str().unwrap()]);

        let mut cache = ResultCache::new();
        cache.insert(
            "report",
            vec![pagelens_core::AnalysisResult::success(
                pagelens_core::ImageRef::new(0, "pages/page_1.png"),
                "cover",
            )],
        );

        write_output(
            &args,
            pagelens_core::OutputFormat::Markdown,
            &Config::default(),
            &cache,
        )
        .unwrap();
        assert!(out.join("report_analysis.md").exists());
    }
}
