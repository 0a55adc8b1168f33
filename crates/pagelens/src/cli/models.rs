//! The `pagelens models` command: list the models a credential can access.

use clap::Args;
use pagelens_core::{Config, ModelListing, Overrides, ProviderRegistry};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Provider to query: gemini, openai or volcano
    pub provider: String,

    /// API key to list with instead of the configured one
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL for OpenAI-compatible providers
    #[arg(long)]
    pub base_url: Option<String>,

    /// Pretty-print the JSON listing
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the models command.
///
/// Prints `{"models": [...]}` or `{"error": "..."}` to stdout. A listing
/// error still prints its JSON and then fails the command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::from_config(&config);
    let provider = registry.get(&args.provider)?;

    let overrides = Overrides {
        api_key: args.api_key.clone(),
        base_url: args.base_url.clone(),
        ..Default::default()
    };

    tracing::debug!("Listing models for {}", provider.display_name());
    let listing = provider.list_models(&overrides).await;
    println!("{}", render(&listing, args.pretty)?);

    if let ModelListing::Error { error } = listing {
        anyhow::bail!("{error}");
    }
    Ok(())
}

fn render(listing: &ModelListing, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(listing)
    } else {
        serde_json::to_string(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelens_core::ModelInfo;

    #[test]
    fn test_render_models_shape() {
        let listing = ModelListing::sorted(vec![ModelInfo {
            id: "gpt-4o".to_string(),
            display_name: "gpt-4o".to_string(),
            description: None,
            is_vision: true,
        }]);
        let json: serde_json::Value = serde_json::from_str(&render(&listing, false).unwrap()).unwrap();
        assert_eq!(json["models"][0]["id"], "gpt-4o");
        assert_eq!(json["models"][0]["is_vision"], true);
        assert!(json["models"][0].get("description").is_none());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let args = ModelsArgs {
            provider: "anthropic".to_string(),
            api_key: None,
            base_url: None,
            pretty: false,
        };
        let err = execute(args, Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported LLM provider"));
    }
}
