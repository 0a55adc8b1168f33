//! The `pagelens config` command for configuration management.

use clap::{Args, Subcommand};
use pagelens_core::Config;
use std::path::Path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration (file plus environment)
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config: Config, path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", redacted(config).to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            // Defaults keep ${ENV_VAR} references rather than resolved secrets
            std::fs::write(path, Config::default().to_toml()?)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Mask literal API keys; `${VAR}` references are shown as-is.
fn redacted(mut config: Config) -> Config {
    for provider in [
        &mut config.providers.gemini,
        &mut config.providers.openai,
        &mut config.providers.volcano,
    ] {
        let key = provider.api_key.trim();
        if !key.is_empty() && !key.starts_with("${") {
            provider.api_key = "********".to_string();
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let init = |force| ConfigArgs {
            command: ConfigCommand::Init { force },
        };
        execute(init(false), Config::default(), &path).await.unwrap();
        assert!(path.exists());

        assert!(execute(init(false), Config::default(), &path).await.is_err());
        execute(init(true), Config::default(), &path).await.unwrap();

        let written = Config::load_from(&path).unwrap();
        assert_eq!(written.general.default_provider, "gemini");
    }

    #[test]
    fn test_show_masks_literal_keys() {
        let mut config = Config::default();
        config.providers.openai.api_key = "sk-secret".to_string();
        let shown = redacted(config);
        assert_eq!(shown.providers.openai.api_key, "********");
        assert_eq!(shown.providers.gemini.api_key, "${GEMINI_API_KEY}");
    }
}
