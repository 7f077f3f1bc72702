mod catalog;
mod schema;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use toolgate_config::ToolgateConfig;

#[derive(Parser)]
#[command(name = "toolgate", about = "Agent tool catalog and schema CLI")]
struct Cli {
    /// Config file (default: ~/.toolgate/config.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tools exposed for a provider, model, and session as JSON
    Catalog {
        /// Model provider (e.g. "openai", "anthropic", "google")
        #[arg(short, long)]
        provider: String,

        /// Model ID (e.g. "gpt-5")
        #[arg(short, long)]
        model: String,

        /// Auth mode (e.g. "api-key", "oauth")
        #[arg(long)]
        auth_mode: Option<String>,

        /// Session key (e.g. "agent:main:subagent:1")
        #[arg(long)]
        session_key: Option<String>,

        /// Workspace directory for file tools
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
    /// Clean a JSON schema file for a provider and print the result
    CleanSchema {
        /// Path to a JSON schema file
        file: PathBuf,

        /// Model provider whose compatibility class applies
        #[arg(short, long)]
        provider: String,
    },
    /// Show the loaded configuration summary
    Health,
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<ToolgateConfig> {
    let config = match path {
        Some(path) => toolgate_config::load_config_from(path)?,
        None => toolgate_config::load_config()?,
    };
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load(cli.config.as_ref())?;

    match cli.command {
        Commands::Catalog {
            provider,
            model,
            auth_mode,
            session_key,
            workspace,
        } => {
            let request = catalog::CatalogRequest {
                provider,
                model,
                auth_mode,
                session_key,
                workspace,
            };
            println!("{}", catalog::run_catalog(&config, request)?);
        }
        Commands::CleanSchema { file, provider } => {
            println!("{}", schema::run_clean_schema(&config, &file, &provider)?);
        }
        Commands::Health => {
            println!("toolgate is healthy");
            println!(
                "  profile: {}",
                config.tools.policy.profile.as_deref().unwrap_or("full")
            );
            println!("  agents configured: {}", config.agents.list.len());
            println!(
                "  sandbox: {}",
                if config.sandbox.as_ref().is_some_and(|s| s.enabled) {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "  strict schema providers: {}",
                config.tools.schema.strict_providers.join(", ")
            );
        }
    }

    Ok(())
}
