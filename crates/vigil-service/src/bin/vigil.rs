//! Vigil binary
//!
//! # Usage
//! ```bash
//! vigil serve --config vigil.toml
//! vigil ask --config vigil.toml --agent <AGENT_ID> --token <TOKEN> "Do you ship internationally?"
//! vigil check-config --config vigil.toml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigil_core::{ChatMessage, ReviewPipeline};
use vigil_llm::AnthropicBackend;
use vigil_service::{
    http, ChatRequest, ChatService, Collaborators, InMemoryStores, ServiceConfig,
};

/// Vigil - reviewed replies for business assistant agents
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the chat endpoint
    Serve {
        /// Configuration file
        #[arg(short, long, default_value = "vigil.toml")]
        config: PathBuf,
    },

    /// Run one chat turn and print the response JSON
    Ask {
        /// Configuration file
        #[arg(short, long, default_value = "vigil.toml")]
        config: PathBuf,

        /// Agent to ask
        #[arg(long)]
        agent: String,

        /// Bearer token of the caller
        #[arg(long)]
        token: String,

        /// Conversation the exchange is stored under
        #[arg(long, default_value = "cli")]
        conversation: String,

        /// The user message
        message: String,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Configuration file
        #[arg(short, long, default_value = "vigil.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Serve { config } => serve(&config).await,
        Command::Ask {
            config,
            agent,
            token,
            conversation,
            message,
        } => ask(&config, agent, &token, conversation, message).await,
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    ServiceConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn build_service(config: &ServiceConfig) -> anyhow::Result<(ChatService, InMemoryStores)> {
    let backend = AnthropicBackend::from_config(&config.llm).context("configuring LLM backend")?;
    let pipeline = ReviewPipeline::from_config(Arc::new(backend), &config.pipeline)
        .context("configuring review pipeline")?;
    let stores = InMemoryStores::from_seed(&config.seed);

    let service = ChatService::new(pipeline, Collaborators::from(&stores))
        .with_request_timeout(config.server.request_timeout());
    Ok((service, stores))
}

async fn serve(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let (service, _stores) = build_service(&config)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown signal received");
    };

    let (addr, server) = http::bind(Arc::new(service), config.server.listen, shutdown)
        .with_context(|| format!("binding {}", config.server.listen))?;
    tracing::info!(%addr, model = %config.llm.model, "vigil listening");

    server.await;
    Ok(())
}

async fn ask(
    path: &Path,
    agent: String,
    token: &str,
    conversation: String,
    message: String,
) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let (service, _stores) = build_service(&config)?;

    let request = ChatRequest {
        agent_id: agent,
        conversation_id: conversation,
        messages: vec![ChatMessage::user(message)],
    };
    let response = service.handle(Some(token), request).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    println!(
        "{}: ok (listen {}, max_attempts {}, {} seeded agents)",
        path.display(),
        config.server.listen,
        config.pipeline.max_attempts,
        config.seed.agents.len()
    );
    Ok(())
}
