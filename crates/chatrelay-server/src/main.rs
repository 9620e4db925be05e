use anyhow::Result;
use chatrelay_core::{ConversationService, ConversationStore, OpenAiGateway, Settings};
use chatrelay_server::{run_http, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "ChatRelay - streaming chat relay in front of an LLM completion API")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Model identifier sent upstream
    #[arg(short, long)]
    model: Option<String>,

    /// Number of recent turns sent to the model
    #[arg(long)]
    history_window: Option<usize>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = match cli.config {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(ref model) = cli.model {
        settings.llm.model = model.clone();
    }
    if let Some(window) = cli.history_window {
        settings.history.window = window;
    }
    settings.validate()?;

    if settings.llm.api_key.is_none() {
        tracing::warn!(
            "{} is not set; upstream calls will go out without a key",
            settings.llm.api_key_env
        );
    }
    if !settings.auth_enabled() {
        tracing::warn!("API_KEY is empty; /chat and /history are open to anyone");
    }

    let gateway = Arc::new(OpenAiGateway::from_settings(&settings.llm));
    let store = ConversationStore::new().with_window(settings.history.window);
    let service = ConversationService::new(store, gateway);
    tracing::info!(
        model = %settings.llm.model,
        history_window = settings.history.window,
        "conversation service ready"
    );

    let state = AppState::new(service, &settings);
    let bind_addr = format!("0.0.0.0:{}", settings.server.port);
    run_http(state, &bind_addr).await
}
