//! Binary entry point: loads configuration and serves the HTTP surface
//! over the in-process demo agent deployment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use orchestrator::{demo_state, router};
use provider_adapter::adapters::{AnthropicAdapter, BedrockAdapter};
use provider_adapter::ProviderAdapter;

fn parse_config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(value));
        }
    }
    None
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        config::LogFormat::Json => builder.json().init(),
        config::LogFormat::Pretty => builder.pretty().init(),
        config::LogFormat::Compact => builder.compact().init(),
    }
}

/// Adds Anthropic and Bedrock adapters when their credentials are
/// present in the environment; the binary otherwise runs on the
/// network-free echo adapter alone.
fn env_providers() -> Vec<Arc<dyn ProviderAdapter>> {
    let mut providers: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        let model = std::env::var("ANTHROPIC_DEFAULT_MODEL")
            .unwrap_or_else(|_| "claude-3-5-sonnet-latest".to_string());
        providers.push(Arc::new(AnthropicAdapter::new(key, model)));
    }

    if let (Ok(url), Ok(token)) =
        (std::env::var("BEDROCK_RUNTIME_URL"), std::env::var("BEDROCK_BEARER_TOKEN"))
    {
        let model = std::env::var("BEDROCK_DEFAULT_MODEL_ID")
            .unwrap_or_else(|_| "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string());
        providers.push(Arc::new(BedrockAdapter::new(url, token, model)));
    }

    providers
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = parse_config_path();
    let app_config = config::load(config_path.as_deref())?;
    init_tracing(&app_config.logging);

    let addr: SocketAddr = format!("{}:{}", app_config.server.host, app_config.server.port).parse()?;
    let state = demo_state(app_config, env_providers());

    tracing::info!(%addr, "agent router listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
