use std::sync::Arc;

use clap::Parser;
use tracing::info;

use vo_cli::providers::provider_for;
use vo_cli::{ReplEventSource, Runtime};
use vo_core::VoConfig;
use vo_router::EventSource;

/// Multi-channel conversational agent runtime.
#[derive(Parser, Debug)]
#[command(name = "vo", version, about)]
struct Args {
    /// Path to a vo.toml config file (VO_* env vars override it).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vo=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = VoConfig::load(args.config.as_deref())?;

    // Fatal before anything starts; the error names the variable to set.
    config.ensure_agent_configured()?;
    let provider = provider_for(&config.agent_provider)?;

    info!(
        provider = %config.agent_provider,
        model = %config.agent_model,
        data_dir = %config.data_dir.display(),
        "starting vo"
    );

    let runtime = Runtime::init(config, provider)?;

    let mut sources: Vec<Arc<dyn EventSource>> = Vec::new();
    if runtime.config.auto_run {
        sources.push(Arc::new(ReplEventSource::new()));
    } else {
        info!("running headless (set VO_AUTO_RUN=1 for the interactive REPL)");
    }
    runtime.run(sources).await
}
