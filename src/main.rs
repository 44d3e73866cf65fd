//! sheet-mind server entrypoint.

use anyhow::Result;
use clap::Parser;
use sheet_mind::config::Config;
use sheet_mind::http::start_http_server;
use tracing::info;

#[derive(Parser)]
#[command(name = "sheet-mind")]
#[command(
    about = "Habla con tu Excel: preguntas en lenguaje natural sobre una hoja de cálculo",
    long_about = None
)]
struct Cli {
    /// Config file path (takes precedence over SHEET_MIND_CONFIG)
    #[arg(long)]
    config: Option<String>,

    /// Bind address, host:port
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Spreadsheet path
    #[arg(long)]
    table: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    sheet_mind::load_env();

    let mut config = Config::load_from(cli.config.as_deref()).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    if let Some(bind) = cli.bind {
        config.runtime.http_bind = bind;
    }
    if let Some(table) = cli.table {
        config.table.path = table;
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.runtime.log_level.clone())
        .with_ansi(false)
        .init();

    info!(
        "Configuration loaded: provider={} model={} table={}",
        config.agent.provider, config.agent.model, config.table.path
    );

    start_http_server(config).await?;

    Ok(())
}
