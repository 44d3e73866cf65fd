//! Generates marketing copy from a templated brief through the same LLM
//! client the server uses, at a creative temperature.
//!
//! Usage:
//!   cargo run --bin copywriter -- --producto "bono trimestral del gimnasio" \
//!     --publico "deportistas amateur" --beneficios "sin permanencia, clases incluidas"

use anyhow::{Result, anyhow};
use clap::Parser;
use sheet_mind::agent::{ChatMessage, LlmClient};
use sheet_mind::config::Config;
use sheet_mind::credential::ApiKey;
use sheet_mind::prompt;

#[derive(Parser)]
#[command(name = "copywriter")]
#[command(about = "Genera un copy de marketing con el modelo configurado", long_about = None)]
struct Cli {
    /// Qué se anuncia
    #[arg(long)]
    producto: String,

    /// A quién va dirigido
    #[arg(long)]
    publico: String,

    /// Tono del texto
    #[arg(long, default_value = "cercano y motivador")]
    tono: String,

    /// Beneficios a destacar, separados por comas
    #[arg(long)]
    beneficios: String,

    /// Modelo alternativo al configurado
    #[arg(long)]
    model: Option<String>,

    /// Temperatura de muestreo para el copy
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    sheet_mind::load_env();

    let config = Config::load()?;
    let mut agent_cfg = config.agent.clone();
    if let Some(model) = cli.model {
        agent_cfg.model = model;
    }
    agent_cfg.temperature = cli.temperature;

    let api_key = config
        .runtime
        .groq_api_key
        .as_deref()
        .and_then(ApiKey::new)
        .ok_or_else(|| anyhow!("GROQ_API_KEY no está definida"))?;

    let brief = prompt::render(
        prompt::MARKETING_COPY,
        &[
            ("producto", cli.producto.as_str()),
            ("publico", cli.publico.as_str()),
            ("tono", cli.tono.as_str()),
            ("beneficios", cli.beneficios.as_str()),
        ],
    );

    let client = LlmClient::new(&agent_cfg, api_key)?;
    let copy = client.chat(&[ChatMessage::user(brief)], false).await?;

    println!("{}", copy.trim());
    Ok(())
}
