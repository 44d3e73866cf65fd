use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration structure loaded from sheet_mind.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub table: TableConfig,
    pub agent: AgentConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Where the spreadsheet lives and how much of it is shown or shipped
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TableConfig {
    /// Fixed relative path to the spreadsheet file
    pub path: String,
    /// Worksheet name override; defaults to the first sheet
    pub sheet: Option<String>,
    /// Data rows shown in the preview panel
    pub preview_rows: usize,
    /// Cap on the delimited table text handed to the agent
    pub max_prompt_bytes: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            path: "Empleados.arff.csv.xlsx".to_string(),
            sheet: None,
            preview_rows: 10,
            max_prompt_bytes: 200_000,
        }
    }
}

/// Reasoning style requested from the external agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStyle {
    /// Single-shot answer from one exchange
    ToolCalling,
    /// Iterative Thought/Action/Observation transcript, still one exchange from our side
    React,
}

impl std::str::FromStr for AgentStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tool-calling" | "tool_calling" | "toolcalling" => Ok(AgentStyle::ToolCalling),
            "react" | "reason-act" => Ok(AgentStyle::React),
            other => Err(format!("unknown agent style '{}'", other)),
        }
    }
}

/// Model identity and behavior knobs for the query agent
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// "groq" for the live API, "scripted" for the deterministic test agent
    pub provider: String,
    pub model: String,
    /// Low temperature keeps numeric answers stable
    pub temperature: f32,
    /// OpenAI-compatible API root
    pub base_url: String,
    pub style: AgentStyle,
    /// Reasoning/re-ask budget before the agent gives up
    pub max_iterations: u32,
    /// Tolerate malformed agent output and re-ask within the iteration budget
    pub handle_parsing_errors: bool,
    /// The agent runs arbitrary generated operations against the table;
    /// construction refuses unless this is explicitly set
    pub allow_dangerous_code: bool,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.1,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            style: AgentStyle::ToolCalling,
            max_iterations: 15,
            handle_parsing_errors: true,
            allow_dangerous_code: true,
            timeout_ms: 120_000,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Fallback credential when a session has not supplied one
    pub groq_api_key: Option<String>,
    pub http_bind: SocketAddr,
    pub log_level: String,
    pub session_ttl_secs: u64,
    pub agent_cache_max: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            http_bind: "127.0.0.1:8787"
                .parse()
                .expect("default bind address should parse"),
            log_level: "sheet_mind=info".to_string(),
            session_ttl_secs: 86_400,
            agent_cache_max: 64,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        let defaults = Self::default();
        Self {
            groq_api_key: std::env::var("GROQ_API_KEY").ok(),
            http_bind: std::env::var("SHEET_HTTP_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_bind),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "sheet_mind=info".to_string()),
            session_ttl_secs: std::env::var("SHEET_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            agent_cache_max: std::env::var("SHEET_AGENT_CACHE_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0)
                .unwrap_or(64),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            agent: AgentConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses SHEET_MIND_CONFIG environment variable or defaults to "sheet_mind.toml".
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Same as [`Config::load`], with an explicit config file path taking
    /// precedence over SHEET_MIND_CONFIG.
    pub fn load_from(path_override: Option<&str>) -> anyhow::Result<Self> {
        // Load environment variables with smart fallbacks:
        // 1) SHEET_ENV_FILE if set
        // 2) ./.env
        // 3) ../.env (repo root when running from a subdirectory)
        if let Ok(env_path) = std::env::var("SHEET_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
            let core_present =
                std::env::var("GROQ_API_KEY").is_ok() || std::env::var("SHEET_TABLE_PATH").is_ok();
            if !core_present {
                let _ = dotenvy::from_path("../.env");
            }
        }

        let config_path = match path_override {
            Some(p) => p.to_string(),
            None => std::env::var("SHEET_MIND_CONFIG")
                .unwrap_or_else(|_| "sheet_mind.toml".to_string()),
        };

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        // Apply env overrides (env-first)
        if let Ok(path) = std::env::var("SHEET_TABLE_PATH") {
            config.table.path = path;
        }
        if let Ok(sheet) = std::env::var("SHEET_TABLE_SHEET") {
            config.table.sheet = Some(sheet);
        }
        if let Ok(provider) = std::env::var("SHEET_AGENT_PROVIDER") {
            config.agent.provider = provider;
        }
        if let Ok(model) = std::env::var("SHEET_MODEL") {
            config.agent.model = model;
        }
        if let Ok(base_url) = std::env::var("SHEET_BASE_URL") {
            config.agent.base_url = base_url;
        }
        if let Some(temp) = std::env::var("SHEET_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
        {
            config.agent.temperature = temp;
        }
        if let Ok(style) = std::env::var("SHEET_AGENT_STYLE") {
            match style.parse() {
                Ok(parsed) => config.agent.style = parsed,
                Err(e) => tracing::warn!("SHEET_AGENT_STYLE ignored: {}", e),
            }
        }
        if let Some(iters) = std::env::var("SHEET_MAX_ITERATIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.agent.max_iterations = iters;
        }
        if let Ok(tolerate) = std::env::var("SHEET_HANDLE_PARSING_ERRORS") {
            config.agent.handle_parsing_errors =
                tolerate == "1" || tolerate.eq_ignore_ascii_case("true");
        }
        if let Ok(allow) = std::env::var("SHEET_ALLOW_DANGEROUS_CODE") {
            config.agent.allow_dangerous_code = allow == "1" || allow.eq_ignore_ascii_case("true");
        }

        config.runtime = RuntimeConfig::load_from_env();

        // Validate and clamp
        if !(0.0..=2.0).contains(&config.agent.temperature) {
            tracing::warn!(
                "temperature {} outside [0.0, 2.0], clamping",
                config.agent.temperature
            );
            config.agent.temperature = config.agent.temperature.clamp(0.0, 2.0);
        }
        if config.agent.max_iterations == 0 {
            config.agent.max_iterations = 1;
        }
        if config.agent.max_retries > 10 {
            tracing::warn!(
                "max_retries {} exceeds max 10, clamping to 10",
                config.agent.max_retries
            );
            config.agent.max_retries = 10;
        }
        if config.table.preview_rows == 0 {
            config.table.preview_rows = 1;
        }
        let max_ttl_secs = (i64::MAX / 1_000) as u64;
        if config.runtime.session_ttl_secs > max_ttl_secs {
            tracing::warn!(
                "session_ttl_secs {} exceeds the supported range, clamping",
                config.runtime.session_ttl_secs
            );
            config.runtime.session_ttl_secs = max_ttl_secs;
        }
        match config.agent.provider.as_str() {
            "groq" | "scripted" => {}
            other => tracing::warn!("Unknown agent provider '{}', expected groq|scripted", other),
        }

        Ok(config)
    }
}
