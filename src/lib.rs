pub mod agent;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod prompt;
pub mod sessions;
pub mod table;

/// Load .env if present, silently ignoring a missing file.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}
