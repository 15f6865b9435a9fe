//! Environment-driven configuration. Every value has a default; the only
//! startup validation is that a database password is present at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DB_PASSWORD must be set (and non-empty) before the service can start")]
    MissingDatabasePassword,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Model identifier passed to the Ollama runtime
    pub model: String,
    /// Base URL of the Ollama runtime
    pub ollama_base_url: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Port the HTTP service listens on
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests inject a closure
    /// instead of mutating process environment).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_password = get("DB_PASSWORD").unwrap_or_default();
        if db_password.is_empty() {
            return Err(ConfigError::MissingDatabasePassword);
        }

        Ok(Config {
            model: get("LLM_MODEL").unwrap_or_else(|| "llama3:instruct".to_string()),
            ollama_base_url: get("OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            db_host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            db_port: parse_port(get("DB_PORT"), 5432),
            db_user: get("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            db_password,
            db_name: get("DB_NAME").unwrap_or_else(|| "attache".to_string()),
            port: parse_port(get("APP_PORT"), 8000),
        })
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }
}

fn parse_port(value: Option<String>, default: u16) -> u16 {
    value.and_then(|p| p.parse().ok()).unwrap_or(default)
}
