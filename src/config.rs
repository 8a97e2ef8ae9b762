use crate::engine::ProbabilityPolicy;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Whether a stage change overwrites a manually-set probability.
    pub probability_policy: ProbabilityPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let probability_policy = {
            let raw = env_map
                .get("PROBABILITY_POLICY")
                .map(|s| s.as_str())
                .unwrap_or("overwrite");
            ProbabilityPolicy::from_wire(raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PROBABILITY_POLICY".to_string(),
                    format!("must be overwrite or preserve, got {}", raw),
                )
            })?
        };

        Ok(Config {
            port,
            database_path,
            probability_policy,
        })
    }
}
