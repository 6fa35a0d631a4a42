use std::env;

use dotenvy::dotenv;

use crate::error::{AppError, AppResult};

/// Runtime configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub port: u16,
    pub redis_url: String,
    pub cors_origin: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable has a development default; a variable that is set but
    /// unparseable is a hard error rather than a silent fallback.
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT is not a valid port: {raw}")))?,
            Err(_) => 4000,
        };

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let cors_origin =
            env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            app_env,
            port,
            redis_url,
            cors_origin,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            app_env: "test".to_string(),
            port: 4000,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}
