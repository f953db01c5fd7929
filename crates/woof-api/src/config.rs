//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use tracing::warn;
use woof_storage::DEFAULT_UPLOAD_DIR;
use woof_vision::VisionConfig;

/// Minimum accepted length of a configured session secret.
const MIN_SECRET_LEN: usize = 32;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second (per client IP)
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Root directory for uploaded batches
    pub upload_dir: PathBuf,
    /// HMAC key for session cookies
    pub session_secret: String,
    /// Idle time after which a session and its uploads are dropped
    pub session_ttl: Duration,
    /// How often the janitor looks for expired batches
    pub janitor_interval: Duration,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Model locations
    pub vision: VisionConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_body_size: 16 * 1024 * 1024, // 16MB
            environment: "development".to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            session_secret: random_secret(),
            session_ttl: Duration::from_secs(3600),
            janitor_interval: Duration::from_secs(60),
            metrics_enabled: true,
            vision: VisionConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let session_secret = match std::env::var("SESSION_SECRET") {
            Ok(secret) if secret.len() >= MIN_SECRET_LEN => secret,
            Ok(_) => {
                warn!(
                    "SESSION_SECRET shorter than {} bytes, using a random per-process secret",
                    MIN_SECRET_LEN
                );
                random_secret()
            }
            Err(_) => {
                warn!("SESSION_SECRET not set, sessions will not survive a restart");
                random_secret()
            }
        };

        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("API_PORT", 5000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS", 10),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 20),
            max_body_size: env_parse("MAX_BODY_SIZE", 16 * 1024 * 1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            session_secret,
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", 3600)),
            janitor_interval: Duration::from_secs(env_parse("JANITOR_INTERVAL_SECS", 60).max(1)),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            vision: VisionConfig::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_body_size, 16 * 1024 * 1024);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert!(!config.is_production());
    }

    #[test]
    fn test_random_secrets_differ() {
        let a = random_secret();
        assert!(a.len() >= MIN_SECRET_LEN);
        assert_ne!(a, random_secret());
    }
}
