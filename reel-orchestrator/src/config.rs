//! Orchestrator configuration
//!
//! Defines every tunable of the orchestrator: storage, the render service,
//! code-generation providers, retry policy and the artifact URL signer.

use std::time::Duration;

use reel_core::domain::render::Backend;

use crate::storage::S3Settings;

/// Longest lifetime S3 accepts for a presigned URL
const MAX_URL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL URL. `None` runs on the in-memory job store.
    pub database_url: Option<String>,

    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Render service base URL (e.g., "http://localhost:8000")
    pub render_service_url: String,

    /// Shared secret expected in `X-Webhook-Key` on completion callbacks
    pub webhook_api_key: Option<String>,

    /// Browser origins allowed to call the API
    pub allowed_origins: Vec<String>,

    /// Backend used when the caller does not pick one
    pub preferred_backend: Backend,

    /// Backend used for every retry attempt
    pub retry_backend: Backend,

    /// Retries granted to each new job
    pub initial_retry_budget: i32,

    /// Maximum generation/dispatch attempts running at once
    pub max_concurrent_attempts: usize,

    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,

    /// Longest a single code-generation call may take
    pub generation_timeout: Duration,

    pub artifacts: ArtifactConfig,

    /// Jobs whose render has not reported back after this long are failed
    /// by the sweeper. `None` disables the sweeper.
    pub processing_timeout: Option<Duration>,

    /// How often the sweeper looks for stale jobs
    pub sweep_interval: Duration,
}

/// Credentials and endpoint of one code-generation provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Artifact bucket and settings for minting download URLs
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub bucket: String,
    pub region: String,

    /// S3-compatible endpoint (e.g., MinIO at "http://localhost:9000")
    pub endpoint_url: Option<String>,

    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Lifetime of a presigned download URL
    pub url_ttl: Duration,
}

impl ArtifactConfig {
    /// Presigner settings; `None` until both credentials are set
    pub fn s3_settings(&self) -> Option<S3Settings> {
        Some(S3Settings {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            access_key_id: self.access_key_id.clone()?,
            secret_access_key: self.secret_access_key.clone()?,
        })
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Most variables fall back to `Default`; the artifact store
    /// credentials have no fallback and are checked by `validate`.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let preferred_backend = match env_string("PREFERRED_BACKEND") {
            Some(s) => s
                .parse::<Backend>()
                .map_err(|e| anyhow::anyhow!("PREFERRED_BACKEND: {}", e))?,
            None => defaults.preferred_backend,
        };

        let retry_backend = match env_string("RETRY_BACKEND") {
            Some(s) => s
                .parse::<Backend>()
                .map_err(|e| anyhow::anyhow!("RETRY_BACKEND: {}", e))?,
            None => defaults.retry_backend,
        };

        Ok(Self {
            database_url: env_string("DATABASE_URL"),
            bind_addr: env_string("ORCHESTRATOR_BIND_ADDR").unwrap_or(defaults.bind_addr),
            render_service_url: env_string("RENDER_SERVICE_URL")
                .unwrap_or(defaults.render_service_url),
            webhook_api_key: env_string("WEBHOOK_API_KEY"),
            allowed_origins: env_string("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.allowed_origins),
            preferred_backend,
            retry_backend,
            initial_retry_budget: env_parse("INITIAL_RETRY_BUDGET")
                .unwrap_or(defaults.initial_retry_budget),
            max_concurrent_attempts: env_parse("MAX_CONCURRENT_ATTEMPTS")
                .unwrap_or(defaults.max_concurrent_attempts),
            openai: ProviderConfig {
                api_key: env_string("OPENAI_API_KEY"),
                model: env_string("OPENAI_MODEL").unwrap_or(defaults.openai.model),
                base_url: env_string("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
            },
            gemini: ProviderConfig {
                api_key: env_string("GEMINI_API_KEY"),
                model: env_string("GEMINI_MODEL").unwrap_or(defaults.gemini.model),
                base_url: env_string("GEMINI_BASE_URL").unwrap_or(defaults.gemini.base_url),
            },
            generation_timeout: env_parse::<u64>("GENERATION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.generation_timeout),
            artifacts: ArtifactConfig {
                bucket: env_string("S3_BUCKET_NAME").unwrap_or(defaults.artifacts.bucket),
                region: env_string("AWS_REGION").unwrap_or(defaults.artifacts.region),
                endpoint_url: env_string("S3_ENDPOINT_URL"),
                access_key_id: env_string("AWS_ACCESS_KEY_ID"),
                secret_access_key: env_string("AWS_SECRET_ACCESS_KEY"),
                url_ttl: env_parse::<u64>("DOWNLOAD_URL_TTL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.artifacts.url_ttl),
            },
            processing_timeout: env_parse::<u64>("PROCESSING_TIMEOUT_SECS")
                .map(Duration::from_secs),
            sweep_interval: env_parse::<u64>("SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if !is_http_url(&self.render_service_url) {
            anyhow::bail!("render_service_url must start with http:// or https://");
        }

        if self.artifacts.s3_settings().is_none() {
            anyhow::bail!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required to sign download URLs"
            );
        }

        if self.artifacts.bucket.is_empty() {
            anyhow::bail!("artifact bucket cannot be empty");
        }

        if let Some(endpoint) = &self.artifacts.endpoint_url {
            if !is_http_url(endpoint) {
                anyhow::bail!("S3 endpoint {} must start with http:// or https://", endpoint);
            }
        }

        if let Some(origin) = self.allowed_origins.iter().find(|o| !is_http_url(o)) {
            anyhow::bail!("allowed origin {} must start with http:// or https://", origin);
        }

        if self.initial_retry_budget < 1 {
            anyhow::bail!("initial_retry_budget must be at least 1");
        }

        if self.max_concurrent_attempts == 0 {
            anyhow::bail!("max_concurrent_attempts must be greater than 0");
        }

        if self.artifacts.url_ttl.as_secs() == 0 || self.artifacts.url_ttl > MAX_URL_TTL {
            anyhow::bail!("download url ttl must be between 1 second and 7 days");
        }

        if self.generation_timeout.is_zero() {
            anyhow::bail!("generation_timeout must be greater than 0");
        }

        if let Some(timeout) = self.processing_timeout {
            if timeout.as_secs() == 0 {
                anyhow::bail!("processing_timeout must be greater than 0");
            }
            if self.sweep_interval.as_secs() == 0 {
                anyhow::bail!("sweep_interval must be greater than 0");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:3000".to_string(),
            render_service_url: "http://localhost:8000".to_string(),
            webhook_api_key: None,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
            ],
            preferred_backend: Backend::Gemini,
            retry_backend: Backend::OpenAi,
            initial_retry_budget: 3,
            max_concurrent_attempts: 8,
            openai: ProviderConfig {
                api_key: None,
                model: "gpt-4.1-mini-2025-04-14".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            },
            gemini: ProviderConfig {
                api_key: None,
                model: "gemini-2.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
            },
            generation_timeout: Duration::from_secs(120),
            artifacts: ArtifactConfig {
                bucket: "videos".to_string(),
                region: "us-east-1".to_string(),
                endpoint_url: None,
                access_key_id: None,
                secret_access_key: None,
                url_ttl: Duration::from_secs(3600),
            },
            processing_timeout: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|s| s.parse::<T>().ok())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.artifacts.access_key_id = Some("minioadmin".to_string());
        config.artifacts.secret_access_key = Some("minioadmin".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.preferred_backend, Backend::Gemini);
        assert_eq!(config.retry_backend, Backend::OpenAi);
        assert_eq!(config.initial_retry_budget, 3);
        assert_eq!(config.generation_timeout, Duration::from_secs(120));
        assert!(config.processing_timeout.is_none());
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_signing_credentials_are_required() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.artifacts.access_key_id = Some("minioadmin".to_string());
        assert!(config.validate().is_err());
        assert!(config.artifacts.s3_settings().is_none());

        config.artifacts.secret_access_key = Some("minioadmin".to_string());
        assert!(config.validate().is_ok());

        let settings = config.artifacts.s3_settings().unwrap();
        assert_eq!(settings.bucket, "videos");
        assert_eq!(settings.region, "us-east-1");
        assert!(settings.endpoint_url.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = configured();

        config.render_service_url = "localhost:8000".to_string();
        assert!(config.validate().is_err());
        config.render_service_url = "http://render:8000".to_string();
        assert!(config.validate().is_ok());

        config.allowed_origins.push("*".to_string());
        assert!(config.validate().is_err());
        config.allowed_origins.pop();

        config.artifacts.endpoint_url = Some("minio:9000".to_string());
        assert!(config.validate().is_err());
        config.artifacts.endpoint_url = Some("http://minio:9000".to_string());
        assert!(config.validate().is_ok());

        config.artifacts.url_ttl = Duration::from_secs(8 * 24 * 3600);
        assert!(config.validate().is_err());
        config.artifacts.url_ttl = MAX_URL_TTL;
        assert!(config.validate().is_ok());

        config.generation_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.generation_timeout = Duration::from_secs(30);

        config.initial_retry_budget = 0;
        assert!(config.validate().is_err());
        config.initial_retry_budget = 1;

        config.max_concurrent_attempts = 0;
        assert!(config.validate().is_err());
        config.max_concurrent_attempts = 1;

        config.processing_timeout = Some(Duration::from_secs(0));
        assert!(config.validate().is_err());
        config.processing_timeout = Some(Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }
}
