use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

/// Trilha Sonora - reading soundtrack analysis service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// API key required on /v1 routes (open when unset)
    #[arg(short = 'k', long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// Base URL of the Ollama server
    #[arg(short = 'u', long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Model used for environment classification
    #[arg(short = 'm', long, env = "OLLAMA_MODEL", default_value = "deepseek-r1:1.5b")]
    pub model: String,

    /// Model used for emotion scoring (defaults to --model)
    #[arg(long, env = "EMOTION_MODEL")]
    pub emotion_model: Option<String>,

    /// Minimum confidence for an environment to be reported
    #[arg(long, env = "MIN_CONFIDENCE", default_value = "0.3")]
    pub min_confidence: f64,

    /// Minimum score for an emotion to be kept
    #[arg(long, env = "EMOTION_THRESHOLD", default_value = "0.1")]
    pub emotion_threshold: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// HTTP max retries
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "2")]
    pub http_retries: u32,

    /// Maximum model calls in flight for batch and chapter analysis
    #[arg(long, env = "MAX_CONCURRENT_REQUESTS", default_value = "4")]
    pub max_concurrent: usize,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Authentication
    pub api_key: Option<String>,

    // Ollama
    pub ollama_url: String,
    pub ollama_model: String,
    pub emotion_model: String,
    pub generation: GenerationOptions,

    // Analysis
    pub min_confidence: f64,
    pub emotion_threshold: f64,
    pub pages_per_chunk: usize,
    pub words_per_chunk: usize,
    pub max_concurrent_requests: usize,
    pub model_cache_ttl: u64,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub http_max_retries: u32,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,

    // Third-party services
    pub integrations: IntegrationCredentials,
}

/// Sampling options sent with every generate call
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 150,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Credentials for the soundtrack stack's external services.
///
/// These are loaded so deployments can share one `.env`; nothing in this
/// service calls the services themselves.
#[derive(Clone, Debug, Default)]
pub struct IntegrationCredentials {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub analytics_key: Option<String>,
}

/// Which integrations have credentials configured
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct IntegrationStatus {
    pub database: bool,
    pub cache: bool,
    pub spotify: bool,
    pub object_storage: bool,
    pub analytics: bool,
}

impl IntegrationCredentials {
    pub fn from_env() -> Self {
        Self {
            database_url: non_empty_env("DATABASE_URL"),
            redis_url: non_empty_env("REDIS_URL"),
            spotify_client_id: non_empty_env("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_env("SPOTIFY_CLIENT_SECRET"),
            s3_access_key: non_empty_env("S3_ACCESS_KEY"),
            s3_secret_key: non_empty_env("S3_SECRET_KEY"),
            analytics_key: non_empty_env("ANALYTICS_KEY"),
        }
    }

    /// Spotify and object storage need both halves of their key pair
    pub fn status(&self) -> IntegrationStatus {
        IntegrationStatus {
            database: self.database_url.is_some(),
            cache: self.redis_url.is_some(),
            spotify: self.spotify_client_id.is_some() && self.spotify_client_secret.is_some(),
            object_storage: self.s3_access_key.is_some() && self.s3_secret_key.is_some(),
            analytics: self.analytics_key.is_some(),
        }
    }
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let emotion_model = args
            .emotion_model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| args.model.clone());

        let defaults = GenerationOptions::default();

        let config = Config {
            server_host: args.host,
            server_port: args.port,

            api_key: args.api_key.filter(|k| !k.is_empty()),

            ollama_url: args.ollama_url.trim_end_matches('/').to_string(),
            ollama_model: args.model,
            emotion_model,
            generation: GenerationOptions {
                temperature: env_or("TEMPERATURE", defaults.temperature)?,
                top_p: env_or("TOP_P", defaults.top_p)?,
                num_predict: env_or("NUM_PREDICT", defaults.num_predict)?,
            },

            min_confidence: args.min_confidence,
            emotion_threshold: args.emotion_threshold,
            pages_per_chunk: env_or("PAGES_PER_CHUNK", 3)?,
            words_per_chunk: env_or("WORDS_PER_CHUNK", 500)?,
            max_concurrent_requests: args.max_concurrent,
            model_cache_ttl: env_or("MODEL_CACHE_TTL", 60)?,

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", 20)?,
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", 10)?,
            http_request_timeout: args.http_timeout,
            http_max_retries: args.http_retries,

            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),

            integrations: IntegrationCredentials::from_env(),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.ollama_url)
            .with_context(|| format!("OLLAMA_URL is not a valid URL: {}", self.ollama_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("OLLAMA_URL must use http or https: {}", self.ollama_url);
        }

        if self.ollama_model.trim().is_empty() {
            anyhow::bail!("OLLAMA_MODEL cannot be empty");
        }

        check_unit_interval("MIN_CONFIDENCE", self.min_confidence)?;
        check_unit_interval("EMOTION_THRESHOLD", self.emotion_threshold)?;
        check_unit_interval("TOP_P", self.generation.top_p)?;

        if self.pages_per_chunk == 0 {
            anyhow::bail!("PAGES_PER_CHUNK must be greater than zero");
        }
        if self.words_per_chunk == 0 {
            anyhow::bail!("WORDS_PER_CHUNK must be greater than zero");
        }
        if self.max_concurrent_requests == 0 {
            anyhow::bail!("MAX_CONCURRENT_REQUESTS must be greater than zero");
        }

        Ok(())
    }

    /// Configuration suitable for tests: local Ollama, no auth
    pub fn for_testing(ollama_url: &str) -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            api_key: None,
            ollama_url: ollama_url.trim_end_matches('/').to_string(),
            ollama_model: "deepseek-r1:1.5b".to_string(),
            emotion_model: "deepseek-r1:1.5b".to_string(),
            generation: GenerationOptions::default(),
            min_confidence: 0.3,
            emotion_threshold: 0.1,
            pages_per_chunk: 3,
            words_per_chunk: 500,
            max_concurrent_requests: 4,
            model_cache_ttl: 60,
            http_max_connections: 4,
            http_connect_timeout: 5,
            http_request_timeout: 10,
            http_max_retries: 0,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            integrations: IntegrationCredentials::default(),
        }
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
    }
    Ok(())
}

/// Parse an optional env var; unset or blank means `default`, garbage is an error
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
