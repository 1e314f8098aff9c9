//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use excuse_core::{GenerationSettings, Language};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: Option<String>,
    pub openai_api_key: Option<SecretString>,
    pub openai_api_base: String,
    pub excuse_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub max_excuse_chars: usize,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_languages: Vec<Language>,
    pub audio_dir: PathBuf,
    pub proof_dir: PathBuf,
    pub templates_path: Option<PathBuf>,
    pub scoring_policy_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = var("DATABASE_URL", "sqlite://excuse_generator.db?mode=rwc");

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = optional("CORS_ORIGIN");
        if let Some(origin) = &cors_origin {
            axum::http::HeaderValue::from_str(origin).map_err(|_| {
                ConfigError::InvalidValue(
                    "CORS_ORIGIN".to_string(),
                    format!("'{}' is not a valid origin header", origin),
                )
            })?;
        }

        // --- Load API Keys (as optional) ---
        let openai_api_key = optional("OPENAI_API_KEY").map(SecretString::from);
        let openai_api_base = var("OPENAI_API_BASE", "https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();

        // --- Load Generation Settings ---
        let excuse_model = var("EXCUSE_MODEL", "gpt-4o-mini");
        let max_tokens = parse_var("MAX_TOKENS", &var("MAX_TOKENS", "150"))?;
        let temperature: f32 = parse_var("TEMPERATURE", &var("TEMPERATURE", "0.8"))?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", temperature),
            ));
        }
        let timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", &var("REQUEST_TIMEOUT_SECS", "30"))?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let max_excuse_chars: usize = parse_var("MAX_EXCUSE_CHARS", &var("MAX_EXCUSE_CHARS", "600"))?;
        if max_excuse_chars == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_EXCUSE_CHARS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Load Speech Settings ---
        let tts_model = var("TTS_MODEL", "tts-1-hd");
        let tts_voice = var("TTS_VOICE", "alloy");
        let tts_languages = var("TTS_LANGUAGES", "en,es,fr,de")
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(|code| {
                code.parse::<Language>()
                    .map_err(|e| ConfigError::InvalidValue("TTS_LANGUAGES".to_string(), e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // --- Load Filesystem Locations ---
        let audio_dir = PathBuf::from(var("AUDIO_DIR", "static/audio"));
        let proof_dir = PathBuf::from(var("PROOF_DIR", "static/proofs"));
        let templates_path = optional("TEMPLATES_PATH").map(PathBuf::from);
        let scoring_policy_path = optional("SCORING_POLICY_PATH").map(PathBuf::from);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            openai_api_key,
            openai_api_base,
            excuse_model,
            max_tokens,
            temperature,
            request_timeout: Duration::from_secs(timeout_secs),
            max_excuse_chars,
            tts_model,
            tts_voice,
            tts_languages,
            audio_dir,
            proof_dir,
            templates_path,
            scoring_policy_path,
        })
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            max_chars: self.max_excuse_chars,
            timeout: self.request_timeout,
        }
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.database_url, "sqlite://excuse_generator.db?mode=rwc");
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.max_tokens, 150);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.tts_languages, Language::ALL.to_vec());
        assert_eq!(config.audio_dir, PathBuf::from("static/audio"));
        assert!(config.templates_path.is_none());
    }

    #[test]
    fn values_are_read_from_the_source() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE", "http://localhost:9999/v1/"),
            ("TTS_LANGUAGES", "en, fr"),
            ("MAX_EXCUSE_CHARS", "280"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.openai_api_key.as_ref().unwrap().expose_secret(), "sk-test");
        assert_eq!(config.openai_api_base, "http://localhost:9999/v1");
        assert_eq!(config.tts_languages, vec![Language::English, Language::French]);
        assert_eq!(config.generation_settings().max_chars, 280);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = load(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (key, value) in [
            ("BIND_ADDRESS", "not-an-address"),
            ("MAX_TOKENS", "many"),
            ("TEMPERATURE", "7.5"),
            ("REQUEST_TIMEOUT_SECS", "0"),
            ("MAX_EXCUSE_CHARS", "0"),
            ("TTS_LANGUAGES", "en,xx"),
            ("RUST_LOG", "loud"),
            ("CORS_ORIGIN", "http://bad\norigin"),
        ] {
            match load(&[(key, value)]) {
                Err(ConfigError::InvalidValue(name, _)) => assert_eq!(name, key),
                other => panic!("expected InvalidValue for {key}, got {other:?}"),
            }
        }
    }
}
