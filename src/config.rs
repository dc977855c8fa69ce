// Application configuration: environment variables over static defaults

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::detector::remote::{RemoteSettings, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};

pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

const DEFAULT_MAX_UPLOAD_MB: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct AppConfig {
    /// None: no remote configured (synthetic-only). Some(""): configured but unusable.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,

    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
    pub test_images_dir: PathBuf,

    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub allowed_extensions: Vec<String>,
    pub max_upload_bytes: usize,

    pub proxy: Option<String>,
    pub insecure_tls: bool,
    /// None disables the simulated delay
    pub synthetic_latency: Option<(Duration, Duration)>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base_dir = PathBuf::from(".");
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1500,
            temperature: 0.1,
            upload_dir: base_dir.join("uploads"),
            results_dir: base_dir.join("results"),
            test_images_dir: base_dir.join("tests"),
            host: "127.0.0.1".to_string(),
            port: 5000,
            debug: false,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            proxy: None,
            insecure_tls: false,
            synthetic_latency: Some((Duration::from_secs(1), Duration::from_secs(2))),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = lookup("QWEN_API_KEY");
        if let Some(url) = non_empty(lookup("QWEN_BASE_URL")) {
            config.base_url = url;
        }
        if let Some(model) = non_empty(lookup("QWEN_MODEL")) {
            config.model = model;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "QWEN_TIMEOUT")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(tokens) = parse_var(&lookup, "QWEN_MAX_TOKENS")? {
            config.max_tokens = tokens;
        }
        if let Some(temperature) = parse_var(&lookup, "QWEN_TEMPERATURE")? {
            config.temperature = temperature;
        }

        if let Some(base_dir) = non_empty(lookup("FIELD_PATROL_BASE_DIR")) {
            config = config.with_base_dir(base_dir);
        }
        if let Some(host) = non_empty(lookup("FIELD_PATROL_HOST")) {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "FIELD_PATROL_PORT")? {
            config.port = port;
        }
        if let Some(debug) = parse_flag(&lookup, "FIELD_PATROL_DEBUG")? {
            config.debug = debug;
        }
        if let Some(mb) = parse_var::<usize>(&lookup, "FIELD_PATROL_MAX_UPLOAD_MB")? {
            config.max_upload_bytes =
                mb.checked_mul(1024 * 1024)
                    .ok_or_else(|| ConfigError::Invalid {
                        key: "FIELD_PATROL_MAX_UPLOAD_MB",
                        value: mb.to_string(),
                        reason: "too large".to_string(),
                    })?;
        }

        config.proxy = non_empty(lookup("FIELD_PATROL_PROXY"));
        if let Some(insecure) = parse_flag(&lookup, "FIELD_PATROL_INSECURE_TLS")? {
            config.insecure_tls = insecure;
        }
        if parse_flag(&lookup, "FIELD_PATROL_SYNTHETIC_LATENCY")? == Some(false) {
            config.synthetic_latency = None;
        }

        Ok(config)
    }

    /// Put uploads/, results/ and tests/ below `base_dir`
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        self.upload_dir = base_dir.join("uploads");
        self.results_dir = base_dir.join("results");
        self.test_images_dir = base_dir.join("tests");
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn without_synthetic_latency(mut self) -> Self {
        self.synthetic_latency = None;
        self
    }

    /// Remote settings, or None when no credential was supplied
    pub fn remote_settings(&self) -> Option<RemoteSettings> {
        let api_key = self.api_key.clone()?;
        Some(
            RemoteSettings::new(api_key)
                .with_base_url(self.base_url.clone())
                .with_model(self.model.clone())
                .with_timeout(self.timeout)
                .with_limits(self.max_tokens, self.temperature)
                .with_proxy(self.proxy.clone())
                .with_insecure_tls(self.insecure_tls),
        )
    }

    pub fn init_directories(&self) -> std::io::Result<()> {
        for dir in [&self.upload_dir, &self.results_dir, &self.test_images_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Extension check, case-insensitive; names without an extension are rejected
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = format!(".{}", ext.to_lowercase());
                self.allowed_extensions.iter().any(|a| *a == ext)
            }
            None => false,
        }
    }
}

// Keep the key out of logs
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("model", &self.model)
            .field("upload_dir", &self.upload_dir)
            .field("results_dir", &self.results_dir)
            .field("test_images_dir", &self.test_images_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("debug", &self.debug)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("proxy", &self.proxy)
            .field("insecure_tls", &self.insecure_tls)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match non_empty(lookup(key)) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.port, 5000);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert!(!config.insecure_tls);
        assert!(config.synthetic_latency.is_some());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("QWEN_API_KEY", "sk-1"),
            ("QWEN_TIMEOUT", "12"),
            ("FIELD_PATROL_PORT", "8088"),
            ("FIELD_PATROL_BASE_DIR", "/srv/patrol"),
            ("FIELD_PATROL_INSECURE_TLS", "yes"),
            ("FIELD_PATROL_SYNTHETIC_LATENCY", "off"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-1"));
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.port, 8088);
        assert_eq!(config.results_dir, PathBuf::from("/srv/patrol/results"));
        assert!(config.insecure_tls);
        assert!(config.synthetic_latency.is_none());
    }

    #[test]
    fn test_empty_key_is_still_configured() {
        let config = AppConfig::from_lookup(lookup(&[("QWEN_API_KEY", "")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some(""));
    }

    #[test]
    fn test_invalid_values_fail_clearly() {
        let err = AppConfig::from_lookup(lookup(&[("FIELD_PATROL_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FIELD_PATROL_PORT", .. }));

        let err = AppConfig::from_lookup(lookup(&[("FIELD_PATROL_DEBUG", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("FIELD_PATROL_DEBUG"));
    }

    #[test]
    fn test_upload_limit_overflow_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(
            "FIELD_PATROL_MAX_UPLOAD_MB",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "FIELD_PATROL_MAX_UPLOAD_MB", .. }
        ));

        let config =
            AppConfig::from_lookup(lookup(&[("FIELD_PATROL_MAX_UPLOAD_MB", "2")])).unwrap();
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_remote_settings_follow_key() {
        assert!(AppConfig::default().remote_settings().is_none());

        let config = AppConfig::default()
            .with_api_key(Some("sk-1".to_string()))
            .with_base_url("http://127.0.0.1:9/v1");
        let settings = config.remote_settings().unwrap();
        assert_eq!(settings.api_key, "sk-1");
        assert_eq!(settings.endpoint(), "http://127.0.0.1:9/v1/chat/completions");
    }

    #[test]
    fn test_allowed_file() {
        let config = AppConfig::default();
        assert!(config.is_allowed_file("leaf.JPG"));
        assert!(config.is_allowed_file("a.b.png"));
        assert!(!config.is_allowed_file("notes.txt"));
        assert!(!config.is_allowed_file("jpg"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AppConfig::default().with_api_key(Some("sk-secret".to_string()));
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
