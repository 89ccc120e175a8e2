//! Configuration system (layered: defaults < TOML file < env < CLI flags).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::engine::Device;
use crate::error::{Result, VoxError};
use crate::util::retry::RetryPolicy;

const CONFIG_FILE_NAME: &str = "voxrelay.toml";
const ENV_PREFIX: &str = "VOXRELAY_";

static LANGUAGE_CODE: OnceLock<Regex> = OnceLock::new();

fn language_code_pattern() -> &'static Regex {
    LANGUAGE_CODE.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2,4})?$").expect("language pattern is valid")
    })
}

/// Service configuration shared by the HTTP front door, the inbox worker and
/// the one-shot CLI.
///
/// Resolution order (later wins):
/// 1. Built-in defaults
/// 2. TOML file (`--config`, or `voxrelay.toml` in the platform config dir)
/// 3. `.env` and `VOXRELAY_*` environment variables
/// 4. Explicit overrides applied by the caller (CLI flags)
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoxConfig {
    pub voice_reference: PathBuf,
    pub language: String,
    pub device: Device,
    pub output_dir: PathBuf,
    pub inbox_dir: Option<PathBuf>,
    pub engine_url: String,
    pub engine_api_key: Option<String>,
    pub sample_rate: u32,
    pub host: String,
    pub port: u16,
    pub queue_capacity: usize,
    pub workers: usize,
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    pub engine_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl fmt::Debug for VoxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoxConfig")
            .field("voice_reference", &self.voice_reference)
            .field("language", &self.language)
            .field("device", &self.device)
            .field("output_dir", &self.output_dir)
            .field("inbox_dir", &self.inbox_dir)
            .field("engine_url", &self.engine_url)
            .field("engine_api_key", &self.engine_api_key.as_ref().map(|_| ".."))
            .field("sample_rate", &self.sample_rate)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("queue_capacity", &self.queue_capacity)
            .field("workers", &self.workers)
            .field("max_attempts", &self.max_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for VoxConfig {
    fn default() -> Self {
        Self {
            voice_reference: PathBuf::from("sample.wav"),
            language: "hi".to_string(),
            device: Device::Auto,
            output_dir: PathBuf::from("outputs"),
            inbox_dir: None,
            engine_url: "http://127.0.0.1:8020".to_string(),
            engine_api_key: None,
            sample_rate: 48_000,
            host: "0.0.0.0".to_string(),
            port: 8000,
            queue_capacity: 32,
            workers: 1,
            max_attempts: 3,
            poll_interval_ms: 1_000,
            engine_timeout_secs: 120,
            request_timeout_secs: 300,
        }
    }
}

impl VoxConfig {
    /// Load defaults, then the TOML file, then `.env` and the process environment.
    ///
    /// An explicit `path` must exist; the default config-dir file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VoxError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| VoxError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(raw)?;
        config.language = normalize_language(&config.language);
        Ok(config)
    }

    /// Overlay `VOXRELAY_*` variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("VOICE_REFERENCE") {
            self.voice_reference = PathBuf::from(v);
        }
        if let Some(v) = var("LANGUAGE") {
            self.language = normalize_language(&v);
        }
        if let Some(v) = var("DEVICE") {
            self.device = v
                .parse()
                .map_err(|_| invalid_env("DEVICE", &v, "expected auto, cpu or cuda"))?;
        }
        if let Some(v) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("INBOX_DIR") {
            self.inbox_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ENGINE_URL") {
            self.engine_url = v;
        }
        if let Some(v) = var("ENGINE_API_KEY") {
            self.engine_api_key = Some(v);
        }
        if let Some(v) = var("HOST") {
            self.host = v;
        }
        if let Some(v) = var("SAMPLE_RATE") {
            self.sample_rate = parse_env("SAMPLE_RATE", &v)?;
        }
        if let Some(v) = var("PORT") {
            self.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = var("QUEUE_CAPACITY") {
            self.queue_capacity = parse_env("QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = var("WORKERS") {
            self.workers = parse_env("WORKERS", &v)?;
        }
        if let Some(v) = var("MAX_ATTEMPTS") {
            self.max_attempts = parse_env("MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_env("POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("ENGINE_TIMEOUT_SECS") {
            self.engine_timeout_secs = parse_env("ENGINE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    /// Check everything that must hold before the service starts.
    ///
    /// A missing voice reference is fatal: it is reported as
    /// [`VoxError::VoiceReferenceMissing`].
    pub fn validate(&self) -> Result<()> {
        if !self.voice_reference.is_file() {
            return Err(VoxError::VoiceReferenceMissing(self.voice_reference.clone()));
        }
        validate_language(&self.language)?;
        if self.engine_url.trim().is_empty() {
            return Err(VoxError::Configuration("engine_url cannot be empty".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(VoxError::Configuration("sample_rate must be > 0".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(VoxError::Configuration("queue_capacity must be > 0".to_string()));
        }
        if self.workers == 0 {
            return Err(VoxError::Configuration("workers must be > 0".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(VoxError::Configuration("max_attempts must be > 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(VoxError::Configuration("poll_interval_ms must be > 0".to_string()));
        }
        if self.engine_timeout_secs == 0 {
            return Err(VoxError::Configuration("engine_timeout_secs must be > 0".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(VoxError::Configuration("request_timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Directory scanned for task markers (defaults to the output directory).
    pub fn inbox_dir(&self) -> &Path {
        self.inbox_dir.as_deref().unwrap_or(&self.output_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Language codes are compared in lowercase: `HI` and ` hi ` both mean `hi`.
pub fn normalize_language(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Validate a language code such as `hi`, `en` or `zh-cn`.
pub fn validate_language(language: &str) -> Result<()> {
    if language_code_pattern().is_match(language) {
        Ok(())
    } else {
        Err(VoxError::InvalidArgument(format!(
            "invalid language code '{language}'"
        )))
    }
}

/// `voxrelay.toml` inside the platform config directory, if one exists.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "voxrelay")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| invalid_env(name, raw, "not a valid number"))
}

fn invalid_env(name: &str, raw: &str, reason: &str) -> VoxError {
    VoxError::Configuration(format!("{ENV_PREFIX}{name}='{raw}': {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_reference_deployment() {
        let config = VoxConfig::default();
        assert_eq!(config.language, "hi");
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.inbox_dir(), Path::new("outputs"));
        assert_eq!(config.device, Device::Auto);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn toml_overrides_defaults_and_keeps_the_rest() {
        let config = VoxConfig::from_toml_str(
            r#"
            language = "en"
            workers = 4
            device = "cuda"
            "#,
        )
        .unwrap();

        assert_eq!(config.language, "en");
        assert_eq!(config.workers, 4);
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.queue_capacity, 32);
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(VoxConfig::from_toml_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = VoxConfig::from_toml_str("port = 9000\nlanguage = \"en\"").unwrap();
        config
            .apply_env(lookup(&[
                ("VOXRELAY_PORT", "9100"),
                ("VOXRELAY_INBOX_DIR", "/tmp/inbox"),
                ("VOXRELAY_ENGINE_API_KEY", "secret"),
            ]))
            .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.language, "en");
        assert_eq!(config.inbox_dir(), Path::new("/tmp/inbox"));
        assert_eq!(config.engine_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = VoxConfig::default();
        config
            .apply_env(lookup(&[("VOXRELAY_LANGUAGE", "   ")]))
            .unwrap();
        assert_eq!(config.language, "hi");
    }

    #[test]
    fn invalid_numeric_env_is_a_configuration_error() {
        let mut config = VoxConfig::default();
        let err = config
            .apply_env(lookup(&[("VOXRELAY_WORKERS", "many")]))
            .unwrap_err();
        assert!(matches!(err, VoxError::Configuration(msg) if msg.contains("VOXRELAY_WORKERS")));
    }

    #[test]
    fn validate_fails_when_voice_reference_is_absent() {
        let dir = TempDir::new().unwrap();
        let config = VoxConfig {
            voice_reference: dir.path().join("missing.wav"),
            ..VoxConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, VoxError::VoiceReferenceMissing(_)));
    }

    #[test]
    fn validate_accepts_a_complete_config() {
        let dir = TempDir::new().unwrap();
        let sample = dir.path().join("sample.wav");
        std::fs::write(&sample, b"RIFF").unwrap();
        let config = VoxConfig {
            voice_reference: sample,
            ..VoxConfig::default()
        };

        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_capacity_and_bad_language() {
        let dir = TempDir::new().unwrap();
        let sample = dir.path().join("sample.wav");
        std::fs::write(&sample, b"RIFF").unwrap();

        let zero_queue = VoxConfig {
            voice_reference: sample.clone(),
            queue_capacity: 0,
            ..VoxConfig::default()
        };
        assert!(matches!(
            zero_queue.validate(),
            Err(VoxError::Configuration(_))
        ));

        let bad_language = VoxConfig {
            voice_reference: sample,
            language: "Hindi!".to_string(),
            ..VoxConfig::default()
        };
        assert!(matches!(
            bad_language.validate(),
            Err(VoxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let dir = TempDir::new().unwrap();
        let sample = dir.path().join("sample.wav");
        std::fs::write(&sample, b"RIFF").unwrap();

        for config in [
            VoxConfig {
                voice_reference: sample.clone(),
                engine_timeout_secs: 0,
                ..VoxConfig::default()
            },
            VoxConfig {
                voice_reference: sample.clone(),
                request_timeout_secs: 0,
                ..VoxConfig::default()
            },
        ] {
            match config.validate() {
                Err(VoxError::Configuration(message)) => assert!(message.contains("timeout_secs")),
                other => panic!("expected configuration error, got {other:?}"),
            }
        }
    }

    #[test]
    fn language_is_lowercased_from_env_and_file() {
        let mut config = VoxConfig::default();
        config
            .apply_env(lookup(&[("VOXRELAY_LANGUAGE", " HI ")]))
            .unwrap();
        assert_eq!(config.language, "hi");

        let from_file = VoxConfig::from_toml_str("language = \"ZH-CN\"").unwrap();
        assert_eq!(from_file.language, "zh-cn");
        validate_language(&from_file.language).unwrap();
    }

    #[test]
    fn debug_output_hides_the_engine_key() {
        let config = VoxConfig {
            engine_api_key: Some("super-secret".to_string()),
            ..VoxConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
