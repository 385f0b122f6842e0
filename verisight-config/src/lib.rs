//! Loader for VeriSight configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: built-in defaults, the YAML file (optional),
//! inline YAML snippets, then `VERISIGHT__SECTION__KEY` environment variables.
//! `${VAR}` placeholders are expanded after merging, so secrets can live in
//! the environment while the file only names them.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use verisight_common::LlmConfig;
use verisight_common::observability::LogFormat;
use verisight_engine::FailurePolicy;
use verisight_forensics::GatewaySettings;
use verisight_forensics::classifier::HF_INFERENCE_BASE;
use verisight_search::SearchDepth;
use verisight_search::tavily::TAVILY_API_BASE;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "VERISIGHT";
pub const DEFAULT_CONFIG_FILE: &str = "verisight.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VerisightConfig {
    pub server: ServerConfig,
    pub classifier: ClassifierConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub policy: FailurePolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub request_deadline_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            request_deadline_secs: 120,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub api_token: String,
    pub primary_model: String,
    pub fallback_models: Vec<String>,
    pub fallback_on_failure: bool,
    pub timeout_secs: u64,
    pub cold_start_backoff_secs: u64,
    pub retry_timeout_secs: u64,
    pub error_snippet_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: HF_INFERENCE_BASE.into(),
            api_token: "${HF_TOKEN}".into(),
            primary_model: "umm-maybe/AI-image-detector".into(),
            fallback_models: vec!["dima806/deepfake_vs_real_image_detection".into()],
            fallback_on_failure: true,
            timeout_secs: 30,
            cold_start_backoff_secs: 15,
            retry_timeout_secs: 60,
            error_snippet_chars: 50,
        }
    }
}

impl ClassifierConfig {
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            timeout: Duration::from_secs(self.timeout_secs),
            cold_start_backoff: Duration::from_secs(self.cold_start_backoff_secs),
            retry_timeout: Duration::from_secs(self.retry_timeout_secs),
            error_snippet_chars: self.error_snippet_chars,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: String,
    pub search_depth: SearchDepth,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: TAVILY_API_BASE.into(),
            api_key: "${TAVILY_API_KEY}".into(),
            search_depth: SearchDepth::Advanced,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: true,
            filter: "info".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is empty")]
    Missing { field: &'static str },
    #[error("{field} still contains an unexpanded placeholder: {value}")]
    Unexpanded { field: &'static str, value: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

impl VerisightConfig {
    /// Fail fast on settings that would only break at request time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_secret("classifier.api_token", &self.classifier.api_token)?;
        check_secret("search.api_key", &self.search.api_key)?;
        if let Some(key) = self.llm.api_key() {
            check_secret("llm.api_key", key)?;
        }
        if self.classifier.primary_model.trim().is_empty() {
            return Err(ValidationError::Missing {
                field: "classifier.primary_model",
            });
        }
        if self.server.request_deadline_secs == 0 {
            return Err(ValidationError::Zero {
                field: "server.request_deadline_secs",
            });
        }
        Ok(())
    }

    /// Expand placeholders left in serde defaults (they never pass through the merged tree).
    fn expand_defaults(&mut self) {
        self.classifier.api_token = expand_env_str(&self.classifier.api_token);
        self.search.api_key = expand_env_str(&self.search.api_key);
        match &mut self.llm {
            LlmConfig::Groq { api_key, .. } | LlmConfig::Openai { api_key, .. } => {
                *api_key = expand_env_str(api_key);
            }
            LlmConfig::Ollama { .. } | LlmConfig::None => {}
        }
    }
}

fn check_secret(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing { field });
    }
    if value.contains("${") {
        return Err(ValidationError::Unexpanded {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn expand_env_str(raw: &str) -> String {
    if !raw.contains('$') {
        return raw.to_string();
    }
    let mut cur = raw.to_string();
    for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
        let expanded = match shellexpand::env(&cur) {
            Ok(cow) => cow.into_owned(),
            Err(_) => cur.clone(),
        };
        if expanded == cur {
            break;
        }
        cur = expanded;
    }
    cur
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => *s = expand_env_str(s),
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Config file used when none is given: `./verisight.yaml`, then the user config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("verisight").join(DEFAULT_CONFIG_FILE))
        .filter(|p| p.is_file())
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct VerisightConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for VerisightConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl VerisightConfigLoader {
    /// Defaults plus `VERISIGHT__` env overrides; add files or snippets before `load`.
    ///
    /// ```
    /// use verisight_config::VerisightConfigLoader;
    ///
    /// let config = VerisightConfigLoader::new()
    ///     .with_yaml_str("server:\n  bind: 0.0.0.0:9000")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.server.bind.port(), 9000);
    /// assert_eq!(config.server.request_deadline_secs, 120);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Override the env prefix; tests use this to stay isolated from the host.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Attach a YAML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file only if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, and deserialize.
    ///
    /// ```
    /// use verisight_common::LlmConfig;
    /// use verisight_config::VerisightConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_GROQ_KEY", "gsk_from_env"); }
    ///
    /// let config = VerisightConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// llm:
    ///   provider: groq
    ///   api_key: "${DOC_GROQ_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &config.llm {
    ///     LlmConfig::Groq { api_key, model, .. } => {
    ///         assert_eq!(api_key, "gsk_from_env");
    ///         assert_eq!(model, "llama-3.3-70b-versatile");
    ///     }
    ///     other => panic!("expected groq, got {other:?}"),
    /// }
    ///
    /// unsafe { std::env::remove_var("DOC_GROQ_KEY"); }
    /// ```
    pub fn load(self) -> Result<VerisightConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("classifier.fallback_models"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: VerisightConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.expand_defaults();
        Ok(typed)
    }
}
