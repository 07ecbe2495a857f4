//! Project configuration, stored as TOML in `.bigo/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bigo_core::{Backend, BackendClass, CoreError, RoutingPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory holding the ledger and the config file.
pub const BIGO_DIR: &str = ".bigo";
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable consulted when no Gemini key is configured.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const HEADER: &str = "\
# BigO configuration
#
# Every task is classified into a tier and routed to a backend:
#   trivial  -> ollama:fast      (no validation)
#   simple   -> ollama:default   (1 local validator)
#   standard -> claude:sonnet    (2 validators)
#   complex  -> claude:sonnet    (3 validators, falls back to opus)
#   critical -> claude:opus      (5 validators, never runs locally)
#
# Delete a model entry to stop routing to that backend. Add a [routing]
# table with all five tiers to replace the routing policy.

";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown model role '{role}' in [workers.{section}.models]")]
    UnknownRole { section: &'static str, role: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorSection {
    /// Informational only; failed runs are never retried.
    pub max_retries: u32,
    pub validation_timeout_secs: u64,
}

impl Default for ConductorSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            validation_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Role (`fast`, `default`, `reasoning`) to model name.
    pub models: BTreeMap<String, String>,
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 300,
            models: models(&[
                ("fast", "phi3:mini-16k"),
                ("default", "qwen3:8b"),
                ("reasoning", "qwen3:8b-8k"),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLimits {
    pub daily_usd: f64,
    pub per_task_usd: f64,
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            daily_usd: 50.0,
            per_task_usd: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeSection {
    pub enabled: bool,
    pub cli_path: PathBuf,
    pub timeout_secs: u64,
    pub models: BTreeMap<String, String>,
    pub cost_limits: CostLimits,
}

impl Default for ClaudeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cli_path: PathBuf::from("claude"),
            timeout_secs: 600,
            models: models(&[
                ("haiku", "claude-haiku-3-5-20241022"),
                ("sonnet", "claude-sonnet-4-20250514"),
                ("opus", "claude-opus-4-5-20251101"),
            ]),
            cost_limits: CostLimits::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSection {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub models: BTreeMap<String, String>,
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: bigo_workers::DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: 300,
            models: models(&[("flash", "gemini-1.5-flash"), ("pro", "gemini-1.5-pro")]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersSection {
    pub ollama: OllamaSection,
    pub claude: ClaudeSection,
    pub gemini: GeminiSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Relative paths resolve against the project directory.
    pub path: PathBuf,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            path: Path::new(BIGO_DIR).join("ledger.db"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub conductor: ConductorSection,
    pub workers: WorkersSection,
    pub ledger: LedgerSection,
    /// Replaces the built-in routing policy when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingPolicy>,
}

fn models(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(role, model)| (role.to_string(), model.to_string()))
        .collect()
}

/// Path of the config file inside a project directory.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(BIGO_DIR).join(CONFIG_FILE)
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.check_roles()?;
        if let Some(routing) = &config.routing {
            routing.validate()?;
        }
        Ok(config)
    }

    /// Write the default configuration, with an explanatory header.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let body = Self::default().to_toml()?;
        std::fs::write(path, format!("{HEADER}{body}")).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(key) = config.workers.gemini.api_key.as_mut() {
            *key = "********".to_string();
        }
        config
    }

    /// Routing policy in effect: the `[routing]` override or the default.
    pub fn routing_policy(&self) -> Result<RoutingPolicy, ConfigError> {
        let policy = self.routing.clone().unwrap_or_default();
        policy.validate()?;
        Ok(policy)
    }

    /// Ledger location, resolved against the project directory.
    pub fn ledger_path(&self, root: &Path) -> PathBuf {
        if self.ledger.path.is_absolute() {
            self.ledger.path.clone()
        } else {
            root.join(&self.ledger.path)
        }
    }

    /// Model configured for a backend, if its provider is enabled and the
    /// role has an entry.
    pub fn model_for(&self, backend: Backend) -> Option<&str> {
        let (enabled, models) = match backend.class() {
            BackendClass::Local => (self.workers.ollama.enabled, &self.workers.ollama.models),
            BackendClass::Claude => (self.workers.claude.enabled, &self.workers.claude.models),
            BackendClass::Gemini => (self.workers.gemini.enabled, &self.workers.gemini.models),
        };
        if !enabled {
            return None;
        }
        models.get(backend.role()).map(String::as_str)
    }

    /// Drop a backend's model entry for the rest of this process.
    ///
    /// Never written back to disk. Returns the removed model name.
    pub fn disable(&mut self, backend: Backend) -> Option<String> {
        let models = match backend.class() {
            BackendClass::Local => &mut self.workers.ollama.models,
            BackendClass::Claude => &mut self.workers.claude.models,
            BackendClass::Gemini => &mut self.workers.gemini.models,
        };
        models.remove(backend.role())
    }

    /// Backends that still have a model, in routing order. Gemini needs a key.
    pub fn enabled_backends(&self) -> Vec<Backend> {
        let gemini_key = self.gemini_api_key().is_some();
        Backend::ALL
            .into_iter()
            .filter(|backend| self.model_for(*backend).is_some())
            .filter(|backend| gemini_key || backend.class() != BackendClass::Gemini)
            .collect()
    }

    /// Gemini key from the config, else from the environment.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.workers
            .gemini
            .api_key
            .clone()
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    fn check_roles(&self) -> Result<(), ConfigError> {
        let sections = [
            ("ollama", BackendClass::Local, &self.workers.ollama.models),
            ("claude", BackendClass::Claude, &self.workers.claude.models),
            ("gemini", BackendClass::Gemini, &self.workers.gemini.models),
        ];
        for (section, class, models) in sections {
            for role in models.keys() {
                if format!("{}{}", class.prefix(), role).parse::<Backend>().is_err() {
                    return Err(ConfigError::UnknownRole {
                        section,
                        role: role.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
