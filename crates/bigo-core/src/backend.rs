//! Execution backend identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// A named execution target.
///
/// The set is closed: every backend belongs to exactly one [`BackendClass`],
/// and its identity string (`provider:model-role`) is what the ledger stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Backend {
    OllamaFast,
    Ollama,
    OllamaReasoning,
    ClaudeHaiku,
    ClaudeSonnet,
    ClaudeOpus,
    GeminiFlash,
    GeminiPro,
}

/// Cost class of a backend, used for ledger statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendClass {
    /// Free local models.
    Local,
    /// Hosted tier A, the most capable and most expensive class.
    Claude,
    /// Hosted tier B, cheaper hosted models.
    Gemini,
}

impl Backend {
    /// Every backend, cheapest class first.
    pub const ALL: [Backend; 8] = [
        Backend::OllamaFast,
        Backend::Ollama,
        Backend::OllamaReasoning,
        Backend::ClaudeHaiku,
        Backend::ClaudeSonnet,
        Backend::ClaudeOpus,
        Backend::GeminiFlash,
        Backend::GeminiPro,
    ];

    /// Stable identity string.
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::OllamaFast => "ollama:fast",
            Backend::Ollama => "ollama:default",
            Backend::OllamaReasoning => "ollama:reasoning",
            Backend::ClaudeHaiku => "claude:haiku",
            Backend::ClaudeSonnet => "claude:sonnet",
            Backend::ClaudeOpus => "claude:opus",
            Backend::GeminiFlash => "gemini:flash",
            Backend::GeminiPro => "gemini:pro",
        }
    }

    /// Model role within the provider (`fast`, `sonnet`, `pro`, ...).
    pub fn role(self) -> &'static str {
        let id = self.as_str();
        id.split_once(':').map(|(_, role)| role).unwrap_or(id)
    }

    pub fn class(self) -> BackendClass {
        match self {
            Backend::OllamaFast | Backend::Ollama | Backend::OllamaReasoning => BackendClass::Local,
            Backend::ClaudeHaiku | Backend::ClaudeSonnet | Backend::ClaudeOpus => {
                BackendClass::Claude
            }
            Backend::GeminiFlash | Backend::GeminiPro => BackendClass::Gemini,
        }
    }

    /// Whether executions on this backend are free of charge.
    pub fn is_free(self) -> bool {
        self.class() == BackendClass::Local
    }
}

impl BackendClass {
    /// Identity prefix shared by all backends of this class.
    pub fn prefix(self) -> &'static str {
        match self {
            BackendClass::Local => "ollama:",
            BackendClass::Claude => "claude:",
            BackendClass::Gemini => "gemini:",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| CoreError::InvalidBackend(s.to_string()))
    }
}

impl TryFrom<String> for Backend {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Backend> for String {
    fn from(backend: Backend) -> Self {
        backend.as_str().to_string()
    }
}
