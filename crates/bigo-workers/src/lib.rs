//! BigO Workers
//!
//! Concrete [`Worker`](bigo_conductor::Worker) implementations, one per
//! backend family:
//!
//! - [`OllamaWorker`]: local models over the Ollama HTTP API, free.
//! - [`ClaudeWorker`]: the `claude` command-line tool in print mode.
//! - [`GeminiWorker`]: the Gemini `generateContent` HTTP API.
//!
//! Backend failures while executing are reported as `success = false`
//! results; only cancellation is returned as an error.

mod claude;
mod gemini;
mod ollama;
mod prompt;

pub use claude::{ClaudeConfig, ClaudeWorker};
pub use gemini::{GeminiConfig, GeminiWorker, DEFAULT_GEMINI_BASE_URL};
pub use ollama::{OllamaConfig, OllamaWorker};
pub use prompt::build_task_prompt;

/// Rough token estimate used when a backend does not report usage.
pub(crate) fn estimate_tokens(chars: usize) -> u64 {
    (chars / 4) as u64
}
