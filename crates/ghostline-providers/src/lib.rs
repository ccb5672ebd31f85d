//! Ghostline Providers — language-model backend abstraction.
//!
//! The engine only requires fill-in-middle semantics: prefix text, suffix
//! text, stop sequences, one completion string back. Which model or vendor
//! services the request is entirely behind [`FimProvider`]; no transport
//! code lives in this workspace.

mod cancel;

pub use cancel::CancelToken;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: {status} — {message}")]
    Api { status: u16, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Cancellation is distinguished from other failures only for logging;
    /// behavior downstream is identical.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}

/// A fill-in-middle completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FimRequest {
    /// Text before the hole, as the model should see it.
    pub prefix: String,
    /// Text after the hole, as the model should see it.
    pub suffix: String,
    /// Sequences at which generation must stop.
    #[serde(default)]
    pub stop: Vec<String>,
}

/// Configuration for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            endpoint: None,
            enabled: default_true(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    5000
}

/// Trait every language-model backend must implement.
///
/// Cancellation is cooperative: the engine requests it through the token,
/// but an already in-flight call may still complete, and the caller must
/// observe whichever outcome arrives first.
#[async_trait]
pub trait FimProvider: Send + Sync {
    /// Provider name, for logging.
    fn name(&self) -> &str;

    /// Produce the missing middle text for the given request.
    async fn complete(
        &self,
        request: &FimRequest,
        cancel: &CancelToken,
    ) -> Result<String, ProviderError>;
}
