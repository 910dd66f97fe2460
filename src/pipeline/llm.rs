//! Generation: the backend seam and the transient-retry loop.
//!
//! [`GenerationBackend`] is the narrow interface the pipeline talks to. The
//! HTTP client in [`crate::pipeline::chat`] and the edgequake-llm adapter in
//! [`crate::pipeline::provider`] implement it; tests implement it with stubs.
//! Nothing above this module knows which endpoint or schema is in use.
//!
//! ## Retry Strategy
//!
//! Rate limits, 5xx responses, truncated bodies and network blips are
//! transient. They are retried with exponential backoff
//! (`retry_backoff_ms * 2^(retry-1)`, saturating, capped at
//! [`MAX_BACKOFF_MS`]): with a 1 s base and 2 retries the waits are 1 s → 2 s. Permanent errors (bad key, malformed request) are
//! returned on the first failure.

use crate::config::{TailorConfig, MAX_BACKOFF_MS};
use crate::error::TailorError;
use crate::pipeline::postprocess;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A remote text generator.
///
/// Implementations send `messages` in order and return the generated text,
/// classifying failures as [`TailorError::Generation`],
/// [`TailorError::MalformedResponse`] or [`TailorError::Transport`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Run one generation request.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, TailorError>;
}

/// Result of a successful generation, after post-processing.
#[derive(Debug, Clone)]
pub struct Generated {
    pub latex: String,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Generate LaTeX for `messages`, retrying transient failures.
///
/// Each call is bounded by `api_timeout_secs`, independently of whatever
/// timeout the backend applies itself, so a hung upstream never pins the
/// request. The returned text has already been through
/// [`postprocess::clean_latex`].
pub async fn generate_latex(
    backend: &dyn GenerationBackend,
    messages: &[ChatMessage],
    config: &TailorConfig,
) -> Result<Generated, TailorError> {
    let start = Instant::now();
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<TailorError> = None;

    for retry in 0..=config.max_retries {
        if retry > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, retry);
            warn!(
                backend = backend.name(),
                "generation retry {}/{} after {}ms",
                retry,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(call_timeout, backend.generate(messages)).await {
            Ok(result) => result,
            Err(_) => Err(TailorError::Transport {
                detail: format!("no response within {}s", config.api_timeout_secs),
                timed_out: true,
            }),
        };

        match outcome {
            Ok(raw) => {
                let latex = postprocess::clean_latex(&raw);
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    backend = backend.name(),
                    raw_len = raw.len(),
                    latex_len = latex.len(),
                    duration_ms,
                    "generation succeeded"
                );
                return Ok(Generated {
                    latex,
                    retries: retry,
                    duration_ms,
                });
            }
            Err(e) if e.is_transient() => {
                warn!(
                    backend = backend.name(),
                    kind = %e.kind(),
                    "generation attempt {} failed: {}",
                    retry + 1,
                    e
                );
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| TailorError::Internal("generation loop did not run".into())))
}

/// Delay before retry number `retry` (1-based).
fn backoff_ms(base_ms: u64, retry: u32) -> u64 {
    let factor = 1u64
        .checked_shl(retry.saturating_sub(1))
        .unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}
