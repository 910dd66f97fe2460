//! Progress-callback trait for stage-level tailoring events.
//!
//! Inject an [`Arc<dyn TailorProgressCallback>`] via
//! [`crate::config::TailorConfigBuilder::progress_callback`] to follow a
//! request through extract → generate → persist → compile. Generation takes
//! minutes, so a host application usually wants to tell its user which stage
//! is running and which attempt it is on.
//!
//! # Example
//!
//! ```rust
//! use resume_tailor::{Stage, TailorConfig, TailorProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl TailorProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage, attempt: u32) {
//!         eprintln!("attempt {attempt}: {stage}…");
//!     }
//! }
//!
//! let config = TailorConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One stage of the tailoring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Generate,
    Persist,
    Compile,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Generate => "generate",
            Stage::Persist => "persist",
            Stage::Compile => "compile",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline at every stage boundary.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `attempt` is 1-based; extraction always reports 0
/// because it runs once, before the first attempt.
pub trait TailorProgressCallback: Send + Sync {
    /// A stage is about to run.
    fn on_stage_start(&self, stage: Stage, attempt: u32) {
        let _ = (stage, attempt);
    }

    /// A stage finished successfully.
    fn on_stage_complete(&self, stage: Stage, attempt: u32, elapsed_ms: u64) {
        let _ = (stage, attempt, elapsed_ms);
    }

    /// A stage failed; the pipeline may still retry.
    fn on_stage_error(&self, stage: Stage, attempt: u32, error: &str) {
        let _ = (stage, attempt, error);
    }

    /// The request finished, either with a PDF or a classified failure.
    fn on_complete(&self, success: bool, attempts: u32) {
        let _ = (success, attempts);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TailorProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TailorConfig`].
pub type ProgressCallback = Arc<dyn TailorProgressCallback>;
