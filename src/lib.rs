//! # resume-tailor
//!
//! Tailor a resume to a job description: extract the text of the current
//! resume PDF, have an LLM rewrite it through a LaTeX template, and compile
//! the result to a new PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! resume.pdf + template.tex + job description
//!  │
//!  ├─ 1. Extract   text layer of every page via pdfium (spawn_blocking)
//!  ├─ 2. Generate  one chat-completions call (OpenRouter by default)
//!  ├─ 3. Polish    strip code fences, normalise line endings, check preamble
//!  ├─ 4. Persist   <stem>.tex in a per-request working directory
//!  ├─ 5. Compile   pdflatex, two passes, PDF existence checked
//!  └─ 6. Output    PDF bytes, or a classified failure with transcript + LaTeX
//! ```
//!
//! A compile error is fed back to the model together with the compiler's
//! error lines, up to `max_attempts` times. Escaping mistakes (`&`, `%`, `_`
//! in company names and metrics) are by far the most common cause.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_tailor::{tailor_resume, ResumeInput, TailorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TailorConfig::builder().api_key("sk-or-...").build()?;
//!     let input = ResumeInput {
//!         resume_pdf: std::fs::read("resume.pdf")?,
//!         latex_template: std::fs::read_to_string("template.tex")?,
//!         job_description: std::fs::read_to_string("posting.txt")?,
//!         ..Default::default()
//!     };
//!     match tailor_resume(input, &config).await {
//!         Ok(out) => std::fs::write("tailored.pdf", &out.pdf)?,
//!         Err(failure) => {
//!             eprintln!("{}: {}", failure.kind(), failure.error);
//!             if let Some(latex) = failure.latex {
//!                 std::fs::write("tailored.tex", latex)?;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-tailor` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-tailor = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime Requirements
//!
//! - `libpdfium` for extraction (see [`TailorConfig::pdfium_library`])
//! - a LaTeX distribution providing `pdflatex` (or another compiler accepting
//!   `-output-directory=`)

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod tailor;
pub mod workdir;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    TailorConfig, TailorConfigBuilder, DEFAULT_COMPILER, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    MAX_BACKOFF_MS, MAX_RETRIES,
};
pub use error::{ErrorKind, FailureReport, TailorError, TailorFailure};
pub use output::{ResumeInput, TailoredResume, TailoringRequest, TailoringStats, PDF_MIME_TYPE};
pub use pipeline::chat::ChatCompletionsClient;
pub use pipeline::compile::{error_excerpt, CompilationResult, CompileFailureKind, Compiler};
pub use pipeline::llm::{ChatMessage, GenerationBackend, Role};
pub use pipeline::provider::ProviderBackend;
pub use progress::{NoopProgressCallback, ProgressCallback, Stage, TailorProgressCallback};
pub use tailor::{
    resolve_backend, tailor_files, tailor_resume, tailor_resume_sync, tailor_text, tailor_to_file,
};
pub use workdir::WorkDir;
