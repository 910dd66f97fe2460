//! Error types for the resume-tailor library.
//!
//! Three layers reflect three audiences:
//!
//! * [`TailorError`]: the typed failure a single stage produces. Every stage
//!   classifies what it can and attaches its diagnostic (upstream message,
//!   raw response body, compiler transcript) before returning.
//!
//! * [`ErrorKind`]: the stable classification tag a caller switches on.
//!   Serialises to the names used in failure payloads (`CompileError`,
//!   `ToolMissing`, …) and answers the two questions the retry loop asks:
//!   can this be retried, and does it need an operator.
//!
//! * [`TailorFailure`]: the terminal value of a failed request. Carries the
//!   error plus whatever generation work survived (the best-effort LaTeX), so
//!   a human can edit and resubmit instead of paying for generation again.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All failures produced by the tailoring pipeline.
#[derive(Debug, Error)]
pub enum TailorError {
    // ── Extraction ────────────────────────────────────────────────────────
    /// The resume bytes are not a readable PDF, or carry no text layer.
    #[error("Could not extract text from resume PDF: {detail}")]
    Extraction { detail: String },

    /// The pdfium library could not be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or point --pdfium-lib / PDFIUM_LIB_PATH at an existing copy."
    )]
    PdfEngineUnavailable(String),

    // ── Generation ────────────────────────────────────────────────────────
    /// The endpoint answered with an error payload (bad key, quota, rate limit).
    #[error("Generation endpoint error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Generation {
        status: Option<u16>,
        message: String,
    },

    /// The endpoint answered, but not with the expected envelope.
    #[error("Malformed response from generation endpoint: {detail}")]
    MalformedResponse {
        detail: String,
        /// The response body as received, cut at
        /// [`RAW_BODY_LIMIT`](crate::pipeline::chat::RAW_BODY_LIMIT) bytes with a
        /// `… [N bytes truncated]` marker when longer.
        raw_body: String,
    },

    /// The request never completed (DNS, refused connection, timeout).
    #[error("Transport error talking to generation endpoint: {detail}")]
    Transport { detail: String, timed_out: bool },

    /// The generated document rewrote the template preamble.
    #[error("Generated LaTeX does not preserve the template preamble")]
    PreambleMismatch { generated_preamble: String },

    /// No credential in the request and no process-wide default configured.
    #[error("No API key provided (request credential or configured default)")]
    MissingCredential,

    // ── Compilation ───────────────────────────────────────────────────────
    /// The LaTeX compiler executable is not installed or not on PATH.
    #[error("LaTeX compiler '{tool}' not found.\nInstall a TeX distribution (TeX Live, MiKTeX) or set --compiler.")]
    ToolMissing { tool: String },

    /// The compiler ran but the document did not produce a PDF.
    #[error("LaTeX compilation failed on pass {pass}: {summary}")]
    Compile {
        pass: u8,
        summary: String,
        transcript: String,
    },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Reading or writing a working file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (runtime creation, task join).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TailorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TailorError::Io {
            path: path.into(),
            source,
        }
    }

    /// The classification tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TailorError::Extraction { .. } => ErrorKind::Extraction,
            TailorError::PdfEngineUnavailable(_) => ErrorKind::PdfEngineUnavailable,
            TailorError::Generation { .. } => ErrorKind::Generation,
            TailorError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            TailorError::Transport { .. } => ErrorKind::Transport,
            TailorError::PreambleMismatch { .. } => ErrorKind::PreambleMismatch,
            TailorError::MissingCredential | TailorError::InvalidConfig(_) => ErrorKind::Config,
            TailorError::ToolMissing { .. } => ErrorKind::ToolMissing,
            TailorError::Compile { .. } => ErrorKind::Compile,
            TailorError::Io { .. } => ErrorKind::Io,
            TailorError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The compiler transcript, when this is a compile failure.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            TailorError::Compile { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// The raw upstream body, when the endpoint response could not be decoded.
    /// Bodies over 16 KiB are truncated.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            TailorError::MalformedResponse { raw_body, .. } => Some(raw_body),
            _ => None,
        }
    }

    /// Whether a transient generation retry may help.
    ///
    /// Auth and request-shape errors (4xx other than 408/429) are permanent;
    /// a status-less error payload is treated as transient.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            TailorError::Transport { .. } | TailorError::MalformedResponse { .. } => true,
            TailorError::Generation { status, .. } => match status {
                None => true,
                Some(s) => *s == 408 || *s == 429 || *s >= 500,
            },
            _ => false,
        }
    }
}

/// Serialisable classification tag for a [`TailorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "ExtractionError")]
    Extraction,
    #[serde(rename = "PdfEngineUnavailable")]
    PdfEngineUnavailable,
    #[serde(rename = "GenerationError")]
    Generation,
    #[serde(rename = "MalformedResponseError")]
    MalformedResponse,
    #[serde(rename = "TransportError")]
    Transport,
    #[serde(rename = "PreambleMismatch")]
    PreambleMismatch,
    #[serde(rename = "ToolMissing")]
    ToolMissing,
    #[serde(rename = "CompileError")]
    Compile,
    #[serde(rename = "IOError")]
    Io,
    #[serde(rename = "ConfigError")]
    Config,
    #[serde(rename = "InternalError")]
    Internal,
}

impl ErrorKind {
    /// The tag as it appears in failure payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Extraction => "ExtractionError",
            ErrorKind::PdfEngineUnavailable => "PdfEngineUnavailable",
            ErrorKind::Generation => "GenerationError",
            ErrorKind::MalformedResponse => "MalformedResponseError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::PreambleMismatch => "PreambleMismatch",
            ErrorKind::ToolMissing => "ToolMissing",
            ErrorKind::Compile => "CompileError",
            ErrorKind::Io => "IOError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Internal => "InternalError",
        }
    }

    /// Errors a fresh tailoring attempt can plausibly fix.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Generation
                | ErrorKind::MalformedResponse
                | ErrorKind::Transport
                | ErrorKind::Compile
                | ErrorKind::PreambleMismatch
        )
    }

    /// Deployment or environment defects: nothing the end user can change
    /// in their resume, template or job description will help.
    pub fn needs_operator(self) -> bool {
        matches!(
            self,
            ErrorKind::ToolMissing
                | ErrorKind::Io
                | ErrorKind::PdfEngineUnavailable
                | ErrorKind::Config
                | ErrorKind::Internal
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal value of a failed tailoring request.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TailorFailure {
    /// Identifier of the request's working directory.
    pub job_id: String,
    /// The error that ended the request.
    #[source]
    pub error: TailorError,
    /// The last LaTeX the model produced, if generation got that far.
    pub latex: Option<String>,
    /// Tailoring attempts used (0 when the request failed before generation).
    pub attempts: u32,
    /// Working directory left on disk, when the caller asked to retain it.
    pub workdir: Option<PathBuf>,
}

impl TailorFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Structured payload for the caller (HTTP layer, CLI `--json`).
    pub fn report(&self) -> FailureReport {
        FailureReport {
            job_id: self.job_id.clone(),
            kind: self.kind(),
            message: self.error.to_string(),
            retryable: self.kind().is_retryable(),
            attempts: self.attempts,
            transcript: self.error.transcript().map(str::to_string),
            raw_body: self.error.raw_body().map(str::to_string),
            latex: self.latex.clone(),
        }
    }
}

/// Serialisable explanation of a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub job_id: String,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Possibly truncated, see [`TailorError::MalformedResponse`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
}
