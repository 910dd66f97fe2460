//! Request and result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// MIME type of a successful result.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Everything a caller submits for one tailoring request.
#[derive(Clone, Default)]
pub struct ResumeInput {
    /// The current resume as PDF bytes.
    pub resume_pdf: Vec<u8>,
    /// LaTeX template the tailored resume must be rendered through.
    pub latex_template: String,
    /// The job posting to tailor towards.
    pub job_description: String,
    /// Endpoint credential. Falls back to [`crate::TailorConfig::api_key`].
    pub api_key: Option<String>,
    /// Keep the working directory after the request for debugging.
    pub keep_workdir: bool,
}

impl fmt::Debug for ResumeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeInput")
            .field("resume_pdf", &format_args!("{} bytes", self.resume_pdf.len()))
            .field("latex_template", &format_args!("{} chars", self.latex_template.len()))
            .field("job_description", &format_args!("{} chars", self.job_description.len()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("keep_workdir", &self.keep_workdir)
            .finish()
    }
}

/// The immutable aggregate passed through the stages after extraction.
#[derive(Clone)]
pub struct TailoringRequest {
    pub resume_text: String,
    pub job_description: String,
    pub latex_template: String,
    /// Request-scoped credential; `None` means use the configured default.
    pub credential: Option<String>,
}

impl TailoringRequest {
    pub fn new(
        resume_text: impl Into<String>,
        job_description: impl Into<String>,
        latex_template: impl Into<String>,
    ) -> Self {
        Self {
            resume_text: resume_text.into(),
            job_description: job_description.into(),
            latex_template: latex_template.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

impl fmt::Debug for TailoringRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailoringRequest")
            .field("resume_text", &format_args!("{} chars", self.resume_text.len()))
            .field("job_description", &format_args!("{} chars", self.job_description.len()))
            .field("latex_template", &format_args!("{} chars", self.latex_template.len()))
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A successfully tailored resume.
#[derive(Debug, Clone)]
pub struct TailoredResume {
    /// Identifier of the request's working directory (`job_<id>`).
    pub job_id: String,
    /// The compiled PDF.
    pub pdf: Vec<u8>,
    /// The LaTeX source the PDF was compiled from.
    pub latex: String,
    /// Tailoring attempts used (1 when the first answer compiled).
    pub attempts: u32,
    pub stats: TailoringStats,
    /// Set when the working directory was retained.
    pub workdir: Option<PathBuf>,
}

impl TailoredResume {
    pub fn mime_type(&self) -> &'static str {
        PDF_MIME_TYPE
    }
}

/// Timing and size statistics for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailoringStats {
    /// Characters of resume text handed to the model.
    pub resume_chars: usize,
    /// Tailoring attempts (generate → persist → compile cycles).
    pub attempts: u32,
    /// Transient generation retries summed over all attempts.
    pub generation_retries: u32,
    pub extract_ms: u64,
    pub generation_ms: u64,
    pub compile_ms: u64,
    pub total_ms: u64,
    pub latex_bytes: usize,
    pub pdf_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_credentials() {
        let input = ResumeInput {
            resume_pdf: vec![0; 10],
            api_key: Some("sk-or-secret".into()),
            ..Default::default()
        };
        let dbg = format!("{input:?}");
        assert!(!dbg.contains("sk-or-secret"));
        assert!(dbg.contains("10 bytes"));

        let req = TailoringRequest::new("r", "j", "t").with_credential("sk-or-secret");
        assert!(!format!("{req:?}").contains("sk-or-secret"));
    }

    #[test]
    fn result_is_tagged_as_pdf() {
        let out = TailoredResume {
            job_id: "abc".into(),
            pdf: b"%PDF".to_vec(),
            latex: String::new(),
            attempts: 1,
            stats: TailoringStats::default(),
            workdir: None,
        };
        assert_eq!(out.mime_type(), "application/pdf");
    }

    #[test]
    fn stats_serialise_flat() {
        let stats = TailoringStats {
            attempts: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["pdf_bytes"], 0);
    }
}
