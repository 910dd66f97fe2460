//! Configuration for a tailoring run.
//!
//! Every knob lives in [`TailorConfig`], built once at process start via
//! [`TailorConfigBuilder`] and passed by reference into the pipeline. The
//! library never reads the process environment; the CLI maps its flags and
//! environment variables onto the builder.

use crate::error::TailorError;
use crate::pipeline::llm::GenerationBackend;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// OpenRouter's OpenAI-compatible chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model identifier sent to the endpoint.
pub const DEFAULT_MODEL: &str = "mistralai/mistral-7b-instruct:free";

/// Default LaTeX compiler executable.
pub const DEFAULT_COMPILER: &str = "pdflatex";

/// Upper bound on transient retries per generation call.
pub const MAX_RETRIES: u32 = 10;

/// Longest single wait between generation retries.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Flags keeping the compiler non-interactive and its errors greppable.
pub const DEFAULT_COMPILER_ARGS: &[&str] = &[
    "-interaction=nonstopmode",
    "-halt-on-error",
    "-file-line-error",
];

/// Configuration for a tailoring run.
///
/// Built via [`TailorConfig::builder()`] or using [`TailorConfig::default()`].
///
/// # Example
/// ```rust
/// use resume_tailor::TailorConfig;
///
/// let config = TailorConfig::builder()
///     .model("openai/gpt-4.1-mini")
///     .api_key("sk-or-...")
///     .max_attempts(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TailorConfig {
    /// Chat-completions URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model identifier sent with every request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Process-wide credential used when a request carries none.
    pub api_key: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// When set, the provider replaces the HTTP client and reads its own key.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn GenerationBackend>>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Low enough to keep the template intact, high enough that the rewrite
    /// actually rephrases bullet points towards the job description.
    pub temperature: f32,

    /// Upper bound on generated tokens. Default: None (endpoint default).
    pub max_tokens: Option<u32>,

    /// Timeout for one generation call in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Retries on a transient endpoint failure within one attempt. Default: 2.
    /// The builder caps this at [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per retry and capped at
    /// [`MAX_BACKOFF_MS`]. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Generate → persist → compile cycles before giving up. Default: 3.
    ///
    /// Attempts after the first feed the compiler transcript (or preamble
    /// diff) back to the model as additional context.
    pub max_attempts: u32,

    /// Reject output whose preamble differs from the template's. Default: true.
    pub verify_preamble: bool,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// LaTeX compiler executable. Default: `pdflatex`.
    pub compiler: String,

    /// Arguments passed before `-output-directory` and the source file.
    pub compiler_args: Vec<String>,

    /// Timeout for one compiler pass in seconds. Default: 120.
    pub compile_timeout_secs: u64,

    /// Directory under which per-request working directories are created.
    /// Default: `<system temp>/resume_tailor`.
    pub work_root: PathBuf,

    /// Retain working directories unless a request says otherwise. Default: false.
    pub keep_workdir: bool,

    /// pdfium shared library file, or the directory containing it.
    /// If None, looks in the current directory and then system paths.
    pub pdfium_library: Option<PathBuf>,

    /// File stem of the persisted source (`<stem>.tex` → `<stem>.pdf`).
    pub job_file_stem: String,

    /// Optional `HTTP-Referer` attribution header (OpenRouter rankings).
    pub referer: Option<String>,

    /// Optional `X-Title` attribution header (OpenRouter rankings).
    pub app_title: Option<String>,

    /// Stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TailorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            provider_name: None,
            backend: None,
            temperature: 0.3,
            max_tokens: None,
            api_timeout_secs: 180,
            max_retries: 2,
            retry_backoff_ms: 1000,
            max_attempts: 3,
            verify_preamble: true,
            system_prompt: None,
            compiler: DEFAULT_COMPILER.to_string(),
            compiler_args: DEFAULT_COMPILER_ARGS.iter().map(|s| s.to_string()).collect(),
            compile_timeout_secs: 120,
            work_root: std::env::temp_dir().join("resume_tailor"),
            keep_workdir: false,
            pdfium_library: None,
            job_file_stem: "tailored".to_string(),
            referer: None,
            app_title: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TailorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_attempts", &self.max_attempts)
            .field("verify_preamble", &self.verify_preamble)
            .field("compiler", &self.compiler)
            .field("compiler_args", &self.compiler_args)
            .field("compile_timeout_secs", &self.compile_timeout_secs)
            .field("work_root", &self.work_root)
            .field("keep_workdir", &self.keep_workdir)
            .finish()
    }
}

impl TailorConfig {
    /// Create a new builder for `TailorConfig`.
    pub fn builder() -> TailorConfigBuilder {
        TailorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TailorConfig`].
#[derive(Debug)]
pub struct TailorConfigBuilder {
    config: TailorConfig,
}

impl TailorConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms.min(MAX_BACKOFF_MS);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn verify_preamble(mut self, v: bool) -> Self {
        self.config.verify_preamble = v;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn compiler(mut self, program: impl Into<String>) -> Self {
        self.config.compiler = program.into();
        self
    }

    pub fn compiler_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.compiler_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_root = dir.into();
        self
    }

    pub fn keep_workdir(mut self, v: bool) -> Self {
        self.config.keep_workdir = v;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn job_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.config.job_file_stem = stem.into();
        self
    }

    pub fn referer(mut self, url: impl Into<String>) -> Self {
        self.config.referer = Some(url.into());
        self
    }

    pub fn app_title(mut self, title: impl Into<String>) -> Self {
        self.config.app_title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TailorConfig, TailorError> {
        let c = &self.config;
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(TailorError::InvalidConfig(format!(
                "endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        if c.model.trim().is_empty() {
            return Err(TailorError::InvalidConfig("model must not be empty".into()));
        }
        if c.compiler.trim().is_empty() {
            return Err(TailorError::InvalidConfig(
                "compiler must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.compile_timeout_secs == 0 {
            return Err(TailorError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        let stem = c.job_file_stem.as_str();
        if stem.is_empty() || stem.contains(['/', '\\', '.']) || stem.contains(char::is_whitespace) {
            return Err(TailorError::InvalidConfig(format!(
                "job file stem must be a plain file name without extension, got '{stem}'"
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let c = TailorConfig::default();
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.temperature, 0.3);
        assert_eq!(c.api_timeout_secs, 180);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.compiler, "pdflatex");
        assert!(c.compiler_args.iter().any(|a| a == "-interaction=nonstopmode"));
        assert!(c.verify_preamble);
        assert!(!c.keep_workdir);
        assert!(c.work_root.ends_with("resume_tailor"));
    }

    #[test]
    fn builder_clamps_values() {
        let c = TailorConfig::builder()
            .temperature(5.0)
            .max_attempts(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_attempts, 1);
    }

    #[test]
    fn build_rejects_bad_endpoint() {
        let err = TailorConfig::builder()
            .endpoint("openrouter.ai")
            .build()
            .unwrap_err();
        assert!(matches!(err, TailorError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_stem_with_extension() {
        let err = TailorConfig::builder()
            .job_file_stem("resume.tex")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("stem"));
    }

    #[test]
    fn build_rejects_zero_timeout() {
        assert!(TailorConfig::builder().compile_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = TailorConfig::builder()
            .api_key("sk-or-v1-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-or-v1-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
