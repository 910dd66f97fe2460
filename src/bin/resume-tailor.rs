//! CLI binary for resume-tailor.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TailorConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume_tailor::{
    error_excerpt, tailor_to_file, ProgressCallback, ResumeInput, Stage, TailorConfig,
    TailorFailure, TailorProgressCallback, TailoredResume, DEFAULT_COMPILER, DEFAULT_ENDPOINT,
    DEFAULT_MODEL,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

/// Output file used when `-o` is not given.
const DEFAULT_OUTPUT: &str = "tailored_resume.pdf";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the running stage, with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Reading resume",
        Stage::Generate => "Tailoring",
        Stage::Persist => "Saving LaTeX",
        Stage::Compile => "Compiling",
    }
}

fn attempt_suffix(attempt: u32) -> String {
    if attempt > 1 {
        format!(" (attempt {attempt})")
    } else {
        String::new()
    }
}

impl TailorProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, attempt: u32) {
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message(attempt_suffix(attempt).trim().to_string());
    }

    fn on_stage_complete(&self, stage: Stage, attempt: u32, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<15}{}  {}",
            green("✓"),
            stage.as_str(),
            attempt_suffix(attempt),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, attempt: u32, error: &str) {
        let first_line = error.lines().next().unwrap_or_default();
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['…']).collect()
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {:<15}{}  {}",
            red("✗"),
            stage.as_str(),
            attempt_suffix(attempt),
            red(&msg),
        ));
    }

    fn on_complete(&self, _success: bool, _attempts: u32) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Tailor a resume to a job posting
  resume-tailor resume.pdf --template template.tex --job posting.txt -o tailored.pdf

  # Job description from stdin, keep the LaTeX source too
  pbpaste | resume-tailor resume.pdf -t template.tex -j - --latex-out tailored.tex

  # Keep the working directory (.tex, .log, .aux) for debugging
  resume-tailor resume.pdf -t template.tex -j posting.txt --keep-files

  # Use another OpenRouter model
  resume-tailor resume.pdf -t template.tex -j posting.txt --model x-ai/grok-4-fast:free

  # Use an edgequake-llm provider instead of OpenRouter (reads OPENAI_API_KEY)
  resume-tailor resume.pdf -t template.tex -j posting.txt --provider openai --model gpt-4.1-mini

  # Machine-readable result or failure report
  resume-tailor resume.pdf -t template.tex -j posting.txt --json

ENVIRONMENT VARIABLES:
  API_KEY            OpenRouter (or compatible endpoint) API key
  TAILOR_MODEL       Model ID
  TAILOR_ENDPOINT    Chat-completions URL
  TAILOR_PROVIDER    edgequake-llm provider name (openai, anthropic, gemini, ollama)
  TAILOR_COMPILER    LaTeX compiler executable
  PDFIUM_LIB_PATH    Path to libpdfium (file or directory)
  RUST_LOG           Log filter, overrides -v / -q

EXIT STATUS:
  0  PDF written
  1  the request failed (generation, compile or extraction error)
  2  the environment needs fixing (compiler or pdfium missing, I/O, config)
"#;

/// Tailor a resume PDF to a job description through a LaTeX template.
#[derive(Parser, Debug)]
#[command(
    name = "resume-tailor",
    version,
    about = "Tailor a resume PDF to a job description through a LaTeX template",
    long_about = "Extract the text of a resume PDF, ask an LLM to rewrite it for a job description \
using a LaTeX template, and compile the result with pdflatex. Compile errors are fed back to the \
model and retried.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// The current resume, as a PDF.
    resume: PathBuf,

    /// LaTeX template the tailored resume is rendered through.
    #[arg(short, long)]
    template: PathBuf,

    /// Job description text file, or '-' for stdin.
    #[arg(short, long)]
    job: String,

    /// Write the PDF here.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Also write the final LaTeX source here.
    #[arg(long)]
    latex_out: Option<PathBuf>,

    /// API key for the chat-completions endpoint.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "TAILOR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible chat-completions URL.
    #[arg(long, env = "TAILOR_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// edgequake-llm provider to use instead of the HTTP endpoint.
    #[arg(long, env = "TAILOR_PROVIDER")]
    provider: Option<String>,

    /// LaTeX compiler executable.
    #[arg(long, env = "TAILOR_COMPILER", default_value = DEFAULT_COMPILER)]
    compiler: String,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Directory for per-request working directories.
    #[arg(long, env = "TAILOR_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Keep the working directory after the run.
    #[arg(long)]
    keep_files: bool,

    /// Generate → compile cycles before giving up.
    #[arg(long, env = "TAILOR_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Retries per generation call on transient endpoint errors.
    #[arg(long, env = "TAILOR_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TAILOR_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max output tokens per generation.
    #[arg(long, env = "TAILOR_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Per-call generation timeout in seconds.
    #[arg(long, env = "TAILOR_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Per-pass compiler timeout in seconds.
    #[arg(long, env = "TAILOR_COMPILE_TIMEOUT", default_value_t = 120)]
    compile_timeout: u64,

    /// Accept output whose preamble differs from the template's.
    #[arg(long)]
    no_preamble_check: bool,

    /// Path to a text file containing a custom system prompt.
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// HTTP-Referer attribution header.
    #[arg(long, env = "TAILOR_REFERER")]
    referer: Option<String>,

    /// X-Title attribution header.
    #[arg(long, env = "TAILOR_APP_TITLE")]
    app_title: Option<String>,

    /// Print a JSON summary (or failure report) to stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level stage logs when it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and read inputs ─────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn TailorProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let input = read_input(&cli).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    match tailor_to_file(input, &cli.output, &config).await {
        Ok(out) => {
            if let Some(ref path) = cli.latex_out {
                tokio::fs::write(path, &out.latex)
                    .await
                    .with_context(|| format!("Failed to write LaTeX to {}", path.display()))?;
            }
            report_success(&cli, &out)?;
            Ok(())
        }
        Err(failure) => {
            if let (Some(path), Some(latex)) = (&cli.latex_out, &failure.latex) {
                tokio::fs::write(path, latex)
                    .await
                    .with_context(|| format!("Failed to write LaTeX to {}", path.display()))?;
            }
            report_failure(&cli, &failure)?;
            let code = if failure.kind().needs_operator() { 2 } else { 1 };
            std::process::exit(code);
        }
    }
}

/// Map CLI args to `TailorConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TailorConfig> {
    let mut builder = TailorConfig::builder()
        .endpoint(&cli.endpoint)
        .model(&cli.model)
        .compiler(&cli.compiler)
        .temperature(cli.temperature)
        .max_attempts(cli.max_attempts)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .compile_timeout_secs(cli.compile_timeout)
        .verify_preamble(!cli.no_preamble_check)
        .keep_workdir(cli.keep_files);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library(path);
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_root(dir);
    }
    if let Some(ref referer) = cli.referer {
        builder = builder.referer(referer);
    }
    if let Some(ref title) = cli.app_title {
        builder = builder.app_title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_input(cli: &Cli) -> Result<ResumeInput> {
    let resume_pdf = tokio::fs::read(&cli.resume)
        .await
        .with_context(|| format!("Failed to read resume {}", cli.resume.display()))?;
    let latex_template = tokio::fs::read_to_string(&cli.template)
        .await
        .with_context(|| format!("Failed to read template {}", cli.template.display()))?;
    let job_description = if cli.job == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read job description from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&cli.job)
            .await
            .with_context(|| format!("Failed to read job description {}", cli.job))?
    };
    if job_description.trim().is_empty() {
        anyhow::bail!("The job description is empty");
    }

    Ok(ResumeInput {
        resume_pdf,
        latex_template,
        job_description,
        api_key: None,
        keep_workdir: cli.keep_files,
    })
}

fn report_success(cli: &Cli, out: &TailoredResume) -> Result<()> {
    if cli.json {
        let summary = serde_json::json!({
            "job_id": out.job_id,
            "output": cli.output,
            "mime_type": out.mime_type(),
            "attempts": out.attempts,
            "stats": out.stats,
            "workdir": out.workdir,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  {} attempt{}  {}ms  →  {}",
        green("✔"),
        out.attempts,
        if out.attempts == 1 { "" } else { "s" },
        out.stats.total_ms,
        bold(&cli.output.display().to_string()),
    );
    eprintln!(
        "   {} generation  /  {} compile  /  {} bytes",
        dim(&format!("{}ms", out.stats.generation_ms)),
        dim(&format!("{}ms", out.stats.compile_ms)),
        dim(&out.stats.pdf_bytes.to_string()),
    );
    if let Some(ref dir) = out.workdir {
        eprintln!("   working directory kept: {}", cyan(&dir.display().to_string()));
    }
    Ok(())
}

fn report_failure(cli: &Cli, failure: &TailorFailure) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&failure.report())
                .context("Failed to serialise failure report")?
        );
        return Ok(());
    }

    eprintln!(
        "{} {} after {} attempt{}: {}",
        red("✘"),
        bold(failure.kind().as_str()),
        failure.attempts,
        if failure.attempts == 1 { "" } else { "s" },
        failure.error,
    );
    if let Some(transcript) = failure.error.transcript() {
        for line in error_excerpt(transcript).lines() {
            eprintln!("   {}", dim(line));
        }
    }
    if failure.latex.is_some() {
        let tex = best_effort_path(&cli.output);
        eprintln!("   best-effort LaTeX: {}", cyan(&tex.display().to_string()));
    }
    if let Some(ref dir) = failure.workdir {
        eprintln!("   working directory kept: {}", cyan(&dir.display().to_string()));
    }
    Ok(())
}

fn best_effort_path(output: &Path) -> PathBuf {
    output.with_extension("tex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_library() {
        let cli = Cli::try_parse_from(["resume-tailor", "resume.pdf", "-t", "t.tex", "-j", "job.txt"])
            .unwrap();
        assert_eq!(cli.compiler, DEFAULT_COMPILER);
        assert_eq!(cli.output, PathBuf::from(DEFAULT_OUTPUT));
    }
}
