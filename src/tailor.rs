//! Top-level tailoring entry points.
//!
//! [`tailor_resume`] drives one request through every stage:
//!
//! ```text
//! extract ─▶ ┌─ generate ─▶ check preamble ─▶ persist ─▶ compile ─┐ ─▶ PDF
//!            └────────────── feedback on CompileError ◀──────────┘
//! ```
//!
//! The attempt loop is bounded by `max_attempts`. Only a compile failure or
//! a rewritten preamble starts another attempt; the follow-up conversation
//! carries the rejected LaTeX and the reason it was rejected. Everything
//! else (missing compiler, unwritable work root, exhausted endpoint retries)
//! ends the request with a [`TailorFailure`] on the spot.

use crate::config::TailorConfig;
use crate::error::{TailorError, TailorFailure};
use crate::output::{ResumeInput, TailoredResume, TailoringRequest, TailoringStats};
use crate::pipeline::chat::ChatCompletionsClient;
use crate::pipeline::compile::{error_excerpt, Compiler};
use crate::pipeline::extract::extract_text;
use crate::pipeline::llm::{generate_latex, ChatMessage, GenerationBackend};
use crate::pipeline::persist::{persist_latex, write_atomic};
use crate::pipeline::postprocess::{preamble, preamble_matches};
use crate::pipeline::provider::ProviderBackend;
use crate::progress::Stage;
use crate::prompts;
use crate::workdir::WorkDir;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Tailor a resume PDF to a job description.
///
/// # Example
/// ```rust,no_run
/// use resume_tailor::{tailor_resume, ResumeInput, TailorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let input = ResumeInput {
///     resume_pdf: std::fs::read("resume.pdf")?,
///     latex_template: std::fs::read_to_string("template.tex")?,
///     job_description: "Senior Go Engineer".into(),
///     api_key: Some("sk-or-...".into()),
///     keep_workdir: false,
/// };
/// let out = tailor_resume(input, &TailorConfig::default()).await?;
/// std::fs::write("tailored.pdf", &out.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn tailor_resume(
    input: ResumeInput,
    config: &TailorConfig,
) -> Result<TailoredResume, TailorFailure> {
    let keep = input.keep_workdir || config.keep_workdir;
    let workdir = WorkDir::create(&config.work_root, keep).map_err(unstarted)?;
    let span = info_span!("tailor", job_id = %workdir.job_id());

    async move {
        let start = Instant::now();

        stage_started(config, Stage::Extract, 0);
        let extract_start = Instant::now();
        let resume_text =
            match extract_text(&input.resume_pdf, config.pdfium_library.as_deref()).await {
                Ok(text) => text,
                Err(e) => {
                    stage_failed(config, Stage::Extract, 0, elapsed_ms(extract_start), &e);
                    return Err(finish_failure(config, &workdir, e, None, 0));
                }
            };
        let extract_ms = elapsed_ms(extract_start);
        stage_complete(config, Stage::Extract, 0, extract_ms);

        let request = TailoringRequest {
            resume_text,
            job_description: input.job_description,
            latex_template: input.latex_template,
            credential: input.api_key,
        };
        run(&request, config, workdir, extract_ms, start).await
    }
    .instrument(span)
    .await
}

/// Tailor already-extracted resume text.
///
/// Runs every stage after extraction; useful when the caller has the text
/// from another source, and in tests that should not depend on pdfium.
pub async fn tailor_text(
    request: &TailoringRequest,
    config: &TailorConfig,
    keep_workdir: bool,
) -> Result<TailoredResume, TailorFailure> {
    let keep = keep_workdir || config.keep_workdir;
    let workdir = WorkDir::create(&config.work_root, keep).map_err(unstarted)?;
    let span = info_span!("tailor", job_id = %workdir.job_id());
    run(request, config, workdir, 0, Instant::now())
        .instrument(span)
        .await
}

/// Synchronous wrapper around [`tailor_resume`].
///
/// Creates a temporary tokio runtime internally.
pub fn tailor_resume_sync(
    input: ResumeInput,
    config: &TailorConfig,
) -> Result<TailoredResume, TailorFailure> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        unstarted(TailorError::Internal(format!(
            "Failed to create tokio runtime: {}",
            e
        )))
    })?;
    runtime.block_on(tailor_resume(input, config))
}

/// Tailor from files on disk and write the PDF to `output_pdf`.
///
/// The PDF is written atomically (temp file + rename). On failure, whatever
/// LaTeX the model produced is written next to the output as `<stem>.tex`
/// so it can be fixed by hand and compiled.
pub async fn tailor_files(
    resume_pdf: &Path,
    template: &Path,
    job_description: &Path,
    output_pdf: &Path,
    config: &TailorConfig,
) -> Result<TailoredResume, TailorFailure> {
    let resume_pdf_bytes = tokio::fs::read(resume_pdf)
        .await
        .map_err(|e| unstarted(TailorError::io(resume_pdf, e)))?;
    let latex_template = tokio::fs::read_to_string(template)
        .await
        .map_err(|e| unstarted(TailorError::io(template, e)))?;
    let job_description = tokio::fs::read_to_string(job_description)
        .await
        .map_err(|e| unstarted(TailorError::io(job_description, e)))?;

    let input = ResumeInput {
        resume_pdf: resume_pdf_bytes,
        latex_template,
        job_description,
        api_key: None,
        keep_workdir: config.keep_workdir,
    };
    tailor_to_file(input, output_pdf, config).await
}

/// Run [`tailor_resume`] and write its outcome next to `output_pdf`.
///
/// Shares the output handling of [`tailor_files`] with callers that build
/// the [`ResumeInput`] themselves (the CLI reads the job description from
/// stdin, for one).
pub async fn tailor_to_file(
    input: ResumeInput,
    output_pdf: &Path,
    config: &TailorConfig,
) -> Result<TailoredResume, TailorFailure> {
    match tailor_resume(input, config).await {
        Ok(out) => {
            if let Err(e) = write_atomic(output_pdf, &out.pdf).await {
                return Err(TailorFailure {
                    job_id: out.job_id,
                    error: e,
                    latex: Some(out.latex),
                    attempts: out.attempts,
                    workdir: out.workdir,
                });
            }
            info!(path = %output_pdf.display(), bytes = out.pdf.len(), "PDF written");
            Ok(out)
        }
        Err(failure) => {
            if let Some(ref latex) = failure.latex {
                let tex_path = output_pdf.with_extension("tex");
                match write_atomic(&tex_path, latex.as_bytes()).await {
                    Ok(()) => info!(path = %tex_path.display(), "best-effort LaTeX written"),
                    Err(e) => warn!("could not write best-effort LaTeX: {}", e),
                }
            }
            Err(failure)
        }
    }
}

/// Pick the generation backend for a request.
///
/// Resolution order: the pre-built backend in `config`, then a named
/// edgequake-llm provider, then the HTTP client authenticated with the
/// request credential or the configured default.
pub fn resolve_backend(
    config: &TailorConfig,
    credential: Option<&str>,
) -> Result<Arc<dyn GenerationBackend>, TailorError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref name) = config.provider_name {
        let backend =
            ProviderBackend::from_name(name, &config.model, config.temperature, config.max_tokens)?;
        return Ok(Arc::new(backend));
    }

    let key = credential
        .filter(|k| !k.trim().is_empty())
        .or_else(|| config.api_key.as_deref().filter(|k| !k.trim().is_empty()))
        .ok_or(TailorError::MissingCredential)?;
    Ok(Arc::new(ChatCompletionsClient::new(config, key)?))
}

// ── Attempt loop ─────────────────────────────────────────────────────────

async fn run(
    request: &TailoringRequest,
    config: &TailorConfig,
    workdir: WorkDir,
    extract_ms: u64,
    start: Instant,
) -> Result<TailoredResume, TailorFailure> {
    let backend = match resolve_backend(config, request.credential.as_deref()) {
        Ok(b) => b,
        Err(e) => return Err(finish_failure(config, &workdir, e, None, 0)),
    };
    info!(
        backend = backend.name(),
        resume_chars = request.resume_text.chars().count(),
        "tailoring started"
    );

    let tex_path = workdir.path().join(format!("{}.tex", config.job_file_stem));
    let compiler = Compiler::from_config(config);
    let template_preamble = preamble(&request.latex_template);

    let system = config
        .system_prompt
        .as_deref()
        .unwrap_or(prompts::DEFAULT_SYSTEM_PROMPT);
    let base = vec![
        ChatMessage::system(system),
        ChatMessage::user(prompts::build_tailoring_prompt(
            &request.resume_text,
            &request.job_description,
            &request.latex_template,
        )),
    ];
    let mut messages = base.clone();

    let mut stats = TailoringStats {
        resume_chars: request.resume_text.chars().count(),
        extract_ms,
        ..Default::default()
    };
    let mut last_latex: Option<String> = None;

    for attempt in 1..=config.max_attempts {
        stats.attempts = attempt;
        let retry_left = attempt < config.max_attempts;

        // ── Generate ─────────────────────────────────────────────────────
        stage_started(config, Stage::Generate, attempt);
        let gen_start = Instant::now();
        let generated = match generate_latex(backend.as_ref(), &messages, config).await {
            Ok(g) => g,
            Err(e) => {
                stage_failed(config, Stage::Generate, attempt, elapsed_ms(gen_start), &e);
                return Err(finish_failure(config, &workdir, e, last_latex, attempt));
            }
        };
        stats.generation_ms += generated.duration_ms;
        stats.generation_retries += generated.retries;
        let latex = generated.latex;

        if !preamble_matches(&request.latex_template, &latex) {
            let e = TailorError::PreambleMismatch {
                generated_preamble: preamble(&latex).unwrap_or_default().to_string(),
            };
            if config.verify_preamble {
                stage_failed(config, Stage::Generate, attempt, elapsed_ms(gen_start), &e);
                if retry_left {
                    if let Some(expected) = template_preamble {
                        messages = base.clone();
                        messages.push(ChatMessage::assistant(latex.clone()));
                        messages.push(ChatMessage::user(prompts::preamble_feedback(expected)));
                    }
                    last_latex = Some(latex);
                    continue;
                }
                return Err(finish_failure(config, &workdir, e, Some(latex), attempt));
            }
            warn!(attempt, "generated preamble differs from the template; continuing");
        }
        stage_complete(config, Stage::Generate, attempt, elapsed_ms(gen_start));

        // ── Persist ──────────────────────────────────────────────────────
        stage_started(config, Stage::Persist, attempt);
        let persist_start = Instant::now();
        if let Err(e) = persist_latex(&latex, &tex_path).await {
            stage_failed(config, Stage::Persist, attempt, elapsed_ms(persist_start), &e);
            return Err(finish_failure(config, &workdir, e, Some(latex), attempt));
        }
        stage_complete(config, Stage::Persist, attempt, elapsed_ms(persist_start));

        // ── Compile ──────────────────────────────────────────────────────
        stage_started(config, Stage::Compile, attempt);
        let compile_start = Instant::now();
        let outcome = compiler
            .compile(&tex_path)
            .await
            .and_then(|result| result.into_result(compiler.program()));
        let compile_ms = elapsed_ms(compile_start);
        stats.compile_ms += compile_ms;

        match outcome {
            Ok((pdf, pdf_path)) => {
                stage_complete(config, Stage::Compile, attempt, compile_ms);
                stats.latex_bytes = latex.len();
                stats.pdf_bytes = pdf.len();
                stats.total_ms = elapsed_ms(start);
                info!(
                    attempts = attempt,
                    pdf_bytes = pdf.len(),
                    total_ms = stats.total_ms,
                    "tailoring succeeded"
                );
                debug!(path = %pdf_path.display(), "compiled PDF");
                notify_complete(config, true, attempt);
                return Ok(TailoredResume {
                    job_id: workdir.job_id().to_string(),
                    pdf,
                    latex,
                    attempts: attempt,
                    stats,
                    workdir: retained_path(&workdir),
                });
            }
            Err(e @ TailorError::Compile { .. }) => {
                stage_failed(config, Stage::Compile, attempt, compile_ms, &e);
                if !retry_left {
                    return Err(finish_failure(config, &workdir, e, Some(latex), attempt));
                }
                let transcript = e.transcript().unwrap_or_default();
                let feedback = prompts::compile_feedback(&error_excerpt(transcript), transcript);
                messages = base.clone();
                messages.push(ChatMessage::assistant(latex.clone()));
                messages.push(ChatMessage::user(feedback));
                last_latex = Some(latex);
            }
            Err(e) => {
                stage_failed(config, Stage::Compile, attempt, compile_ms, &e);
                return Err(finish_failure(config, &workdir, e, Some(latex), attempt));
            }
        }
    }

    // Only reachable with max_attempts == 0, which the builder rejects.
    let e = TailorError::Internal("attempt loop ended without an outcome".into());
    Err(finish_failure(config, &workdir, e, last_latex, config.max_attempts))
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn retained_path(workdir: &WorkDir) -> Option<std::path::PathBuf> {
    workdir.retain().then(|| workdir.path().to_path_buf())
}

/// Failure before a working directory exists.
fn unstarted(error: TailorError) -> TailorFailure {
    error!(kind = %error.kind(), "tailoring failed before start: {}", error);
    TailorFailure {
        job_id: String::new(),
        error,
        latex: None,
        attempts: 0,
        workdir: None,
    }
}

fn finish_failure(
    config: &TailorConfig,
    workdir: &WorkDir,
    error: TailorError,
    latex: Option<String>,
    attempts: u32,
) -> TailorFailure {
    error!(
        kind = %error.kind(),
        attempts,
        needs_operator = error.kind().needs_operator(),
        "tailoring failed: {}",
        error
    );
    notify_complete(config, false, attempts);
    TailorFailure {
        job_id: workdir.job_id().to_string(),
        error,
        latex,
        attempts,
        workdir: retained_path(workdir),
    }
}

fn stage_started(config: &TailorConfig, stage: Stage, attempt: u32) {
    debug!(stage = %stage, attempt, "stage started");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage, attempt);
    }
}

fn stage_complete(config: &TailorConfig, stage: Stage, attempt: u32, elapsed_ms: u64) {
    info!(stage = %stage, attempt, elapsed_ms, outcome = "ok", "stage finished");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, attempt, elapsed_ms);
    }
}

fn stage_failed(
    config: &TailorConfig,
    stage: Stage,
    attempt: u32,
    elapsed_ms: u64,
    error: &TailorError,
) {
    warn!(
        stage = %stage,
        attempt,
        elapsed_ms,
        outcome = "error",
        kind = %error.kind(),
        "stage failed: {}",
        error
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_error(stage, attempt, &error.to_string());
    }
}

fn notify_complete(config: &TailorConfig, success: bool, attempts: u32) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_complete(success, attempts);
    }
}
