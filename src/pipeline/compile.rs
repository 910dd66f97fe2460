//! Compilation: run the LaTeX compiler twice and classify the outcome.
//!
//! Two passes are needed so cross-references and `lastpage`-style counters
//! settle. Each pass runs non-interactively in the source file's directory
//! with `-output-directory` pointing there too, under its own timeout.
//! `kill_on_drop` reaps a compiler that outlives its timeout.
//!
//! Both passes always run, even if the first exits non-zero, so the
//! transcript shows whether the error is stable; only a missing tool or a
//! timed-out pass stops early. Success additionally requires the PDF to
//! exist: `pdflatex` happily exits 0 on a document with no pages.
//!
//! Auxiliary files (`.aux`, `.log`, `.out`) are left in place; the request's
//! working directory owns their cleanup.

use crate::config::TailorConfig;
use crate::error::TailorError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Number of compiler passes per compile.
pub const PASSES: u8 = 2;

/// Most error lines kept by [`error_excerpt`].
const EXCERPT_MAX_LINES: usize = 24;

/// Why a compile produced no PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileFailureKind {
    /// The executable could not be started.
    ToolMissing,
    /// A pass failed, timed out, or no PDF was written.
    CompileError,
}

/// Terminal value of the compile stage.
#[derive(Debug, Clone)]
pub enum CompilationResult {
    Success {
        pdf: Vec<u8>,
        pdf_path: PathBuf,
    },
    Failure {
        kind: CompileFailureKind,
        /// Captured stdout/stderr of every pass that ran, labelled per pass.
        log: String,
        /// The first pass that failed (1-based).
        pass: u8,
    },
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompilationResult::Success { .. })
    }

    /// Convert into the pipeline's error type; `tool` names the compiler in
    /// a [`TailorError::ToolMissing`].
    pub fn into_result(self, tool: &str) -> Result<(Vec<u8>, PathBuf), TailorError> {
        match self {
            CompilationResult::Success { pdf, pdf_path } => Ok((pdf, pdf_path)),
            CompilationResult::Failure {
                kind: CompileFailureKind::ToolMissing,
                ..
            } => Err(TailorError::ToolMissing {
                tool: tool.to_string(),
            }),
            CompilationResult::Failure {
                kind: CompileFailureKind::CompileError,
                log,
                pass,
            } => {
                let excerpt = error_excerpt(&log);
                let summary = excerpt
                    .lines()
                    .next()
                    .map(str::to_string)
                    .unwrap_or_else(|| "no PDF was produced".to_string());
                Err(TailorError::Compile {
                    pass,
                    summary,
                    transcript: log,
                })
            }
        }
    }
}

/// A configured LaTeX compiler.
#[derive(Debug, Clone)]
pub struct Compiler {
    program: String,
    args: Vec<String>,
    pass_timeout: Duration,
}

impl Compiler {
    /// `args` come before `-output-directory=<dir>` and the source file name.
    pub fn new(program: impl Into<String>, args: Vec<String>, pass_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            pass_timeout,
        }
    }

    pub fn from_config(config: &TailorConfig) -> Self {
        Self::new(
            config.compiler.clone(),
            config.compiler_args.clone(),
            Duration::from_secs(config.compile_timeout_secs),
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Compile `tex_path` into a same-named PDF beside it.
    ///
    /// Returns `Err` only for I/O failures around the compiler (resolving the
    /// directory, reading the PDF); compiler outcomes are a
    /// [`CompilationResult`].
    pub async fn compile(&self, tex_path: &Path) -> Result<CompilationResult, TailorError> {
        let file_name = tex_path.file_name().ok_or_else(|| {
            TailorError::io(
                tex_path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
            )
        })?;
        let parent = match tex_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = tokio::fs::canonicalize(parent)
            .await
            .map_err(|e| TailorError::io(parent, e))?;
        let pdf_path = dir.join(tex_path.with_extension("pdf").file_name().unwrap_or(file_name));

        // A PDF from an earlier attempt must not count as this one's output,
        // and a truncated .aux from a halted run must not poison pass 1.
        let aux_path = pdf_path.with_extension("aux");
        for stale in [&pdf_path, &aux_path] {
            match tokio::fs::remove_file(stale).await {
                Ok(()) => debug!(path = %stale.display(), "removed stale output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(TailorError::io(stale, e)),
            }
        }

        let mut log = String::new();
        let mut first_failed: Option<u8> = None;

        for pass in 1..=PASSES {
            let start = Instant::now();
            let mut cmd = Command::new(&self.program);
            cmd.args(&self.args)
                .arg(format!("-output-directory={}", dir.display()))
                .arg(file_name)
                .current_dir(&dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let child = match cmd.spawn() {
                Ok(child) => child,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                    ) =>
                {
                    warn!(program = %self.program, "compiler could not be started: {}", e);
                    return Ok(CompilationResult::Failure {
                        kind: CompileFailureKind::ToolMissing,
                        log: format!("{}: {}", self.program, e),
                        pass,
                    });
                }
                Err(e) => return Err(TailorError::io(&self.program, e)),
            };

            log.push_str(&format!("=== pass {pass} ===\n"));

            let output = match timeout(self.pass_timeout, child.wait_with_output()).await {
                Ok(result) => result.map_err(|e| TailorError::io(&self.program, e))?,
                Err(_) => {
                    warn!(pass, "compiler pass timed out after {:?}", self.pass_timeout);
                    log.push_str(&format!(
                        "pass {pass} timed out after {}s and was killed\n",
                        self.pass_timeout.as_secs()
                    ));
                    return Ok(CompilationResult::Failure {
                        kind: CompileFailureKind::CompileError,
                        log,
                        pass: first_failed.unwrap_or(pass),
                    });
                }
            };

            log.push_str(&String::from_utf8_lossy(&output.stdout));
            log.push_str(&String::from_utf8_lossy(&output.stderr));
            if !log.ends_with('\n') {
                log.push('\n');
            }

            debug!(
                pass,
                status = ?output.status.code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "compiler pass finished"
            );

            if !output.status.success() && first_failed.is_none() {
                first_failed = Some(pass);
            }
        }

        if let Some(pass) = first_failed {
            return Ok(CompilationResult::Failure {
                kind: CompileFailureKind::CompileError,
                log,
                pass,
            });
        }

        match tokio::fs::read(&pdf_path).await {
            Ok(pdf) => Ok(CompilationResult::Success { pdf, pdf_path }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log.push_str(&format!(
                    "compiler exited successfully but {} was not written\n",
                    pdf_path.display()
                ));
                Ok(CompilationResult::Failure {
                    kind: CompileFailureKind::CompileError,
                    log,
                    pass: PASSES,
                })
            }
            Err(e) => Err(TailorError::io(&pdf_path, e)),
        }
    }
}

static RE_FILE_LINE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+\.(?:tex|sty|cls):\d+: ").unwrap());

static RE_LINE_CONTEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^l\.\d+").unwrap());

/// Pull the actionable lines out of a compiler transcript.
///
/// Keeps `!`-prefixed errors, `file:line:` errors (from `-file-line-error`)
/// and the `l.N` line that shows where TeX stopped. Lines repeated by the
/// second pass are dropped.
pub fn error_excerpt(transcript: &str) -> String {
    let lines: Vec<&str> = transcript.lines().collect();
    let mut kept: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !(line.starts_with('!') || RE_FILE_LINE_ERROR.is_match(line)) {
            continue;
        }
        if !kept.contains(line) {
            kept.push(line);
        }
        if let Some(ctx) = lines
            .iter()
            .skip(i + 1)
            .take(8)
            .take_while(|l| !l.starts_with('!'))
            .find(|l| RE_LINE_CONTEXT.is_match(l))
        {
            if !kept.contains(ctx) {
                kept.push(ctx);
            }
        }
        if kept.len() >= EXCERPT_MAX_LINES {
            break;
        }
    }

    kept.join("\n")
}
