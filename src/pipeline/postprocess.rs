//! Post-processing: deterministic cleanup of model-generated LaTeX.
//!
//! Even well-prompted models wrap their answer in ` ```latex ... ``` `
//! fences, answer with CRLF line endings, or leak zero-width characters from
//! the resume text. None of that is valid LaTeX source, and the compiler
//! reports it with confusing errors far from the cause.
//!
//! The rules are cheap string/regex passes that never touch content between
//! the fences. They run in this order:
//!
//! 1. Strip the outer code fence (opener with optional language tag, closer)
//! 2. Normalise line endings (CRLF / CR → LF)
//! 3. Remove invisible Unicode (BOM, zero-width spaces and joiners)
//! 4. Ensure the source ends with exactly one newline
//!
//! The module also holds the preamble comparison used to detect a model that
//! rewrote the template's `\usepackage` / macro block.

use once_cell::sync::Lazy;
use regex::Regex;

const BEGIN_DOCUMENT: &str = r"\begin{document}";

/// Apply all post-processing rules to the raw model output.
pub fn clean_latex(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip the outer code fence ──────────────────────────────────────

static RE_FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+-]*[ \t]*(?:\r?\n|$)").unwrap());

static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\r?\n)?[ \t]*```\s*$").unwrap());

/// Remove a leading fence opener and, when one was present, the matching
/// trailing closer.
///
/// Unfenced input is returned unchanged, so the function is idempotent. A
/// truncated answer with an opener but no closer loses only the opener.
pub fn strip_code_fences(input: &str) -> String {
    let Some(open) = RE_FENCE_OPEN.find(input) else {
        return input.to_string();
    };
    let body = &input[open.end()..];
    match RE_FENCE_CLOSE.find(body) {
        Some(close) => body[..close.start()].to_string(),
        None => body.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────
//
// pdfium hands these through from the resume's text layer and models copy
// them into the output. pdflatex either rejects them outright or typesets a
// missing-glyph box.

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 4: Exactly one trailing newline ─────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

// ── Preamble comparison ─────────────────────────────────────────────────────

/// Everything before `\begin{document}`, or `None` if the source has none.
pub fn preamble(source: &str) -> Option<&str> {
    source.find(BEGIN_DOCUMENT).map(|idx| &source[..idx])
}

/// Whether `generated` kept the template's preamble.
///
/// Whitespace and `%` comments are ignored, since models reflow both freely.
/// A template without `\begin{document}` has nothing to compare and always
/// matches; a generated source that lost `\begin{document}` never does.
pub fn preamble_matches(template: &str, generated: &str) -> bool {
    match preamble(template) {
        None => true,
        Some(expected) => match preamble(generated) {
            None => false,
            Some(actual) => normalise_preamble(expected) == normalise_preamble(actual),
        },
    }
}

fn normalise_preamble(preamble: &str) -> String {
    preamble
        .lines()
        .map(strip_comment)
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace() && *c != '\u{FEFF}')
        .collect()
}

/// Cut a line at its first unescaped `%`.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'%' {
            let backslashes = bytes[..i].iter().rev().take_while(|&&c| c == b'\\').count();
            if backslashes % 2 == 0 {
                return &line[..i];
            }
        }
    }
    line
}
