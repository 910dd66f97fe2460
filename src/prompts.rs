//! Prompts for LLM-based resume tailoring.
//!
//! Every instruction the model sees is assembled here so prompt changes never
//! touch retry or error-handling code, and unit tests can inspect the exact
//! text without a live endpoint.
//!
//! Callers can override the system message via
//! [`crate::config::TailorConfig::system_prompt`]; the tailoring instruction
//! itself is always built by [`build_tailoring_prompt`].

/// Default system message.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an expert resume writer and LaTeX assistant. You rewrite resume content to fit a \
job description without inventing anything, and you return LaTeX that compiles unchanged.";

/// Role framing that opens the tailoring instruction.
const ROLE_FRAMING: &str = "You are a highly skilled professional resume assistant and LaTeX expert.";

/// The non-negotiable rules, in the order the model should weigh them.
const CONSTRAINTS: &str = r#"Task:
You are given a job description, a LaTeX resume template and the plain text of the candidate's current resume.
Tailor the resume to the job description and return it rendered through the template.

Follow these rules precisely:

1. TRUTHFULNESS
   - Do NOT add any experience, skill, employer, project, metric or outcome that is not in the resume text.
   - You may rephrase and reorder to highlight what is relevant; never exaggerate or invent.
   - Keep every section in its own context: project content stays a project, experience stays experience.
   - Only use keywords from the job description where the resume genuinely supports them.

2. STRUCTURAL FIDELITY
   - Keep the preamble (everything before \begin{document}) byte-for-byte identical to the template.
   - Do NOT add, remove or change any \usepackage, \newcommand, \renewcommand or other macro definition.
   - Use the template's own commands and environments; only the human-readable content inside them may change.

3. COMPILABILITY
   - The output must be a complete document that compiles without errors.
   - Every { has a matching }, every \begin{...} a matching \end{...}.
   - Do NOT use any command the template does not define or load.
   - Keep the resume to a single page and keep section lengths close to the template's.

4. CHARACTER ESCAPING (most common cause of failure)
   - Every literal & % $ # _ in content you write MUST be escaped with a backslash: \& \% \$ \# \_
   - Write ~ as \textasciitilde{}, ^ as \textasciicircum{} and \ as \textbackslash{} inside content.
   - An unescaped % silently comments out the rest of the line, including closing braces.

5. OUTPUT FORMAT
   - Return ONLY the full LaTeX source, starting with \documentclass.
   - Do NOT wrap it in ``` fences.
   - Do NOT return JSON, explanations or commentary."#;

/// Maximum transcript bytes fed back to the model on a retry.
///
/// Compiler transcripts run to tens of kilobytes of font-loading noise; the
/// error is almost always in the last few kilobytes.
pub const FEEDBACK_TRANSCRIPT_LIMIT: usize = 4000;

/// Build the tailoring instruction.
///
/// Order is fixed: role framing, constraints, job description, template,
/// resume text. Inputs are embedded verbatim.
pub fn build_tailoring_prompt(resume_text: &str, job_description: &str, template: &str) -> String {
    format!(
        "{ROLE_FRAMING}\n\n{CONSTRAINTS}\n\n\
Job description:\n\"\"\"\n{job_description}\n\"\"\"\n\n\
LaTeX template:\n\"\"\"\n{template}\n\"\"\"\n\n\
Resume text (plain):\n\"\"\"\n{resume_text}\n\"\"\"\n"
    )
}

/// Follow-up message after the previous answer failed to compile.
///
/// `excerpt` is the compiler's error lines; the transcript tail is appended
/// for context and capped at [`FEEDBACK_TRANSCRIPT_LIMIT`] bytes.
pub fn compile_feedback(excerpt: &str, transcript: &str) -> String {
    let tail = tail_on_char_boundary(transcript, FEEDBACK_TRANSCRIPT_LIMIT);
    let excerpt = if excerpt.trim().is_empty() {
        "(no error lines found; see the log tail)"
    } else {
        excerpt
    };
    format!(
        "The LaTeX you returned failed to compile.\n\n\
Compiler errors:\n{excerpt}\n\n\
End of the compiler log:\n\"\"\"\n{tail}\n\"\"\"\n\n\
Fix the cause (usually an unescaped & % $ # _ or an unbalanced brace) and return the \
complete corrected LaTeX document. Apply every rule from the first message. \
Return ONLY the LaTeX source."
    )
}

/// Follow-up message after the previous answer rewrote the preamble.
pub fn preamble_feedback(template_preamble: &str) -> String {
    format!(
        "The LaTeX you returned changed the preamble. Everything before \\begin{{document}} \
must be exactly:\n\"\"\"\n{template_preamble}\n\"\"\"\n\n\
Return the complete document again with this preamble unchanged. \
Return ONLY the LaTeX source."
    )
}

fn tail_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\\documentclass{article}\\begin{document}NAME\\end{document}";

    #[test]
    fn sections_appear_in_fixed_order() {
        let p = build_tailoring_prompt("RESUME-TEXT", "JOB-TEXT", TEMPLATE);
        let role = p.find("resume assistant and LaTeX expert").unwrap();
        let rules = p.find("TRUTHFULNESS").unwrap();
        let jd = p.find("JOB-TEXT").unwrap();
        let tpl = p.find(TEMPLATE).unwrap();
        let resume = p.find("RESUME-TEXT").unwrap();
        assert!(role < rules && rules < jd && jd < tpl && tpl < resume);
    }

    #[test]
    fn escaping_rule_names_every_special_character() {
        let p = build_tailoring_prompt("r", "j", TEMPLATE);
        for escaped in ["\\&", "\\%", "\\$", "\\#", "\\_"] {
            assert!(p.contains(escaped), "missing {escaped}");
        }
        assert!(p.contains("Do NOT return JSON"));
        assert!(p.contains("byte-for-byte"));
    }

    #[test]
    fn job_description_change_changes_prompt() {
        let a = build_tailoring_prompt("same resume", "Senior Go Engineer", TEMPLATE);
        let b = build_tailoring_prompt("same resume", "Staff Rust Engineer", TEMPLATE);
        assert_ne!(a, b);
    }

    #[test]
    fn inputs_are_embedded_verbatim() {
        let resume = "José Núñez — 50% faster builds & C# tooling";
        let p = build_tailoring_prompt(resume, "jd", TEMPLATE);
        assert!(p.contains(resume));
    }

    #[test]
    fn compile_feedback_keeps_transcript_tail() {
        let transcript = format!("{}! Missing $ inserted.\nl.42 ...", "x".repeat(10_000));
        let msg = compile_feedback("! Missing $ inserted.", &transcript);
        assert!(msg.contains("l.42"));
        assert!(msg.len() < FEEDBACK_TRANSCRIPT_LIMIT + 1000);
    }

    #[test]
    fn compile_feedback_without_excerpt() {
        let msg = compile_feedback("  ", "log");
        assert!(msg.contains("no error lines found"));
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let s = "ééééé";
        let t = tail_on_char_boundary(s, 3);
        assert_eq!(t, "é");
    }

    #[test]
    fn preamble_feedback_quotes_template_preamble() {
        let msg = preamble_feedback("\\documentclass{article}");
        assert!(msg.contains("\\documentclass{article}"));
        assert!(msg.contains("\\begin{document}"));
    }
}
