//! Pipeline stages for resume tailoring.
//!
//! Each submodule implements exactly one step, so every stage is testable on
//! its own and the generation backend or compiler can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ llm ──▶ postprocess ──▶ persist ──▶ compile
//! (pdfium)    (chat)   (fences)        (.tex)      (2 passes)
//!               ▲                                    │
//!               └──────── transcript feedback ───────┘
//! ```
//!
//! 1. [`extract`]: pull the text layer out of the resume PDF bytes;
//!    runs in `spawn_blocking` because pdfium is synchronous
//! 2. [`llm`]: the [`llm::GenerationBackend`] seam plus the
//!    transient-retry loop; [`chat`] and [`provider`] implement it
//! 3. [`postprocess`]: deterministic cleanup of the model's answer and the
//!    preamble check
//! 4. [`persist`]: write the LaTeX to the request's working directory
//! 5. [`compile`]: run the LaTeX compiler twice and classify the outcome

pub mod chat;
pub mod compile;
pub mod extract;
pub mod llm;
pub mod persist;
pub mod postprocess;
pub mod provider;
