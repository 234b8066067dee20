// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction appended to every prompt that reads candidate material.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Base every statement on what the resume actually contains. \
    Do NOT invent employers, degrees, dates, or skills. \
    If the resume does not show something, say so rather than guessing.";
