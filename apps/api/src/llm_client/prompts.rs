// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting instructions.

/// Keeps the model inside the retrieved context.
pub const GROUNDING_INSTRUCTION: &str = "\
    Use ONLY the assessments listed in the retrieved context. \
    Do NOT invent assessment names, URLs, durations or support flags. \
    Copy URLs exactly as they appear in the context.";

/// Output must be the bare table so it can be parsed.
pub const TABLE_ONLY_INSTRUCTION: &str =
    "Return ONLY the markdown table (no additional text, no code fences).";
