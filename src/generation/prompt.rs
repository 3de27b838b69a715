// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt assembly for questions over a notes vault

/// Instructions prepended whenever notes context is supplied
pub const NOTES_INSTRUCTIONS: &str = "You are an assistant for a user's personal notes from their Obsidian vault. \
Answer the question based ONLY on the context provided from their notes.\n\
- Formulate your answer strictly from the information within the notes.\n\
- If the answer is not found in the context, say explicitly that you couldn't find the information in the notes. Do not use external knowledge or make assumptions.\n\
- Respond in the same language as the user's question.\n\
- Keep your answers concise and directly relevant to the question.";

/// Cut `context` to at most `max_chars` characters, appending a marker when
/// anything was dropped. Never splits a UTF-8 character.
pub fn truncate_context(context: &str, max_chars: usize) -> String {
    match context.char_indices().nth(max_chars) {
        None => context.to_string(),
        Some((byte_index, _)) => {
            tracing::warn!(
                "Notes context exceeded {} characters, truncating",
                max_chars
            );
            format!(
                "{}\n\n[... notes truncated: context exceeded {} characters ...]",
                &context[..byte_index],
                max_chars
            )
        }
    }
}

/// Final prompt sent to the model.
///
/// Without (non-blank) context the question is sent unchanged.
pub fn build_prompt(question: &str, context: Option<&str>, max_context_chars: usize) -> String {
    match context.filter(|c| !c.trim().is_empty()) {
        None => question.to_string(),
        Some(context) => format!(
            "{}\n\nCONTEXT FROM NOTES:\n---\n{}\n---\n\nQUESTION: {}",
            NOTES_INSTRUCTIONS,
            truncate_context(context, max_context_chars),
            question
        ),
    }
}
