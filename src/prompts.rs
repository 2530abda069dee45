//! Prompt construction for document analysis.
//!
//! Centralising the prompt here keeps the analysis adapter free of prompt
//! text and lets unit tests inspect exactly what would be sent to the
//! inference endpoint without a live model.

/// Upper bound on OCR text embedded in the prompt. Longer text is cut at
/// this many characters and marked with [`TRUNCATION_MARKER`].
pub const MAX_PROMPT_TEXT_CHARS: usize = 2000;

/// Appended when the OCR text was truncated to fit the prompt.
pub const TRUNCATION_MARKER: &str = "...";

/// Build the analysis prompt around (already truncated) OCR text.
///
/// The model is asked for a two-section reply in Indonesian: `Penjelasan:`
/// (explanation) and `Ringkasan:` (bulleted summary). The section labels
/// are load-bearing: [`crate::pipeline::analyze`] parses the completion by
/// matching them.
pub fn analysis_prompt(truncated_text: &str) -> String {
    format!(
        r#"Analisis teks berikut dari hasil OCR. Berikan penjelasan singkat dan ringkasan dalam bahasa Indonesia:

Teks:
"""
{truncated_text}
"""

Jawab dalam format:
Penjelasan: [penjelasan singkat tentang isi dokumen]
Ringkasan:
- [poin 1]
- [poin 2]
- [poin 3]"#
    )
}

/// Cut `text` to [`MAX_PROMPT_TEXT_CHARS`] characters, appending the
/// truncation marker when anything was dropped.
pub fn truncate_for_prompt(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(MAX_PROMPT_TEXT_CHARS) {
        Some((byte_idx, _)) => {
            let mut out = text[..byte_idx].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text.to_string(),
    }
}
