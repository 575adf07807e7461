//! Prompt constants for the four vision/text operations.
//!
//! One user message per request; no system prompt. The model answers in
//! whatever language the prompt and input suggest.

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Output cap for every request.
pub const MAX_TOKENS: u32 = 1000;

pub const OCR_PROMPT: &str =
    "Extract all text in this image. Do not preserve the layout; output only the text.";

pub const DESCRIBE_PROMPT: &str = "Describe the contents of this image in detail.";

pub const SUMMARIZE_IMAGE_PROMPT: &str = "Summarize the text in this image.";

pub fn summarize_text_message(text: &str) -> String {
    format!("Summarize the following text:\n\n{}", text)
}

pub fn translate_message(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following text into {}:\n\n{}",
        target_language, text
    )
}
