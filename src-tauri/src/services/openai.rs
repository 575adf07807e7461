//! OpenAI-compatible chat completions client for the four operations.
//!
//! Images go out as `data:image/png;base64,...` URLs inside an
//! `image_url` content part; text goes out as a plain user message.
//! Non-streaming: the user already clicked and expects a brief wait, and a
//! result is only shown once it is complete.

use super::language::translation_target;
use super::prompts::{self, MAX_TOKENS};
use super::{Operation, ServiceError, ServiceFuture, TaskInput, TextService};
use crate::capture::CapturedImage;
use crate::config::AppConfig;
use serde_json::{json, Value};

pub struct VisionClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.api_key, &config.vision_model, &config.api_base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, operation: Operation, input: &TaskInput) -> Result<String, ServiceError> {
        let body = build_request_body(&self.model, operation, input)?;

        log::info!(
            "[SERVICE] {} request ({} input, model {})",
            operation.label(),
            input.kind(),
            self.model
        );
        let start = std::time::Instant::now();

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !status.is_success() {
            log::error!("[SERVICE] API returned {}: {}", status, truncate(&text, 300));
            return Err(classify_status(status.as_u16(), text));
        }

        let content = extract_content(&text)?;
        log::info!(
            "[SERVICE] {} complete: {} chars in {}ms",
            operation.label(),
            content.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(content)
    }
}

impl TextService for VisionClient {
    fn run<'a>(&'a self, operation: Operation, input: &'a TaskInput) -> ServiceFuture<'a> {
        Box::pin(self.complete(operation, input))
    }
}

/// Chat-completions request body for `operation` on `input`.
pub(crate) fn build_request_body(
    model: &str,
    operation: Operation,
    input: &TaskInput,
) -> Result<Value, ServiceError> {
    let content = match (operation, input) {
        (Operation::Ocr, TaskInput::Image(image)) => image_content(prompts::OCR_PROMPT, image)?,
        (Operation::Describe, TaskInput::Image(image)) => {
            image_content(prompts::DESCRIBE_PROMPT, image)?
        }
        (Operation::Summarize, TaskInput::Image(image)) => {
            image_content(prompts::SUMMARIZE_IMAGE_PROMPT, image)?
        }
        (Operation::Summarize, TaskInput::Text(text)) => {
            Value::String(prompts::summarize_text_message(text))
        }
        (Operation::Translate, TaskInput::Text(text)) => {
            let target = translation_target(text);
            log::info!("[SERVICE] Translating into {}", target.name());
            Value::String(prompts::translate_message(text, target.name()))
        }
        (operation, input) => {
            return Err(ServiceError::UnsupportedInput {
                operation,
                input: input.kind(),
            })
        }
    };

    Ok(json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": [
            {
                "role": "user",
                "content": content,
            }
        ]
    }))
}

fn image_content(prompt: &str, image: &CapturedImage) -> Result<Value, ServiceError> {
    let url = image
        .to_png_data_url()
        .map_err(|e| ServiceError::Encode(e.to_string()))?;
    Ok(json!([
        { "type": "text", "text": prompt },
        { "type": "image_url", "image_url": { "url": url } }
    ]))
}

/// Text of `choices[0].message.content`.
pub(crate) fn extract_content(body: &str) -> Result<String, ServiceError> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
    let content = parsed
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| ServiceError::InvalidResponse("no choices[0].message.content".to_string()))?;

    match content.as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(ServiceError::EmptyResponse),
    }
}

fn classify_status(status: u16, body: String) -> ServiceError {
    match status {
        401 | 403 => ServiceError::Auth { status, body },
        429 => ServiceError::RateLimited(body),
        _ => ServiceError::Api { status, body },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn image() -> TaskInput {
        TaskInput::Image(CapturedImage::new(RgbaImage::new(8, 8)))
    }

    #[test]
    fn ocr_body_carries_png_data_url_and_token_cap() {
        let body = build_request_body("gpt-4o", Operation::Ocr, &image()).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn translate_body_targets_the_other_language() {
        let body = build_request_body(
            "gpt-4o",
            Operation::Translate,
            &TaskInput::Text("こんにちは".to_string()),
        )
        .unwrap();
        let message = body["messages"][0]["content"].as_str().unwrap();
        assert!(message.contains("into English"));
        assert!(message.ends_with("こんにちは"));
    }

    #[test]
    fn summarize_accepts_text_and_images() {
        assert!(build_request_body("m", Operation::Summarize, &image()).is_ok());
        assert!(build_request_body("m", Operation::Summarize, &TaskInput::Text("x".into())).is_ok());
    }

    #[test]
    fn mismatched_input_is_rejected() {
        let err = build_request_body("m", Operation::Ocr, &TaskInput::Text("x".into())).unwrap_err();
        assert_eq!(
            err,
            ServiceError::UnsupportedInput {
                operation: Operation::Ocr,
                input: "text"
            }
        );
        assert!(build_request_body("m", Operation::Translate, &image()).is_err());
        assert!(build_request_body("m", Operation::Describe, &TaskInput::Text("x".into())).is_err());
    }

    #[test]
    fn extract_reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "hello");
    }

    #[test]
    fn extract_rejects_blank_and_malformed() {
        let blank = r#"{"choices":[{"message":{"content":"  "}}]}"#;
        assert_eq!(extract_content(blank), Err(ServiceError::EmptyResponse));
        let null = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(extract_content(null), Err(ServiceError::EmptyResponse));
        assert!(matches!(
            extract_content("{}"),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(classify_status(401, String::new()), ServiceError::Auth { .. }));
        assert!(matches!(classify_status(429, String::new()), ServiceError::RateLimited(_)));
        assert!(matches!(classify_status(500, String::new()), ServiceError::Api { status: 500, .. }));
    }
}
