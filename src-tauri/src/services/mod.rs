//! External text/vision services.
//!
//! The four operations (OCR, translate, summarize, describe) share one shape:
//! `operation(input) -> text | ServiceError`. `TextService` is that shape;
//! `VisionClient` implements it over an OpenAI-compatible chat API.

pub mod language;
mod openai;
pub mod prompts;

pub use openai::VisionClient;

use crate::capture::CapturedImage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Ocr,
    Translate,
    Summarize,
    Describe,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Ocr => "OCR",
            Operation::Translate => "Translation",
            Operation::Summarize => "Summary",
            Operation::Describe => "Description",
        }
    }
}

/// What a task works on. The image variant owns the bitmap.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskInput {
    Image(CapturedImage),
    Text(String),
}

impl TaskInput {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskInput::Image(_) => "image",
            TaskInput::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Task aborted: {0}")]
    Aborted(String),

    #[error("{operation:?} does not accept {input} input")]
    UnsupportedInput {
        operation: Operation,
        input: &'static str,
    },
}

pub type ServiceFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>>;

/// One blocking-in-spirit request/response call per operation.
///
/// Retry policy, prompts and model choice are the implementor's business.
pub trait TextService: Send + Sync + 'static {
    fn run<'a>(&'a self, operation: Operation, input: &'a TaskInput) -> ServiceFuture<'a>;
}
