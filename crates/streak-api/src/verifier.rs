//! Image verification through a hosted generative model.
//!
//! Handlers only see the [`ImageVerifier`] trait; `main` decides which
//! implementation goes into the state.

use axum::body::Bytes;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Appended to the challenge description before it is sent to the model.
pub const YES_NO_INSTRUCTION: &str =
    "respond with ONLY yes or no. does the image match the previous statement?";

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub mime_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("image verification is not configured")]
    Disabled,

    #[error("request to model failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no text")]
    EmptyResponse,
}

pub trait ImageVerifier: Send + Sync {
    /// Ask whether `image` matches `description`. Returns the model's raw
    /// reply, unvalidated.
    fn verify<'a>(
        &'a self,
        image: &'a ImageUpload,
        description: &'a str,
    ) -> BoxFuture<'a, Result<String, VerifyError>>;
}

pub fn build_prompt(description: &str) -> String {
    format!("{} {}", description.trim_end(), YES_NO_INSTRUCTION)
}

/// Used when no API key is configured.
pub struct DisabledVerifier;

impl ImageVerifier for DisabledVerifier {
    fn verify<'a>(
        &'a self,
        _image: &'a ImageUpload,
        _description: &'a str,
    ) -> BoxFuture<'a, Result<String, VerifyError>> {
        Box::pin(async { Err(VerifyError::Disabled) })
    }
}

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiVerifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiVerifier {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate(&self, image: &ImageUpload, description: &str) -> Result<String, VerifyError> {
        let body = request_body(image, description);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VerifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = response_text(parsed)?;
        debug!("Model {} answered {:?}", self.model, text);
        Ok(text)
    }
}

impl ImageVerifier for GeminiVerifier {
    fn verify<'a>(
        &'a self,
        image: &'a ImageUpload,
        description: &'a str,
    ) -> BoxFuture<'a, Result<String, VerifyError>> {
        Box::pin(self.generate(image, description))
    }
}

// -- Wire types --

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn request_body(image: &ImageUpload, description: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: build_prompt(description),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.clone(),
                        data: B64.encode(&image.bytes),
                    },
                },
            ],
        }],
    }
}

/// Text of the first candidate, all text parts joined.
fn response_text(response: GenerateResponse) -> Result<String, VerifyError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or(VerifyError::EmptyResponse)?;

    let text: String = content
        .parts
        .into_iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        })
        .collect();

    if text.is_empty() {
        return Err(VerifyError::EmptyResponse);
    }
    Ok(text)
}
