//! HTTP client for OpenAI-compatible chat-completions endpoints (OpenRouter
//! by default).
//!
//! The response body is decoded exactly once, here, into an [`Envelope`]:
//! generated text, an upstream error message, or a malformed body kept
//! verbatim for diagnostics. Rate-limit HTML pages, truncated JSON and
//! `200 OK` bodies without `choices` all land in [`Envelope::Malformed`]
//! instead of surfacing as a parse panic somewhere downstream.

use crate::config::TailorConfig;
use crate::error::TailorError;
use crate::pipeline::llm::{ChatMessage, GenerationBackend};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Raw bodies longer than this many bytes are truncated inside error values.
pub const RAW_BODY_LIMIT: usize = 16 * 1024;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    choices: Option<Vec<RawChoice>>,
    #[serde(default)]
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawError {
    Object {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<serde_json::Value>,
    },
    Text(String),
}

/// A decoded endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// The first choice's message content.
    Success { text: String },
    /// The endpoint reported an error.
    Error { status: Option<u16>, message: String },
    /// The body did not have the expected shape.
    Malformed { detail: String, raw_body: String },
}

impl Envelope {
    pub fn into_result(self) -> Result<String, TailorError> {
        match self {
            Envelope::Success { text } => Ok(text),
            Envelope::Error { status, message } => Err(TailorError::Generation { status, message }),
            Envelope::Malformed { detail, raw_body } => {
                Err(TailorError::MalformedResponse { detail, raw_body })
            }
        }
    }
}

/// Decode a response body.
///
/// `status` is the HTTP status code; a non-2xx status with no decodable
/// error object is reported as malformed, since the body (an HTML gateway
/// page, say) is then the only diagnostic.
pub fn decode_envelope(status: u16, body: &str) -> Envelope {
    let success = (200..300).contains(&status);

    let raw: RawEnvelope = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(e) => {
            return Envelope::Malformed {
                detail: format!("HTTP {status}: body is not valid JSON ({e})"),
                raw_body: truncate(body),
            }
        }
    };

    if let Some(err) = raw.error {
        let message = match err {
            RawError::Object { message, code } => {
                let message = message.unwrap_or_else(|| "unspecified error".to_string());
                match code {
                    Some(code) => format!("{message} (code {code})"),
                    None => message,
                }
            }
            RawError::Text(message) => message,
        };
        // OpenRouter embeds the real upstream code in the body of a 200.
        let status = if success { None } else { Some(status) };
        return Envelope::Error { status, message };
    }

    if !success {
        return Envelope::Malformed {
            detail: format!("HTTP {status} without an error object"),
            raw_body: truncate(body),
        };
    }

    let choices = match raw.choices {
        Some(choices) if !choices.is_empty() => choices,
        Some(_) => {
            return Envelope::Malformed {
                detail: "response has an empty 'choices' list".into(),
                raw_body: truncate(body),
            }
        }
        None => {
            return Envelope::Malformed {
                detail: "response has no 'choices' field".into(),
                raw_body: truncate(body),
            }
        }
    };

    match choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
    {
        Some(text) if !text.trim().is_empty() => Envelope::Success { text },
        Some(_) => Envelope::Malformed {
            detail: "first choice has empty content".into(),
            raw_body: truncate(body),
        },
        None => Envelope::Malformed {
            detail: "first choice has no message content".into(),
            raw_body: truncate(body),
        },
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= RAW_BODY_LIMIT {
        return body.to_string();
    }
    let mut end = RAW_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… [{} bytes truncated]", &body[..end], body.len() - end)
}

/// Chat-completions client authenticated with a bearer token.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ChatCompletionsClient {
    /// Build a client for `api_key` using the endpoint, model and timeout
    /// from `config`.
    pub fn new(config: &TailorConfig, api_key: &str) -> Result<Self, TailorError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| TailorError::InvalidConfig("API key contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref referer) = config.referer {
            let v = HeaderValue::from_str(referer)
                .map_err(|_| TailorError::InvalidConfig("referer is not a valid header".into()))?;
            headers.insert("HTTP-Referer", v);
        }
        if let Some(ref title) = config.app_title {
            let v = HeaderValue::from_str(title)
                .map_err(|_| TailorError::InvalidConfig("app title is not a valid header".into()))?;
            headers.insert("X-Title", v);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| TailorError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl GenerationBackend for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, TailorError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status, body_len = body.len(), "chat-completions response");

        decode_envelope(status, &body).into_result()
    }
}

fn transport_error(e: reqwest::Error) -> TailorError {
    TailorError::Transport {
        detail: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::Role;

    #[test]
    fn decodes_first_choice() {
        let body = r#"{"id":"gen-1","choices":[{"message":{"role":"assistant","content":"\\documentclass{article}"}}]}"#;
        assert_eq!(
            decode_envelope(200, body),
            Envelope::Success {
                text: "\\documentclass{article}".into()
            }
        );
    }

    #[test]
    fn missing_choices_is_malformed_and_keeps_raw_body() {
        let body = r#"{"id":"gen-1","object":"chat.completion"}"#;
        match decode_envelope(200, body) {
            Envelope::Malformed { detail, raw_body } => {
                assert!(detail.contains("choices"));
                assert_eq!(raw_body, body);
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
        let err = decode_envelope(200, body).into_result().unwrap_err();
        assert_eq!(err.raw_body(), Some(body));
    }

    #[test]
    fn error_object_becomes_generation_error() {
        let body = r#"{"error":{"message":"No auth credentials found","code":401}}"#;
        let env = decode_envelope(401, body);
        assert_eq!(
            env,
            Envelope::Error {
                status: Some(401),
                message: "No auth credentials found (code 401)".into()
            }
        );
        assert!(matches!(
            env.into_result(),
            Err(TailorError::Generation { status: Some(401), .. })
        ));
    }

    #[test]
    fn error_in_200_body_has_no_status() {
        let body = r#"{"error":{"message":"Rate limit exceeded: free-models-per-day"}}"#;
        assert!(matches!(
            decode_envelope(200, body),
            Envelope::Error { status: None, .. }
        ));
    }

    #[test]
    fn string_error_is_accepted() {
        let body = r#"{"error":"quota exhausted"}"#;
        assert_eq!(
            decode_envelope(402, body),
            Envelope::Error {
                status: Some(402),
                message: "quota exhausted".into()
            }
        );
    }

    #[test]
    fn html_gateway_page_is_malformed() {
        let body = "<html><body><h1>502 Bad Gateway</h1></body></html>";
        match decode_envelope(502, body) {
            Envelope::Malformed { detail, raw_body } => {
                assert!(detail.contains("502"));
                assert_eq!(raw_body, body);
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn truncated_json_is_malformed() {
        let body = r#"{"choices":[{"message":{"content":"\\docu"#;
        assert!(matches!(decode_envelope(200, body), Envelope::Malformed { .. }));
    }

    #[test]
    fn empty_choices_and_empty_content_are_malformed() {
        assert!(matches!(
            decode_envelope(200, r#"{"choices":[]}"#),
            Envelope::Malformed { .. }
        ));
        assert!(matches!(
            decode_envelope(200, r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Envelope::Malformed { .. }
        ));
        assert!(matches!(
            decode_envelope(200, r#"{"choices":[{"message":{"content":null}}]}"#),
            Envelope::Malformed { .. }
        ));
    }

    #[test]
    fn raw_body_is_truncated() {
        let body = "x".repeat(RAW_BODY_LIMIT * 2);
        let t = truncate(&body);
        assert!(t.len() < body.len());
        assert!(t.ends_with("bytes truncated]"));
    }

    #[test]
    fn oversized_html_body_is_kept_up_to_the_limit() {
        let body = format!("<html>{}</html>", "<p>Bad gateway</p>".repeat(2000));
        match decode_envelope(502, &body) {
            Envelope::Malformed { raw_body, .. } => {
                assert!(raw_body.starts_with("<html><p>Bad gateway</p>"));
                let kept = raw_body.split('…').next().unwrap();
                assert_eq!(kept.len(), RAW_BODY_LIMIT);
                assert!(raw_body.ends_with(&format!("[{} bytes truncated]", body.len() - RAW_BODY_LIMIT)));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn request_serialises_openai_shape() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let req = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.3,
            max_tokens: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][1]["role"], "user");
        assert!(json.get("max_tokens").is_none());
        assert_eq!(messages[0].role, Role::System);
    }

    #[test]
    fn api_key_with_newline_is_rejected() {
        let config = TailorConfig::default();
        assert!(ChatCompletionsClient::new(&config, "bad\nkey").is_err());
    }
}
