mod basic;
mod client;
pub mod auth;

pub use basic::{BasicClient, REQUEST_TIMEOUT};
pub use client::HttpClient;

use async_trait::async_trait;
use reqwest::{Method, Request, Url};
use serde_json::Value;
use tracing::trace;

use crate::error::{ComparisonError, Result};
use crate::providers::Provider;

#[async_trait]
impl HttpClient for Box<dyn HttpClient> {
    async fn execute(&self, req: Request) -> reqwest::Result<reqwest::Response> {
        (**self).execute(req).await
    }
}

/// Sends a request and decodes the JSON body.
///
/// Non-success statuses become [`ComparisonError::Http`] carrying whatever
/// error text the provider returned.
pub async fn fetch_json<C: HttpClient + ?Sized>(
    client: &C,
    provider: Provider,
    method: Method,
    url: Url,
    body: Option<&Value>,
) -> Result<Value> {
    let mut req = Request::new(method, url);
    if let Some(body) = body {
        *req.body_mut() = Some(serde_json::to_vec(body)?.into());
        req.headers_mut().insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
    }

    let resp = client.execute(req).await?;
    let status = resp.status();
    let text = resp.text().await?;
    trace!(%provider, status = status.as_u16(), bytes = text.len(), "Response received");

    if !status.is_success() {
        return Err(ComparisonError::Http {
            provider,
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    Ok(serde_json::from_str(&text)?)
}

/// Pulls a readable message out of an error body, whichever shape the
/// provider uses.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.chars().take(200).collect();
    };

    ["detailedError", "error_message", "message", "error", "description"]
        .iter()
        .find_map(|key| match &json[*key] {
            Value::String(s) => Some(s.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .unwrap_or_default()
}

/// Joins `path` onto a base endpoint, keeping any path the endpoint already has.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined)
        .map_err(|e| ComparisonError::Config(format!("invalid endpoint `{joined}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_nested_object() {
        let body = r#"{"error": {"status": "INVALID_ARGUMENT", "message": "bad origin"}}"#;
        assert_eq!(error_message(body), "bad origin");
    }

    #[test]
    fn test_error_message_from_flat_field() {
        assert_eq!(error_message(r#"{"detailedError": "nope"}"#), "nope");
    }

    #[test]
    fn test_error_message_from_plain_text() {
        assert_eq!(error_message("Service Unavailable"), "Service Unavailable");
    }

    #[test]
    fn test_endpoint_url_joins_paths() {
        let url = endpoint_url("http://localhost:5000/", "/route/v1/driving").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/route/v1/driving");
    }

    #[test]
    fn test_endpoint_url_rejects_garbage() {
        assert!(endpoint_url("some-custom-endpoint.com", "/x").is_err());
    }
}
