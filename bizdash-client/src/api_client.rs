//! RPC client for the dashboard's whitelisted server methods.

use crate::config::{AuthConfig, DashboardConfig};
use async_trait::async_trait;
use bizdash_cache::RpcInvoker;
use bizdash_core::TransportError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, COOKIE};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ApiClientError> for TransportError {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Status { status, message } => {
                TransportError::new(message).with_status(status)
            }
            ApiClientError::Http(e) => {
                let status = e.status().map(|s| s.as_u16());
                let mut transport = TransportError::new(e.to_string());
                transport.status = status;
                transport
            }
            other => TransportError::new(other.to_string()),
        }
    }
}

/// POSTs to `{api_base_url}/api/method/{method}` with JSON arguments.
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RpcClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn method_url(&self, method: &str) -> String {
        format!("{}/api/method/{}", self.base_url, method)
    }

    /// Call a server method and return the raw response body.
    pub async fn call(&self, method: &str, args: &Value) -> Result<Value, ApiClientError> {
        let url = self.method_url(method);
        tracing::debug!(method, "Calling server method");

        let response = self
            .client
            .post(&url)
            .headers(self.auth_header.clone())
            .header(ACCEPT, "application/json")
            .json(args)
            .send()
            .await?;

        self.parse_response(response).await
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<Value, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<Value>().await?)
        } else {
            let text = response.text().await?;
            Err(ApiClientError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            })
        }
    }
}

#[async_trait]
impl RpcInvoker for RpcClient {
    async fn invoke(&self, method: &str, args: Value) -> Result<Value, TransportError> {
        self.call(method, &args).await.map_err(TransportError::from)
    }
}

/// Pull a readable message out of an error body, preferring the server's
/// exception text over the raw body.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["exception", "exc_type", "message"] {
            if let Some(Value::String(text)) = map.get(field) {
                if !text.is_empty() {
                    return text.clone();
                }
            }
        }
    }
    if body.trim().is_empty() {
        "empty response body".to_string()
    } else {
        body.trim().to_string()
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let (Some(key), Some(secret)) = (&auth.api_key, &auth.api_secret) {
        let value = format!("token {}:{}", key, secret);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    } else if let Some(sid) = &auth.sid {
        let value = format!("sid={}", sid);
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(api_key: Option<&str>, api_secret: Option<&str>, sid: Option<&str>) -> AuthConfig {
        AuthConfig {
            api_key: api_key.map(String::from),
            api_secret: api_secret.map(String::from),
            sid: sid.map(String::from),
        }
    }

    #[test]
    fn test_token_auth_header() {
        let headers = build_auth_headers(&auth(Some("abc"), Some("xyz"), None)).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "token abc:xyz");
        assert!(headers.get(COOKIE).is_none());
    }

    #[test]
    fn test_session_cookie_header() {
        let headers = build_auth_headers(&auth(None, None, Some("s3ss10n"))).unwrap();
        assert_eq!(headers.get(COOKIE).unwrap(), "sid=s3ss10n");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let err = build_auth_headers(&auth(Some("bad\nkey"), Some("x"), None)).unwrap_err();
        assert!(matches!(err, ApiClientError::Config(_)));
    }

    #[test]
    fn test_error_message_prefers_exception() {
        let body = r#"{"exc_type":"PermissionError","exception":"frappe.exceptions.PermissionError: Not allowed"}"#;
        assert_eq!(
            error_message(body),
            "frappe.exceptions.PermissionError: Not allowed"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn test_status_error_maps_to_transport_error() {
        let transport = TransportError::from(ApiClientError::Status {
            status: 503,
            message: "Service Unavailable".to_string(),
        });
        assert_eq!(transport.status, Some(503));
        assert_eq!(transport.message, "Service Unavailable");
    }
}
