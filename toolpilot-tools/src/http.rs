//! Shared JSON-over-HTTP client for connector tools

use crate::base::{Result, TokenSource, ToolError};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 500;

/// Bearer-authenticated REST client rooted at one base URL
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<dyn TokenSource>,
    headers: Vec<(&'static str, String)>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Arc<dyn TokenSource>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
            token,
            headers: Vec::new(),
        }
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Build an endpoint URL from path segments, percent-encoding each one
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ToolError::InvalidParams(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ToolError::InvalidParams(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let token = self.token.access_token().await?;
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, url).bearer_auth(token);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        Ok(builder)
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = toolpilot_core::utils::truncate(body.trim(), MAX_ERROR_BODY);
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ToolError::Auth(format!("HTTP {}: {}", status, body)));
        }
        Err(ToolError::ExecutionFailed(format!(
            "HTTP {}: {}",
            status, body
        )))
    }

    async fn json_body(response: reqwest::Response) -> Result<Value> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid JSON response: {}", e)))
    }

    pub async fn get(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Value> {
        let builder = self.request(Method::GET, segments).await?.query(query);
        Self::json_body(Self::send(builder).await?).await
    }

    /// GET returning the raw response bytes
    pub async fn get_bytes(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Vec<u8>> {
        let builder = self.request(Method::GET, segments).await?.query(query);
        let bytes = Self::send(builder).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn post(&self, segments: &[&str], query: &[(&str, String)], body: &Value) -> Result<Value> {
        let builder = self
            .request(Method::POST, segments)
            .await?
            .query(query)
            .json(body);
        Self::json_body(Self::send(builder).await?).await
    }

    pub async fn put(&self, segments: &[&str], query: &[(&str, String)], body: &Value) -> Result<Value> {
        let builder = self
            .request(Method::PUT, segments)
            .await?
            .query(query)
            .json(body);
        Self::json_body(Self::send(builder).await?).await
    }

    pub async fn patch(&self, segments: &[&str], body: &Value) -> Result<Value> {
        let builder = self.request(Method::PATCH, segments).await?.json(body);
        Self::json_body(Self::send(builder).await?).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<Value> {
        let builder = self.request(Method::DELETE, segments).await?;
        Self::json_body(Self::send(builder).await?).await
    }
}

/// String field lookup by JSON pointer, empty string when absent
pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::StaticToken;

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = ApiClient::new(
            "https://sheets.example.com/v4/",
            Arc::new(StaticToken::new("t", "Sheets")),
        );
        let url = client
            .endpoint(&["spreadsheets", "abc", "values", "My Sheet!A1:B2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc/values/My%20Sheet!A1:B2"
        );
    }

    #[test]
    fn test_str_at() {
        let value = serde_json::json!({"a": {"b": "c"}});
        assert_eq!(str_at(&value, "/a/b"), "c");
        assert_eq!(str_at(&value, "/a/x"), "");
    }
}
