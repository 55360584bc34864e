use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
    Client, Method, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

const UNIQUE_VIOLATION_SQLSTATE: &str = "23505";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Record not found")]
    NotFound,

    #[error("Store request timed out")]
    Timeout,

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Store transport error: {0}")]
    Transport(String),

    #[error("Store response decode error: {0}")]
    Decode(String),

    #[error("Store client misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound("Resource not found".to_string()),
            StoreError::UniqueViolation(msg) => AppError::Conflict(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// Timestamps go into PostgREST filters in `Z` form so no `+` reaches the query string.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Thin PostgREST client. Every call runs under the configured store timeout.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(config.store_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build store HTTP client with timeout ({}), using defaults", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| StoreError::Config(format!("invalid service key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| StoreError::Config(format!("invalid service key: {}", e)))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    fn table_path(table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        }
    }

    fn prefer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("prefer"), HeaderValue::from_static(value));
        headers
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: HeaderMap,
    ) -> Result<Response, StoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Store request {} {}", method, url);

        let mut headers = self.get_headers()?;
        headers.extend(extra_headers);

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();

        if error_code(&error_text).as_deref() == Some(UNIQUE_VIOLATION_SQLSTATE) {
            debug!("Store unique violation on {}: {}", path, error_text);
            return Err(StoreError::UniqueViolation(extract_message(&error_text)));
        }

        error!("Store API error ({}): {}", status, error_text);
        Err(match status.as_u16() {
            404 => StoreError::NotFound,
            code => StoreError::Api {
                status: code,
                message: extract_message(&error_text),
            },
        })
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, HeaderMap::new()).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: HeaderMap,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, extra_headers).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }

    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, &Self::table_path(table, query), None).await
    }

    pub async fn select_one<T>(&self, table: &str, query: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let query = if query.is_empty() {
            "limit=1".to_string()
        } else {
            format!("{}&limit=1", query)
        };
        let rows: Vec<T> = self.select(table, &query).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts one row and returns the stored representation.
    pub async fn insert<T>(&self, table: &str, body: Value) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(
                Method::POST,
                &Self::table_path(table, ""),
                Some(body),
                Self::prefer("return=representation"),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {} returned no rows", table)))
    }

    /// Patches rows matching `query`; returns the first updated row, if any matched.
    pub async fn update<T>(&self, table: &str, query: &str, body: Value) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(
                Method::PATCH,
                &Self::table_path(table, query),
                Some(body),
                Self::prefer("return=representation"),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Deletes rows matching `query` and returns how many were removed.
    pub async fn delete(&self, table: &str, query: &str) -> Result<u64, StoreError> {
        let rows: Vec<Value> = self
            .request_with_headers(
                Method::DELETE,
                &Self::table_path(table, query),
                None,
                Self::prefer("return=representation"),
            )
            .await?;
        Ok(rows.len() as u64)
    }

    /// Exact row count via `HEAD` + `Prefer: count=exact`.
    pub async fn count(&self, table: &str, query: &str) -> Result<u64, StoreError> {
        let response = self
            .send(
                Method::HEAD,
                &Self::table_path(table, query),
                None,
                Self::prefer("count=exact"),
            )
            .await?;

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Decode("missing Content-Range header".to_string()))?;

        parse_content_range_total(range)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.send(Method::GET, "/rest/v1/", None, HeaderMap::new())
            .await
            .map(|_| ())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn parse_content_range_total(range: &str) -> Result<u64, StoreError> {
    range
        .rsplit('/')
        .next()
        .and_then(|total| total.trim().parse::<u64>().ok())
        .ok_or_else(|| StoreError::Decode(format!("unparseable Content-Range: {}", range)))
}

/// SQLSTATE from a PostgREST error body, e.g. `23505` or `23503`.
fn error_code(error_text: &str) -> Option<String> {
    serde_json::from_str::<Value>(error_text)
        .ok()
        .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string))
}

fn extract_message(error_text: &str) -> String {
    serde_json::from_str::<Value>(error_text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| error_text.to_string())
}
