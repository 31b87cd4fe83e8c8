//! Service-role client for the managed backend.
//!
//! Unlike the storefront, the console authenticates every request with
//! the service-role key, so row-level security does not apply. There is
//! no caching here: admin views must show current state.

pub mod types;

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use crate::config::AdminConfig;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body for diagnostics.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Service-role backend client.
///
/// Cheaply cloneable; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct ServiceClient {
    inner: Arc<ServiceClientInner>,
}

struct ServiceClientInner {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl ServiceClient {
    /// Create a new service-role client.
    #[must_use]
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            inner: Arc::new(ServiceClientInner {
                http: reqwest::Client::new(),
                base_url: config.backend_url.trim_end_matches('/').to_string(),
                service_key: config.service_key.expose_secret().to_string(),
            }),
        }
    }

    /// Start a row query against a table.
    #[must_use]
    pub fn from(&self, table: &str) -> Query<'_> {
        Query {
            client: self,
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    /// Insert a single row, returning its stored representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend rejects the row,
    /// or the representation comes back empty.
    #[instrument(skip(self, row), fields(table = %table))]
    pub async fn insert_one<T, R>(&self, table: &str, row: &T) -> Result<R, BackendError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/rest/v1/{table}", self.inner.base_url);
        let response = self
            .authorized(self.inner.http.post(&url))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        let mut rows: Vec<R> = serde_json::from_str(&body)?;
        rows.pop()
            .ok_or_else(|| BackendError::NotFound(format!("insert into {table} returned no row")))
    }

    /// Patch rows matching equality filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the
    /// patch.
    #[instrument(skip(self, patch), fields(table = %table))]
    pub async fn update<T>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: &T,
    ) -> Result<(), BackendError>
    where
        T: Serialize + ?Sized,
    {
        let url = format!("{}/rest/v1/{table}", self.inner.base_url);
        let mut request = self.authorized(self.inner.http.patch(&url));
        for (column, value) in filters {
            request = request.query(&[(*column, format!("eq.{value}"))]);
        }
        let response = request.json(patch).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Invoke a named remote procedure with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the result cannot be
    /// parsed into `R`.
    #[instrument(skip(self, args), fields(rpc = %name))]
    pub async fn rpc<R>(&self, name: &str, args: serde_json::Value) -> Result<R, BackendError>
    where
        R: DeserializeOwned,
    {
        let url = format!("{}/rest/v1/rpc/{name}", self.inner.base_url);
        let response = self
            .authorized(self.inner.http.post(&url))
            .json(&args)
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Cheap read used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    pub async fn ping(&self) -> Result<(), BackendError> {
        let _rows: Vec<serde_json::Value> = self.from("site_settings").limit(1).fetch().await?;
        Ok(())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.inner.service_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.inner.service_key),
            )
    }

    async fn check_response(response: reqwest::Response) -> Result<String, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "backend returned non-success status"
            );
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }
}

/// A row query being built against one table.
#[must_use]
pub struct Query<'a> {
    client: &'a ServiceClient,
    table: String,
    params: Vec<(String, String)>,
}

impl Query<'_> {
    /// Choose the returned columns (default `*`).
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    /// Keep rows where `column` equals `value`.
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Order the result, e.g. `last_message_at.desc`.
    pub fn order(mut self, spec: &str) -> Self {
        self.params.push(("order".to_string(), spec.to_string()));
        self
    }

    /// Limit the number of returned rows.
    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    /// Execute the query, returning all matching rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the rows cannot be parsed.
    pub async fn fetch<R>(self) -> Result<Vec<R>, BackendError>
    where
        R: DeserializeOwned,
    {
        let url = format!("{}/rest/v1/{}", self.client.inner.base_url, self.table);
        let response = self
            .client
            .authorized(self.client.inner.http.get(&url))
            .query(&self.params)
            .send()
            .await?;
        let body = ServiceClient::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Execute the query, returning exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row matched, or an error if the request
    /// fails.
    pub async fn fetch_one<R>(self) -> Result<R, BackendError>
    where
        R: DeserializeOwned,
    {
        let table = self.table.clone();
        let mut rows: Vec<R> = self.fetch().await?;
        rows.pop()
            .ok_or_else(|| BackendError::NotFound(format!("no row in {table}")))
    }
}
