//! Client for the managed backend (REST rows, RPCs, storage).
//!
//! # Architecture
//!
//! - The backend is the source of truth - NO local sync, direct API calls
//! - Row reads go through a small query builder that renders the
//!   backend's `select`/`order`/`limit`/`column=eq.value` query string
//! - Atomic operations (room creation, promo purchase, coin awards,
//!   notification claims) are backend RPCs; the client never reimplements
//!   their arithmetic
//! - Catalog reads are cached in-memory via `moka` (5 minute TTL)
//!
//! Every request carries the anonymous API key; requests made on behalf
//! of a logged-in user additionally send that user's access token, so the
//! backend's row-level security decides visibility - not this client.

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::BackendConfig;
use cache::CacheValue;
use types::{AuthSession, Offer, Product, SiteSetting};

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

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the managed backend.
///
/// Cheaply cloneable; clones share the HTTP connection pool and the
/// catalog cache.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    storage_bucket: String,
    cache: Cache<String, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(BackendClientInner {
                http: reqwest::Client::new(),
                base_url: config.url.trim_end_matches('/').to_string(),
                anon_key: config.anon_key.expose_secret().to_string(),
                storage_bucket: config.storage_bucket.clone(),
                cache,
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
            auth: None,
        }
    }

    /// Insert rows into a table, returning the stored representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the
    /// rows (RLS violation, constraint failure).
    #[instrument(skip(self, rows, auth), fields(table = %table))]
    pub async fn insert<T, R>(
        &self,
        auth: Option<&str>,
        table: &str,
        rows: &T,
    ) -> Result<Vec<R>, BackendError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/rest/v1/{table}", self.inner.base_url);
        let response = self
            .authorized(self.inner.http.post(&url), auth)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Insert a single row, returning its stored representation.
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert); additionally `NotFound` if the backend
    /// returns an empty representation.
    pub async fn insert_one<T, R>(
        &self,
        auth: Option<&str>,
        table: &str,
        row: &T,
    ) -> Result<R, BackendError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut rows: Vec<R> = self.insert(auth, table, &[row]).await?;
        rows.pop()
            .ok_or_else(|| BackendError::NotFound(format!("insert into {table} returned no row")))
    }

    /// Patch rows matching equality filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the
    /// patch.
    #[instrument(skip(self, patch, auth), fields(table = %table))]
    pub async fn update<T>(
        &self,
        auth: Option<&str>,
        table: &str,
        filters: &[(&str, String)],
        patch: &T,
    ) -> Result<(), BackendError>
    where
        T: Serialize + ?Sized,
    {
        let url = format!("{}/rest/v1/{table}", self.inner.base_url);
        let mut request = self.authorized(self.inner.http.patch(&url), auth);
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
    #[instrument(skip(self, args, auth), fields(rpc = %name))]
    pub async fn rpc<R>(
        &self,
        auth: Option<&str>,
        name: &str,
        args: serde_json::Value,
    ) -> Result<R, BackendError>
    where
        R: DeserializeOwned,
    {
        let url = format!("{}/rest/v1/rpc/{name}", self.inner.base_url);
        let response = self
            .authorized(self.inner.http.post(&url), auth)
            .json(&args)
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Upload a file to the attachment bucket and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    #[instrument(skip(self, bytes, auth), fields(path = %path, size = bytes.len()))]
    pub async fn upload(
        &self,
        auth: Option<&str>,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let bucket = &self.inner.storage_bucket;
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.inner.base_url);
        let response = self
            .authorized(self.inner.http.post(&url), auth)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(self.public_url(path))
    }

    /// Exchange email and password for an access token.
    ///
    /// # Errors
    ///
    /// Returns `Api` with the backend's status on bad credentials; the
    /// caller maps that to its own error vocabulary.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let url = format!("{}/auth/v1/token", self.inner.base_url);
        let response = self
            .inner
            .http
            .post(&url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.inner.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Register a new account, returning a session for it.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the email is already registered or the backend
    /// rejects the signup.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let url = format!("{}/auth/v1/signup", self.inner.base_url);
        let response = self
            .inner
            .http
            .post(&url)
            .header("apikey", &self.inner.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Public URL of an uploaded object.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.inner.base_url, self.inner.storage_bucket
        )
    }

    // =========================================================================
    // Cached catalog reads
    // =========================================================================

    /// Active products with embedded packages, ordered by priority.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn active_products(&self) -> Result<Vec<Product>, BackendError> {
        let cache_key = "products:active".to_string();

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .from("products")
            .select("*,packages(*)")
            .eq("is_active", "true")
            .order("priority.asc")
            .fetch()
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// A single product by slug, with embedded packages.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the slug does not exist, or an error if the
    /// API request fails.
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, BackendError> {
        let cache_key = format!("product:{slug}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .from("products")
            .select("*,packages(*)")
            .eq("slug", slug)
            .limit(1)
            .fetch_one()
            .await
            .map_err(|e| match e {
                BackendError::NotFound(_) => {
                    BackendError::NotFound(format!("Product not found: {slug}"))
                }
                other => other,
            })?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Active offers with embedded items, ordered by priority.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn active_offers(&self) -> Result<Vec<Offer>, BackendError> {
        let cache_key = "offers:active".to_string();

        if let Some(CacheValue::Offers(offers)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for offers");
            return Ok(offers);
        }

        let offers: Vec<Offer> = self
            .from("offers")
            .select("*,offer_items(*)")
            .eq("is_active", "true")
            .order("priority.asc")
            .fetch()
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Offers(offers.clone()))
            .await;

        Ok(offers)
    }

    /// Site settings (manual-payment wallet numbers and the like).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn site_settings(&self) -> Result<Vec<SiteSetting>, BackendError> {
        let cache_key = "settings".to_string();

        if let Some(CacheValue::Settings(settings)) = self.inner.cache.get(&cache_key).await {
            return Ok(settings);
        }

        let settings: Vec<SiteSetting> = self.from("site_settings").fetch().await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Settings(settings.clone()))
            .await;

        Ok(settings)
    }

    /// Cheap uncached read used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    pub async fn ping(&self) -> Result<(), BackendError> {
        let _rows: Vec<serde_json::Value> = self.from("site_settings").limit(1).fetch().await?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        auth: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let token = auth.unwrap_or(&self.inner.anon_key);
        request
            .header("apikey", &self.inner.anon_key)
            .header("Authorization", format!("Bearer {token}"))
    }

    async fn check_response(response: reqwest::Response) -> Result<String, BackendError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

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

// =============================================================================
// Query builder
// =============================================================================

/// A row query being built against one table.
#[must_use]
pub struct Query<'a> {
    client: &'a BackendClient,
    table: String,
    params: Vec<(String, String)>,
    auth: Option<String>,
}

impl Query<'_> {
    /// Choose the returned columns (default `*`); supports embedding
    /// (`*,packages(*)`).
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

    /// Keep rows where `column` is greater than `value`.
    pub fn gt(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("gt.{}", value.to_string())));
        self
    }

    /// Keep rows where `column` is less than or equal to `value`.
    pub fn lte(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("lte.{}", value.to_string())));
        self
    }

    /// Order the result, e.g. `created_at.asc` or `last_message_at.desc`.
    pub fn order(mut self, spec: &str) -> Self {
        self.params.push(("order".to_string(), spec.to_string()));
        self
    }

    /// Limit the number of returned rows.
    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    /// Run the query with a user's access token instead of the anonymous
    /// key, so row-level security sees the user.
    pub fn auth(mut self, token: &str) -> Self {
        self.auth = Some(token.to_string());
        self
    }

    /// Execute and parse the matching rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the rows cannot be parsed.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let url = format!("{}/rest/v1/{}", self.client.inner.base_url, self.table);
        let request = self
            .client
            .authorized(self.client.inner.http.get(&url), self.auth.as_deref())
            .query(&self.params);
        let response = request.send().await?;
        let body = BackendClient::check_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Execute and return the first row, `NotFound` if none matched.
    ///
    /// # Errors
    ///
    /// As [`fetch`](Self::fetch).
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, BackendError> {
        let table = self.table.clone();
        let mut rows: Vec<T> = self.fetch().await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("no rows in {table}")));
        }
        Ok(rows.swap_remove(0))
    }

    /// Execute and return the first row if any.
    ///
    /// # Errors
    ///
    /// As [`fetch`](Self::fetch).
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, BackendError> {
        let mut rows: Vec<T> = self.fetch().await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.swap_remove(0)))
    }

    #[cfg(test)]
    fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_client() -> BackendClient {
        BackendClient::new(&BackendConfig {
            url: "http://127.0.0.1:54321/".to_string(),
            realtime_url: "ws://127.0.0.1:54321/realtime/v1/websocket".to_string(),
            anon_key: SecretString::from("anon-key"),
            storage_bucket: "attachments".to_string(),
        })
    }

    #[test]
    fn test_query_params_render_backend_operators() {
        let client = test_client();
        let query = client
            .from("chat_messages")
            .select("*")
            .eq("room_id", "r-1")
            .order("created_at.asc")
            .limit(50);

        let params = query.params();
        assert!(params.contains(&("room_id".to_string(), "eq.r-1".to_string())));
        assert!(params.contains(&("order".to_string(), "created_at.asc".to_string())));
        assert!(params.contains(&("limit".to_string(), "50".to_string())));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = test_client();
        assert_eq!(
            client.public_url("chat/att.png"),
            "http://127.0.0.1:54321/storage/v1/object/public/attachments/chat/att.png"
        );
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = BackendError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");

        let err = BackendError::Api {
            status: 403,
            message: "row-level security".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned 403: row-level security");
    }
}
