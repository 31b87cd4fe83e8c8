//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use pixelmart_realtime::{RealtimeError, RealtimeHub};

use crate::backend::ServiceClient;
use crate::config::AdminConfig;

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("realtime connection failed: {0}")]
    Realtime(#[from] RealtimeError),
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    backend: ServiceClient,
    realtime: RealtimeHub,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the realtime WebSocket connection fails.
    pub async fn new(config: AdminConfig) -> Result<Self, StateError> {
        let backend = ServiceClient::new(&config);
        let realtime =
            RealtimeHub::connect(&config.realtime_url, config.service_key.expose_secret()).await?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                realtime,
            }),
        })
    }

    /// Get a reference to the console configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the service-role backend client.
    #[must_use]
    pub fn backend(&self) -> &ServiceClient {
        &self.inner.backend
    }

    /// Get a reference to the realtime subscription hub.
    #[must_use]
    pub fn realtime(&self) -> &RealtimeHub {
        &self.inner.realtime
    }
}
