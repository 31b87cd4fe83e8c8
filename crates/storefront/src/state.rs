//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use pixelmart_realtime::{RealtimeError, RealtimeHub};

use crate::backend::BackendClient;
use crate::config::StorefrontConfig;
use crate::services::notifier::Notifier;

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("realtime connection failed: {0}")]
    Realtime(#[from] RealtimeError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the backend client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    realtime: RealtimeHub,
    notifier: Notifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Connects to the backend's realtime endpoint and spawns the
    /// subscription-expiry notifier task.
    ///
    /// # Errors
    ///
    /// Returns an error if the realtime WebSocket connection fails.
    pub async fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let backend = BackendClient::new(&config.backend);
        let realtime = RealtimeHub::connect(
            &config.backend.realtime_url,
            config.backend.anon_key.expose_secret(),
        )
        .await?;
        let notifier = Notifier::spawn(backend.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                realtime,
                notifier,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the realtime subscription hub.
    #[must_use]
    pub fn realtime(&self) -> &RealtimeHub {
        &self.inner.realtime
    }

    /// Get a reference to the subscription-expiry notifier.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
