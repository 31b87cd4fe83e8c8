//! Subscription expiry notifier.
//!
//! A single hourly task sweeps the subscriptions of every registered
//! user (users register on login, carrying their access token so
//! row-level security still applies). Each expiring or expired
//! subscription is claimed through the backend's atomic
//! `claim_subscription_notification` RPC; only a successful claim
//! produces a toast. The claim is the idempotency marker, so two
//! processes sweeping the same subscription produce one toast total.
//!
//! Expired subscriptions get their active flag switched off before the
//! claim. Deactivated rows with an expired date are still swept for an
//! unclaimed notification, so a crash between the two steps delays the
//! toast by one sweep instead of losing it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use pixelmart_core::{NotificationKind, SubscriptionId, UserId};

use crate::backend::types::{NotificationClaim, UserSubscription};
use crate::backend::{BackendClient, BackendError};

/// How far ahead of expiry the warning fires.
const WARNING_WINDOW_DAYS: i64 = 7;

/// Sweep period.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// A queued notification for one user's account page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub subscription_id: SubscriptionId,
    pub kind: NotificationKind,
    pub product_name: String,
    pub message: String,
}

/// Handle to the notifier task. Cheaply cloneable.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    backend: BackendClient,
    /// Access token per registered user, refreshed on login.
    registry: Mutex<HashMap<UserId, String>>,
    /// Pending toasts per user, drained by the account page.
    toasts: Mutex<HashMap<UserId, Vec<Toast>>>,
    /// Claims already attempted this process, successful or not.
    seen: Mutex<HashSet<(SubscriptionId, NotificationKind)>>,
}

impl Notifier {
    /// Spawn the hourly sweep task and return its handle.
    #[must_use]
    pub fn spawn(backend: BackendClient) -> Self {
        let notifier = Self {
            inner: Arc::new(NotifierInner {
                backend,
                registry: Mutex::new(HashMap::new()),
                toasts: Mutex::new(HashMap::new()),
                seen: Mutex::new(HashSet::new()),
            }),
        };

        let task = notifier.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task.sweep().await;
            }
        });

        notifier
    }

    /// Register a user for expiry sweeps. Called on login; replaces any
    /// previous token for the same user.
    pub fn register(&self, user_id: UserId, access_token: String) {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, access_token);
    }

    /// Stop sweeping a user's subscriptions. Called on logout.
    pub fn unregister(&self, user_id: UserId) {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id);
    }

    /// Drain the user's pending toasts.
    #[must_use]
    pub fn take_toasts(&self, user_id: UserId) -> Vec<Toast> {
        self.inner
            .toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
            .unwrap_or_default()
    }

    /// One full pass over every registered user.
    ///
    /// Public so integration tests can drive the sweep without waiting
    /// out the interval.
    pub async fn sweep(&self) {
        let users: Vec<(UserId, String)> = {
            let registry = self
                .inner
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            registry
                .iter()
                .map(|(id, token)| (*id, token.clone()))
                .collect()
        };

        for (user_id, token) in users {
            if let Err(err) = self.sweep_user(user_id, &token).await {
                warn!(user_id = %user_id, error = %err, "expiry sweep failed for user");
            }
        }
    }

    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn sweep_user(&self, user_id: UserId, token: &str) -> Result<(), BackendError> {
        let now = Utc::now();
        let horizon = now + chrono::Duration::days(WARNING_WINDOW_DAYS);

        let subscriptions: Vec<UserSubscription> = self
            .inner
            .backend
            .from("user_subscriptions")
            .eq("user_id", user_id)
            .eq("is_active", "true")
            .lte("expires_at", horizon.to_rfc3339())
            .auth(token)
            .fetch()
            .await?;

        for subscription in subscriptions {
            let kind = classify(&subscription, now);

            if kind == NotificationKind::Expired {
                // Deactivate before recording the claim; a crash in
                // between leaves an inactive row whose claim the next
                // sweep picks up below.
                self.inner
                    .backend
                    .update(
                        Some(token),
                        "user_subscriptions",
                        &[("id", subscription.id.to_string())],
                        &serde_json::json!({ "is_active": false }),
                    )
                    .await?;
            }

            self.claim_and_queue(user_id, token, &subscription, kind)
                .await?;
        }

        // Rows deactivated by an earlier sweep (or by a crash between
        // the flag flip and the claim) no longer match the active
        // query; re-attempt their claims so the toast is not lost. The
        // claim RPC and the seen set keep this idempotent.
        let deactivated: Vec<UserSubscription> = self
            .inner
            .backend
            .from("user_subscriptions")
            .eq("user_id", user_id)
            .eq("is_active", "false")
            .lte("expires_at", now.to_rfc3339())
            .auth(token)
            .fetch()
            .await?;

        for subscription in deactivated {
            self.claim_and_queue(user_id, token, &subscription, NotificationKind::Expired)
                .await?;
        }

        Ok(())
    }

    async fn claim_and_queue(
        &self,
        user_id: UserId,
        token: &str,
        subscription: &UserSubscription,
        kind: NotificationKind,
    ) -> Result<(), BackendError> {
        let key = (subscription.id, kind);
        {
            let seen = self
                .inner
                .seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if seen.contains(&key) {
                return Ok(());
            }
        }

        let claim: NotificationClaim = self
            .inner
            .backend
            .rpc(
                Some(token),
                "claim_subscription_notification",
                serde_json::json!({
                    "subscription_id": subscription.id,
                    "kind": kind.as_str(),
                }),
            )
            .await?;

        self.inner
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);

        if claim.claimed {
            let toast = make_toast(subscription, kind);
            self.inner
                .toasts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(user_id)
                .or_default()
                .push(toast);
        } else {
            debug!(subscription_id = %subscription.id, "notification already claimed elsewhere");
        }

        Ok(())
    }
}

/// Which notification a subscription is due for at `now`.
fn classify(subscription: &UserSubscription, now: DateTime<Utc>) -> NotificationKind {
    if subscription.expires_at <= now {
        NotificationKind::Expired
    } else {
        NotificationKind::ExpiringSoon
    }
}

fn make_toast(subscription: &UserSubscription, kind: NotificationKind) -> Toast {
    let message = match kind {
        NotificationKind::Expired => {
            format!("Your {} subscription has expired", subscription.product_name)
        }
        NotificationKind::ExpiringSoon => {
            let days = (subscription.expires_at - Utc::now()).num_days().max(0);
            format!(
                "Your {} subscription expires in {days} day(s)",
                subscription.product_name
            )
        }
    };
    Toast {
        subscription_id: subscription.id,
        kind,
        product_name: subscription.product_name.clone(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn subscription(expires_at: DateTime<Utc>) -> UserSubscription {
        UserSubscription {
            id: SubscriptionId::generate(),
            user_id: UserId::generate(),
            product_name: "Spotify Premium".to_string(),
            expires_at,
            is_active: true,
        }
    }

    #[test]
    fn test_past_expiry_classifies_expired() {
        let now = Utc::now();
        let sub = subscription(now - chrono::Duration::hours(1));
        assert_eq!(classify(&sub, now), NotificationKind::Expired);
    }

    #[test]
    fn test_future_expiry_classifies_expiring_soon() {
        let now = Utc::now();
        let sub = subscription(now + chrono::Duration::days(3));
        assert_eq!(classify(&sub, now), NotificationKind::ExpiringSoon);
    }

    #[test]
    fn test_expired_toast_message_names_product() {
        let sub = subscription(Utc::now() - chrono::Duration::days(1));
        let toast = make_toast(&sub, NotificationKind::Expired);
        assert_eq!(toast.message, "Your Spotify Premium subscription has expired");
    }

    #[tokio::test]
    async fn test_toasts_drain_once() {
        let notifier = Notifier {
            inner: Arc::new(NotifierInner {
                backend: BackendClient::new(&crate::config::BackendConfig {
                    url: "http://127.0.0.1:1".to_string(),
                    realtime_url: "ws://127.0.0.1:1".to_string(),
                    anon_key: secrecy::SecretString::from("k"),
                    storage_bucket: "attachments".to_string(),
                }),
                registry: Mutex::new(HashMap::new()),
                toasts: Mutex::new(HashMap::new()),
                seen: Mutex::new(HashSet::new()),
            }),
        };

        let user_id = UserId::generate();
        let sub = subscription(Utc::now() - chrono::Duration::days(1));
        notifier
            .inner
            .toasts
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push(make_toast(&sub, NotificationKind::Expired));

        assert_eq!(notifier.take_toasts(user_id).len(), 1);
        assert!(notifier.take_toasts(user_id).is_empty());
    }
}
