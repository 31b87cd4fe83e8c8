//! Authentication service.
//!
//! Delegates credential checks to the backend's auth API; this service
//! only validates input shape and maps backend rejections into its own
//! error vocabulary.

use thiserror::Error;

use pixelmart_core::types::{Email, EmailError};

use crate::backend::{BackendClient, BackendError};
use crate::models::CurrentUser;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("email already registered")]
    EmailTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The confirmation field did not match the password.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Backend request failed for a reason other than bad credentials.
    #[error("backend error: {0}")]
    Backend(BackendError),
}

/// Authentication service.
pub struct AuthService<'a> {
    backend: &'a BackendClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(backend: &'a BackendClient) -> Self {
        Self { backend }
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is
    /// wrong, `AuthError::InvalidEmail` if the email is malformed.
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let email = Email::parse(email)?;

        let session = self
            .backend
            .sign_in(email.as_str(), password)
            .await
            .map_err(|e| match e {
                BackendError::Api { status, .. } if status == 400 || status == 401 => {
                    AuthError::InvalidCredentials
                }
                other => AuthError::Backend(other),
            })?;

        Ok(CurrentUser {
            id: session.user.id,
            email,
            access_token: session.access_token,
        })
    }

    /// Register a new account and log it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid,
    /// `AuthError::WeakPassword` if the password doesn't meet requirements,
    /// `AuthError::PasswordMismatch` if the confirmation differs, and
    /// `AuthError::EmailTaken` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<CurrentUser, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        if password != password_confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let session = self
            .backend
            .sign_up(email.as_str(), password)
            .await
            .map_err(|e| match e {
                BackendError::Api { status, .. } if status == 409 || status == 422 => {
                    AuthError::EmailTaken
                }
                other => AuthError::Backend(other),
            })?;

        Ok(CurrentUser {
            id: session.user.id,
            email,
            access_token: session.access_token,
        })
    }
}

/// Validate password strength requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_password_rejected() {
        let err = validate_password("hunter2").unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(_)));
    }

    #[test]
    fn test_minimum_length_password_accepted() {
        assert!(validate_password("hunter22").is_ok());
    }
}
