//! Authentication service for API token validation.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tracing::warn;

use crate::domain::entities::Owner;
use crate::domain::repositories::TokenRepository;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes in a raw API token before encoding.
const TOKEN_BYTES: usize = 32;

/// Service for authenticating API requests via Bearer tokens.
///
/// Tokens are hashed with HMAC-SHA256 (keyed by `signing_secret`) before storage
/// and comparison. An attacker with read-only access to the database cannot verify
/// or forge tokens without the server-side secret.
pub struct AuthService {
    repository: Arc<dyn TokenRepository>,
    signing_secret: String,
}

impl AuthService {
    /// Creates a new authentication service.
    ///
    /// `signing_secret` must match the value used when tokens were issued.
    pub fn new(repository: Arc<dyn TokenRepository>, signing_secret: String) -> Self {
        Self {
            repository,
            signing_secret,
        }
    }

    /// Hashes a raw token with HMAC-SHA256 using the server signing secret.
    ///
    /// Returns a 64-character lowercase hex-encoded MAC.
    pub fn hash_token(&self, token: &str) -> String {
        hash_token_with(&self.signing_secret, token)
    }

    /// Resolves a raw token to the owner it was issued for.
    ///
    /// The `last_used_at` timestamp is touched on success; a failure to do so
    /// is logged and does not reject the request.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the token is unknown or revoked.
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn authenticate(&self, token: &str) -> Result<Owner, AppError> {
        let token_hash = self.hash_token(token);

        let Some(owner_id) = self.repository.find_owner(&token_hash).await? else {
            return Err(AppError::unauthorized(
                "Unauthorized",
                json!({ "reason": "Invalid or revoked token" }),
            ));
        };

        if let Err(e) = self.repository.update_last_used(&token_hash).await {
            warn!(error = %e, "Failed to record token usage");
        }

        Ok(Owner(owner_id))
    }
}

/// HMAC-SHA256 of `token` keyed by `secret`, hex encoded.
///
/// Shared by the server and the admin CLI so both derive identical hashes.
pub fn hash_token_with(secret: &str, token: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Generates a new raw API token from the OS CSPRNG.
///
/// 32 random bytes, URL-safe base64 without padding (43 characters).
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the system RNG fails.
pub fn generate_token() -> Result<String, AppError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| {
        AppError::internal(
            "Failed to generate token",
            json!({ "reason": e.to_string() }),
        )
    })?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockTokenRepository;

    fn test_secret() -> String {
        "test-signing-secret".to_string()
    }

    #[tokio::test]
    async fn test_authenticate_resolves_owner() {
        let mut mock_repo = MockTokenRepository::new();

        let token = "valid-token";
        let expected_hash = hash_token_with(&test_secret(), token);

        mock_repo
            .expect_find_owner()
            .withf(move |hash| hash == expected_hash)
            .times(1)
            .returning(|_| Ok(Some(42)));
        mock_repo
            .expect_update_last_used()
            .times(1)
            .returning(|_| Ok(()));

        let service = AuthService::new(Arc::new(mock_repo), test_secret());

        assert_eq!(service.authenticate(token).await.unwrap(), Owner(42));
    }

    #[tokio::test]
    async fn test_authenticate_invalid_token() {
        let mut mock_repo = MockTokenRepository::new();
        mock_repo
            .expect_find_owner()
            .times(1)
            .returning(|_| Ok(None));
        mock_repo.expect_update_last_used().never();

        let service = AuthService::new(Arc::new(mock_repo), test_secret());

        let err = service.authenticate("invalid-token").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_last_used_failure_does_not_reject() {
        let mut mock_repo = MockTokenRepository::new();
        mock_repo.expect_find_owner().returning(|_| Ok(Some(1)));
        mock_repo
            .expect_update_last_used()
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let service = AuthService::new(Arc::new(mock_repo), test_secret());

        assert_eq!(service.authenticate("token").await.unwrap(), Owner(1));
    }

    #[test]
    fn test_hash_token_properties() {
        let service = AuthService::new(Arc::new(MockTokenRepository::new()), test_secret());

        let hash = service.hash_token("test-token");
        assert_eq!(hash, service.hash_token("test-token"));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, service.hash_token("other-token"));
        assert_ne!(hash, hash_token_with("secret-b", "test-token"));
    }

    #[test]
    fn test_generate_token_is_url_safe_and_unique() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();

        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
