//! One-time verification codes held in the cache.
//!
//! Library-only: the HTTP server and the admin binary expose no verification
//! flow. Embedders construct [`VerificationService`] over the same
//! [`CacheService`] the server uses.

use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::VerificationCodeGenerator;

/// Issues and checks short-lived numeric codes for a subject (e.g. an email).
///
/// Codes live in the cache under the verification TTL and are single use:
/// a successful check removes the code. Delivery of the code is up to the
/// caller.
pub struct VerificationService {
    cache: Arc<dyn CacheService>,
    generator: VerificationCodeGenerator,
}

impl VerificationService {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self {
            cache,
            generator: VerificationCodeGenerator,
        }
    }

    /// Creates a code for `subject`, replacing any pending one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the RNG or the cache fails.
    pub async fn issue(&self, subject: &str) -> Result<String, AppError> {
        let code = self.generator.generate().map_err(|e| {
            AppError::internal(
                "Failed to generate verification code",
                json!({ "reason": e.to_string() }),
            )
        })?;

        self.cache.set_verification_code(subject, &code).await?;
        debug!(subject, "Verification code issued");

        Ok(code)
    }

    /// Checks `code` against the pending code for `subject` and consumes it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if no code is pending or it does not
    /// match. Returns [`AppError::Internal`] if the cache fails.
    pub async fn verify(&self, subject: &str, code: &str) -> Result<(), AppError> {
        match self.cache.get_verification_code(subject).await? {
            Some(expected) if expected == code => {
                self.cache.del_verification_code(subject).await?;
                Ok(())
            }
            _ => Err(AppError::unauthorized(
                "Invalid or expired verification code",
                json!({ "subject": subject }),
            )),
        }
    }
}
