//! Payment webhook signature check.
//!
//! The provider signs the raw request body with HMAC-SHA256 and sends the
//! lowercase hex digest in `X-PSP-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{EngineError, EngineResult};

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-PSP-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Verifies webhook bodies against the shared secret.
///
/// Without a secret every body passes.
#[derive(Clone, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl WebhookVerifier {
    /// An empty secret disables verification.
    pub fn new(secret: Option<String>) -> Self {
        WebhookVerifier {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks `signature` (hex) against `body`.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> EngineResult<()> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(EngineError::SignatureInvalid("Missing signature header"))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| EngineError::SignatureInvalid("HMAC key error"))?;
        mac.update(body);

        let sig_bytes = hex::decode(signature)
            .map_err(|_| EngineError::SignatureInvalid("Invalid signature hex"))?;
        mac.verify_slice(&sig_bytes)
            .map_err(|_| EngineError::SignatureInvalid("Webhook signature mismatch"))
    }

    /// Hex signature of `body`, or `None` when verification is disabled.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}
