//! HMAC-SHA256 authentication for inbound billing webhooks.
//!
//! The provider signs the raw request body with a shared secret and sends
//! the result in the `billing-signature` header:
//! - The secret is `whsec_` prefixed base64-encoded random bytes
//! - The signature is `v1,` followed by base64-encoded HMAC-SHA256 over the
//!   exact body bytes
//!
//! Verification MUST happen before any event is interpreted - it is the
//! sole authentication mechanism for the webhook endpoint.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix for webhook secrets
pub const SECRET_PREFIX: &str = "whsec_";

/// Header carrying the signature on inbound webhook requests
pub const SIGNATURE_HEADER: &str = "billing-signature";

/// Generate a new webhook secret.
///
/// Returns a `whsec_` prefixed base64-encoded 32-byte random secret.
pub fn generate_secret() -> String {
    use rand::RngCore;

    let mut secret_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret_bytes);

    format!("{}{}", SECRET_PREFIX, BASE64_STANDARD.encode(secret_bytes))
}

/// Extract the raw secret bytes from a `whsec_` prefixed secret.
///
/// Returns `None` if the secret doesn't have the correct prefix or invalid base64.
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let encoded = secret.strip_prefix(SECRET_PREFIX)?;
    BASE64_STANDARD.decode(encoded).ok()
}

/// Sign a webhook payload.
///
/// # Returns
///
/// The signature in format `v1,{base64-hmac-sha256}`, or `None` if the
/// secret is malformed.
pub fn sign_payload(payload: &str, secret: &str) -> Option<String> {
    let secret_bytes = decode_secret(secret)?;

    let mut mac = HmacSha256::new_from_slice(&secret_bytes).ok()?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    Some(format!("v1,{}", BASE64_STANDARD.encode(signature)))
}

/// Verify a webhook signature against the raw request body.
///
/// Returns `true` if the signature is valid, `false` otherwise.
pub fn verify_signature(payload: &str, signature: &str, secret: &str) -> bool {
    // Extract the signature version and value
    let Some(sig_value) = signature.strip_prefix("v1,") else {
        return false;
    };

    // Compute expected signature
    let Some(expected) = sign_payload(payload, secret) else {
        return false;
    };

    let Some(expected_value) = expected.strip_prefix("v1,") else {
        return false;
    };

    // Use constant-time comparison to prevent timing attacks
    constant_time_eq(sig_value.as_bytes(), expected_value.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret();
        assert!(secret.starts_with(SECRET_PREFIX));

        // Should be able to decode
        let decoded = decode_secret(&secret);
        assert!(decoded.is_some());
        assert_eq!(decoded.unwrap().len(), 32);
    }

    #[test]
    fn test_decode_secret_invalid_prefix() {
        assert!(decode_secret("invalid_secret").is_none());
    }

    #[test]
    fn test_decode_secret_invalid_base64() {
        assert!(decode_secret("whsec_not-valid-base64!!!").is_none());
    }

    #[test]
    fn test_sign_and_verify() {
        let secret = generate_secret();
        let payload = r#"{"type":"customer.subscription.updated","data":{}}"#;

        let signature = sign_payload(payload, &secret).expect("should sign");
        assert!(signature.starts_with("v1,"));

        // Verify should pass
        assert!(verify_signature(payload, &signature, &secret));

        // Wrong payload should fail
        assert!(!verify_signature("wrong", &signature, &secret));

        // Wrong secret should fail
        let other_secret = generate_secret();
        assert!(!verify_signature(payload, &signature, &other_secret));
    }

    #[test]
    fn test_verify_invalid_signature_format() {
        let secret = generate_secret();
        assert!(!verify_signature("payload", "invalid", &secret));
        assert!(!verify_signature("payload", "v2,abc", &secret));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let secret = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
        let payload = r#"{"test": 2432232314}"#;

        let signature = sign_payload(payload, secret).expect("should sign");
        let signature2 = sign_payload(payload, secret).expect("should sign");
        assert_eq!(signature, signature2);

        assert!(verify_signature(payload, &signature, secret));
    }
}
