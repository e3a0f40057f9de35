use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate a hex-encoded HMAC-SHA256 signature of `payload` keyed by `secret`.
pub fn sign_hmac_sha256(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(payload.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a hex-encoded HMAC-SHA256 signature using constant-time comparison
pub fn verify_hmac_sha256(
    secret: &str,
    payload: &str,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected_signature = sign_hmac_sha256(secret, payload)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let signature =
            sign_hmac_sha256("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            signature,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_signature_generation_and_verification() {
        let secret = "my_secret_key";
        let payload = "order_123|pay_456";

        let signature = sign_hmac_sha256(secret, payload).unwrap();
        assert!(!signature.is_empty());

        assert!(verify_hmac_sha256(secret, payload, &signature).unwrap());
    }

    #[test]
    fn test_invalid_signature() {
        let secret = "my_secret_key";
        let payload = "order_123|pay_456";

        let signature = sign_hmac_sha256(secret, payload).unwrap();
        let flipped = if signature.starts_with('a') { "b" } else { "a" };
        let invalid_signature = format!("{}{}", flipped, &signature[1..]);

        assert!(!verify_hmac_sha256(secret, payload, &invalid_signature).unwrap());
        assert!(!verify_hmac_sha256(secret, payload, "short").unwrap());
    }

    #[test]
    fn test_tampered_payload() {
        let secret = "my_secret_key";
        let signature = sign_hmac_sha256(secret, "order_123|pay_456").unwrap();

        assert!(!verify_hmac_sha256(secret, "order_123|pay_457", &signature).unwrap());
    }
}
