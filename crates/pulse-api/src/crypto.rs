//! GitHub webhook signature verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw body, keyed by
//! the secret entered when the hook was created, and sends the digest in
//! `x-hub-signature-256` as `sha256=<hex>`.

use hmac::{Hmac, Mac};
use pulse_core::PulseError;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the SHA-256 signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Signature verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Missing signature header.
    #[error("signature header missing")]
    MissingSignature,
    /// Header present but not `sha256=<64 hex chars>`.
    #[error("invalid signature format: {0}")]
    InvalidFormat(String),
    /// Digest does not match the body.
    #[error("signature verification failed")]
    VerificationFailed,
    /// Secret cannot key an HMAC.
    #[error("invalid secret key")]
    InvalidSecret,
}

impl From<SignatureError> for PulseError {
    fn from(err: SignatureError) -> Self {
        Self::invalid_signature(err.to_string())
    }
}

/// Verifies a delivery against the shared secret.
///
/// The digest comparison runs in constant time.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
///
/// # Example
///
/// ```
/// use pulse_api::crypto::{sign, verify_signature};
///
/// let body = br#"{"zen":"Keep it logically awesome."}"#;
/// let header = sign(body, "my_secret").unwrap();
///
/// assert!(verify_signature(body, Some(&header), "my_secret").is_ok());
/// assert!(verify_signature(body, Some(&header), "other_secret").is_err());
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), SignatureError> {
    let signature = signature.map(str::trim).filter(|s| !s.is_empty());
    let signature = signature.ok_or(SignatureError::MissingSignature)?;
    let digest = parse_signature(signature)?;

    let mut mac = keyed_mac(secret)?;
    mac.update(payload);
    mac.verify_slice(&digest).map_err(|_| SignatureError::VerificationFailed)
}

/// Produces the `x-hub-signature-256` value GitHub would send for `payload`.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret is empty.
pub fn sign(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac = keyed_mac(secret)?;
    mac.update(payload);
    Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

fn keyed_mac(secret: &str) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)
}

/// Decodes `sha256=<hex>` into the raw 32-byte digest.
fn parse_signature(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let hex_digest = signature.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        SignatureError::InvalidFormat(format!("expected 'sha256=<hex>', got: {signature}"))
    })?;

    if hex_digest.len() != 64 {
        return Err(SignatureError::InvalidFormat(format!(
            "expected 64 hex characters, got {}",
            hex_digest.len()
        )));
    }

    hex::decode(hex_digest).map_err(|e| SignatureError::InvalidFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example from GitHub's "Validating webhook deliveries" guide.
    const GUIDE_SECRET: &str = "It's a Secret to Everybody";
    const GUIDE_PAYLOAD: &[u8] = b"Hello, World!";
    const GUIDE_SIGNATURE: &str =
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

    #[test]
    fn matches_published_example() {
        assert_eq!(sign(GUIDE_PAYLOAD, GUIDE_SECRET).unwrap(), GUIDE_SIGNATURE);
        assert!(verify_signature(GUIDE_PAYLOAD, Some(GUIDE_SIGNATURE), GUIDE_SECRET).is_ok());
    }

    #[test]
    fn tampered_payload_fails() {
        let result = verify_signature(b"Hello, World?", Some(GUIDE_SIGNATURE), GUIDE_SECRET);
        assert_eq!(result, Err(SignatureError::VerificationFailed));
    }

    #[test]
    fn missing_or_blank_signature_fails() {
        assert_eq!(
            verify_signature(GUIDE_PAYLOAD, None, GUIDE_SECRET),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verify_signature(GUIDE_PAYLOAD, Some("  "), GUIDE_SECRET),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn sha1_header_format_is_rejected() {
        let result = verify_signature(
            GUIDE_PAYLOAD,
            Some("sha1=01dc10d0c83e72ed246219cdd91669667fe2ca59"),
            GUIDE_SECRET,
        );
        assert!(matches!(result, Err(SignatureError::InvalidFormat(_))));
    }

    #[test]
    fn non_hex_digest_is_rejected() {
        let signature = format!("sha256={}", "z".repeat(64));
        let result = verify_signature(GUIDE_PAYLOAD, Some(&signature), GUIDE_SECRET);
        assert!(matches!(result, Err(SignatureError::InvalidFormat(_))));
    }

    #[test]
    fn empty_secret_is_invalid() {
        assert_eq!(sign(GUIDE_PAYLOAD, ""), Err(SignatureError::InvalidSecret));
    }

    #[test]
    fn converts_to_invalid_signature_error() {
        let err: PulseError = SignatureError::VerificationFailed.into();
        assert_eq!(err.code(), "P1001");
        assert!(err.is_client_error());
    }
}
