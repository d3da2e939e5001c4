//! Webhook payload signing
//!
//! HMAC-SHA256 over the exact outgoing body bytes, hex-encoded. Only generic
//! and templated deliveries carry the signature header; platform-native
//! payloads are shaped by the destination platform and never signed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Compute the hex-encoded HMAC-SHA256 signature of a delivery body
pub fn sign_payload(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can accept any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature produced by `sign_payload`
///
/// Provided for receivers; comparison is constant-time.
pub fn verify_signature(body: &[u8], secret: &str, signature: &str) -> bool {
    let expected = sign_payload(body, secret);
    constant_time_compare(&expected, signature)
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_is_deterministic() {
        let body = br#"{"event":"form_submitted"}"#;
        assert_eq!(sign_payload(body, "s3cr3t"), sign_payload(body, "s3cr3t"));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        let signature = sign_payload(b"what do ya want for nothing?", "Jefe");
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_different_bodies_do_not_collide() {
        let a = sign_payload(br#"{"q1":"yes"}"#, "s3cr3t");
        let b = sign_payload(br#"{"q1":"no"}"#, "s3cr3t");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_verify() {
        let body = b"payload bytes";
        let signature = sign_payload(body, "secret-1");

        assert!(verify_signature(body, "secret-1", &signature));
        assert!(!verify_signature(body, "secret-2", &signature));
        assert!(!verify_signature(b"other bytes", "secret-1", &signature));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "ab"));
    }
}
