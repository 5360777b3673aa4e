// HMAC-SHA256 signing for webhook deliveries, built on `ring`'s HMAC
// primitives.

use ring::hmac;

/// Sign `timestamp "." body` with the subscription secret, returning lowercase hex.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut message = format!("{}.", timestamp).into_bytes();
    message.extend_from_slice(body);
    let tag = hmac::sign(&key, &message);
    hex_encode(tag.as_ref())
}

/// Constant-time signature verification, for a reference client library.
pub fn verify(secret: &str, timestamp: i64, body: &[u8], signature_hex: &str) -> bool {
    let expected = sign(secret, timestamp, body);
    constant_time_eq(expected.as_bytes(), signature_hex.as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{:02x}", byte).expect("writing to a String never fails");
    }
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let signature = sign("secret", 1_700_000_000, b"{\"hello\":\"world\"}");
        assert!(verify("secret", 1_700_000_000, b"{\"hello\":\"world\"}", &signature));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let signature = sign("secret", 1_700_000_000, b"original");
        assert!(!verify("secret", 1_700_000_000, b"tampered", &signature));
    }
}
