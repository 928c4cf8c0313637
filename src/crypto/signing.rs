use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Sign payload bytes with HMAC-SHA256, returning the hex digest.
///
/// The signature covers the exact bytes sent on the wire, so the caller must
/// serialize once and sign that serialization.
pub fn sign(payload: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex HMAC-SHA256 signature against payload bytes.
///
/// This is a predicate: malformed or truncated signatures return false,
/// never an error. Comparison is constant-time to avoid leaking how many
/// leading bytes of a guessed signature were correct.
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign(payload, secret);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

/// Generate a fresh webhook secret: 32 random bytes, hex-encoded.
pub fn generate_secret() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
