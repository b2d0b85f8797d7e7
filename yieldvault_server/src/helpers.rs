use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC-SHA256 over `data`, base64-encoded — the scheme both processors use to sign their webhook
/// bodies. The middleware compares this against the signature header.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // new_from_slice only fails for unusable key lengths, which HMAC does not have.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hmac_is_deterministic_and_key_sensitive() {
        let body = br#"{"reference":"ch_1"}"#;
        assert_eq!(calculate_hmac("key-1", body), calculate_hmac("key-1", body));
        assert_ne!(calculate_hmac("key-1", body), calculate_hmac("key-2", body));
    }
}
