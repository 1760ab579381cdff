use sha2::{Digest, Sha256};

pub fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Fixed-width hex prefix of the SHA-256 of `key`. Equal widths keep one key
/// from ever being a substring-prefix of another.
pub fn short_key_hash(key: &str) -> String {
    let digest = sha256_hex(key.as_bytes());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::{sha256_hex, short_key_hash};

    #[test]
    fn unit_sha256_hex_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn functional_short_key_hash_is_stable_and_fixed_width() {
        let first = short_key_hash("delivery-1:0");
        assert_eq!(first.len(), 16);
        assert_eq!(first, short_key_hash("delivery-1:0"));
        assert_ne!(first, short_key_hash("delivery-1:1"));
    }
}
