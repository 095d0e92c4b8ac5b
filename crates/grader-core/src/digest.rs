use sha2::{Digest, Sha256};

/// Lowercase SHA-256 hex of `bytes`.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 hex over `parts` joined with `sep`, without building the joined string.
pub(crate) fn sha256_hex_joined<'a, I>(parts: I, sep: &[u8]) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            hasher.update(sep);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
