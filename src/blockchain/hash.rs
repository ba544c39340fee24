use sha2::{Digest, Sha256};

/// Hashes the concatenation of `fields` with SHA-256
///
/// Fields are fed to the hasher back to back with no separator, so the
/// caller fixes the field order.
pub fn digest_fields<I, F>(fields: I) -> [u8; 32]
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();

    for field in fields {
        hasher.update(field.as_ref());
    }

    hasher.finalize().into()
}

/// Same as [`digest_fields`], returned as a lowercase hexadecimal string
pub fn hash_fields<I, F>(fields: I) -> String
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    hex::encode(digest_fields(fields))
}

/// Checks whether a hex digest starts with `difficulty` zero characters
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
