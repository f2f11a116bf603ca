//! Storage key generation and URL <-> key mapping shared by all backends.
//!
//! Key format: `{folder}/{timestamp_ms}_{token}.{ext}`. The millisecond
//! timestamp plus a random base-36 token keeps concurrent uploads from ever
//! writing to the same key; no existence check is made.

use folio_core::models::file_extension;
use rand::Rng;

use crate::traits::{StorageError, StorageResult};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 10;

/// Generate a fresh storage key for `filename` inside `folder`.
pub fn generate_storage_key(folder: &str, filename: &str) -> StorageResult<String> {
    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    build_storage_key(folder, timestamp_ms, &random_token(), filename)
}

/// Assemble a key from its parts. The extension comes from `filename`
/// (lowercased); names without one produce a key without a dot.
pub fn build_storage_key(
    folder: &str,
    timestamp_ms: i64,
    token: &str,
    filename: &str,
) -> StorageResult<String> {
    let folder = folder.trim().trim_matches('/');
    let name = match file_extension(filename) {
        Some(ext) => format!("{}_{}.{}", timestamp_ms, token, ext),
        None => format!("{}_{}", timestamp_ms, token),
    };
    let key = if folder.is_empty() {
        name
    } else {
        format!("{}/{}", folder, name)
    };
    validate_key(&key)?;
    Ok(key)
}

/// Short random base-36 string.
pub fn random_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

/// Reject keys that could escape the bucket prefix or the local base dir.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == ".." || segment.is_empty())
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid segments: {}",
            key
        )));
    }
    Ok(())
}

/// Check a destination folder before any work is done for it. Leading and
/// trailing slashes are ignored; an empty folder means the bucket root.
pub fn validate_folder(folder: &str) -> StorageResult<()> {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(());
    }
    validate_key(trimmed)
}

/// `{base_url}/{key}` with each key segment percent-encoded.
pub fn public_url(base_url: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}

/// Inverse of [`public_url`]. Query strings and fragments are ignored.
pub fn key_from_public_url(base_url: &str, url: &str) -> StorageResult<String> {
    let invalid = || StorageError::InvalidReference(url.to_string());

    let prefix = format!("{}/", base_url.trim_end_matches('/'));
    let rest = url.trim().strip_prefix(&prefix).ok_or_else(invalid)?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    let mut segments = Vec::new();
    for segment in rest.split('/') {
        let decoded = urlencoding::decode(segment).map_err(|_| invalid())?;
        segments.push(decoded.into_owned());
    }
    let key = segments.join("/");

    validate_key(&key).map_err(|_| invalid())?;
    Ok(key)
}
