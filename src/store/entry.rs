//! Stored image entries and their durable keys

use chrono::{DateTime, Utc};
use serde::Serialize;

const KEY_PREFIX: &str = "photo_";
const KEY_SUFFIX: &str = ".png";

/// One stored image. The payload lives in the blob backend under `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Strictly increasing in commit order; authoritative for ordering
    pub id: u64,
    /// Blob key, also the public file name
    pub key: String,
    /// Capture timestamp, never decreasing with `id`
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl Entry {
    /// Public access path for this entry
    pub fn url(&self) -> String {
        format!("/photos/{}", self.key)
    }
}

/// Blob key for an id allocated in this process.
/// Zero padding keeps lexical and numeric order aligned.
pub fn key_for_id(id: u64) -> String {
    format!("{}{:012}{}", KEY_PREFIX, id, KEY_SUFFIX)
}

/// Ordinal encoded in a key produced by [`key_for_id`], if any
pub fn ordinal_from_key(key: &str) -> Option<u64> {
    let digits = key.strip_prefix(KEY_PREFIX)?.strip_suffix(KEY_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Whether a blob key names a stored image
pub fn is_image_key(key: &str) -> bool {
    key.len() > KEY_SUFFIX.len() && key.ends_with(KEY_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        assert_eq!(key_for_id(42), "photo_000000000042.png");
        assert_eq!(ordinal_from_key(&key_for_id(42)), Some(42));
        assert_eq!(ordinal_from_key(&key_for_id(u64::MAX)), Some(u64::MAX));
    }

    #[test]
    fn test_keys_sort_like_ids() {
        let mut keys = vec![key_for_id(100), key_for_id(9), key_for_id(10)];
        keys.sort();
        assert_eq!(keys, vec![key_for_id(9), key_for_id(10), key_for_id(100)]);
    }

    #[test]
    fn test_foreign_keys_have_no_ordinal() {
        assert_eq!(ordinal_from_key("photo_1699999999999_0.png"), None);
        assert_eq!(ordinal_from_key("photo_.png"), None);
        assert_eq!(ordinal_from_key("photo_+12.png"), None);
        assert_eq!(ordinal_from_key("image_12.png"), None);
        assert_eq!(ordinal_from_key("photo_12.jpg"), None);
    }

    #[test]
    fn test_image_keys() {
        assert!(is_image_key("photo_1699999999999_0.png"));
        assert!(!is_image_key(".png"));
        assert!(!is_image_key("notes.txt"));
    }

    #[test]
    fn test_entry_url() {
        let entry = Entry { id: 3, key: key_for_id(3), created_at: Utc::now(), size_bytes: 10 };
        assert_eq!(entry.url(), "/photos/photo_000000000003.png");
    }
}
