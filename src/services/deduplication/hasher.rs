//! Content hashing for deduplication.
//!
//! Raw notification text and merchant names are normalized before hashing so
//! that formatting noise (case, spacing) never produces distinct identities.

use sha2::{Digest, Sha256};

/// Length of the hex prefix used when a hash is embedded in a fingerprint.
pub const SHORT_HASH_LEN: usize = 16;

/// SHA-256 hasher for notification text and merchants.
///
/// # Normalization
///
/// Text is trimmed, lowercased and has whitespace runs collapsed to single
/// spaces. Merchants are lowercased with all whitespace removed, so
/// `"Coffee Shop"` and `"coffeeshop"` share a hash.
///
/// # Example
///
/// ```rust
/// use notiledger::services::deduplication::ContentHasher;
///
/// let hash = ContentHasher::text_hash("Paid to CoffeeShop 28.50");
/// assert_eq!(hash.len(), 64);
///
/// let hash2 = ContentHasher::text_hash("  paid   to coffeeshop 28.50 ");
/// assert_eq!(hash, hash2);
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Hash of the normalized notification text, 64 hex chars.
    #[must_use]
    pub fn text_hash(content: &str) -> String {
        Self::sha256_hex(&Self::normalize_text(content))
    }

    /// Short hash of the normalized merchant.
    ///
    /// A missing merchant hashes the empty string so the fingerprint shape
    /// stays fixed.
    #[must_use]
    pub fn merchant_hash(merchant: Option<&str>) -> String {
        let normalized = merchant.map(Self::normalize_merchant).unwrap_or_default();
        Self::short(&Self::sha256_hex(&normalized)).to_string()
    }

    /// Returns the first [`SHORT_HASH_LEN`] chars of a hash.
    #[must_use]
    pub fn short(hash: &str) -> &str {
        hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
    }

    /// Normalizes text for hashing.
    ///
    /// ```rust
    /// use notiledger::services::deduplication::ContentHasher;
    ///
    /// assert_eq!(ContentHasher::normalize_text("  Paid   TO x "), "paid to x");
    /// ```
    #[must_use]
    pub fn normalize_text(content: &str) -> String {
        content
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalizes a merchant for hashing: lowercase, no whitespace at all.
    #[must_use]
    pub fn normalize_merchant(merchant: &str) -> String {
        merchant
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    fn sha256_hex(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_hash_produces_64_char_hex() {
        let hash = ContentHasher::text_hash("向【星巴克咖啡】付款28.50元");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_text_hash_case_and_whitespace_insensitive() {
        let hash1 = ContentHasher::text_hash("Paid to CoffeeShop 28.50");
        let hash2 = ContentHasher::text_hash("  PAID  to   coffeeshop 28.50");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_different_text_different_hash() {
        let hash1 = ContentHasher::text_hash("paid to CoffeeShop 28.50");
        let hash2 = ContentHasher::text_hash("payment successful, CoffeeShop, ¥28.50");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_merchant_hash_ignores_inner_whitespace() {
        let hash1 = ContentHasher::merchant_hash(Some("Coffee Shop"));
        let hash2 = ContentHasher::merchant_hash(Some("coffeeshop"));
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), SHORT_HASH_LEN);
    }

    #[test]
    fn test_missing_merchant_is_stable() {
        assert_eq!(
            ContentHasher::merchant_hash(None),
            ContentHasher::merchant_hash(Some("   "))
        );
    }

    #[test]
    fn test_short_handles_short_input() {
        assert_eq!(ContentHasher::short("abc"), "abc");
        assert_eq!(ContentHasher::short(&"a".repeat(64)).len(), SHORT_HASH_LEN);
    }
}
