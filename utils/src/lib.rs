//! # Tracker Sync Utilities
//!
//! Hashing and text normalization shared by the reconciliation engine.
//!
//! - SHA-256 record fingerprints for change detection
//! - Display-text normalization for duplicate detection

use sha2::{Digest, Sha256};

/// Separator placed between fingerprint fields.
///
/// ASCII unit separator; never produced by a spreadsheet cell, so
/// `("a|b", "c")` and `("a", "b|c")` cannot collide.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Compute a fingerprint over an ordered list of fields.
///
/// Field order is significant. Absent fields should be passed as `""`.
///
/// ```
/// use utils::compute_fingerprint;
///
/// let a = compute_fingerprint(["Launch", "", "ana@example.com"]);
/// let b = compute_fingerprint(["Launch", "ana@example.com", ""]);
/// assert_ne!(a, b);
/// ```
#[must_use]
pub fn compute_fingerprint<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>
{
    let mut hasher = Sha256::new();
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            let mut buf = [0u8; 4];
            hasher.update(FIELD_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(field.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Normalize display text for equality checks.
///
/// Lowercases, trims and collapses every run of whitespace to one space.
#[must_use]
pub fn normalize_display_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive label comparison (status names, issue kinds).
#[must_use]
pub fn labels_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_fingerprint_deterministic(a in "\\PC*", b in "\\PC*") {
            prop_assert_eq!(
                compute_fingerprint([a.as_str(), b.as_str()]),
                compute_fingerprint([a.as_str(), b.as_str()])
            );
        }

        #[test]
        fn test_normalize_idempotent(text in "\\PC*") {
            let once = normalize_display_text(&text);
            prop_assert_eq!(normalize_display_text(&once), once.clone());
        }
    }
}
