//! Forum name normalization.
//!
//! Two forum names collide when they reduce to the same *signature*: the
//! name with separators (whitespace, punctuation, underscores, symbols)
//! removed and letters lower-cased. Digits are kept as they are, so `news1`
//! and `news` remain distinct while `TikTokNews` and `tik_tok_news` collide.
//!
//! Folding digits, diacritics or look-alike characters is a policy decision
//! that has not been made; only the rule above is applied.

use crate::error::{AgoraError, Result};

/// Computes the collision signature of a forum name.
pub fn signature(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Computes a signature, rejecting names that have none.
pub fn require_signature(name: &str) -> Result<String> {
    let sig = signature(name);
    if sig.is_empty() {
        return Err(AgoraError::validation(format!(
            "Forum name '{}' must contain at least one letter or digit",
            name
        )));
    }
    Ok(sig)
}

/// Returns true if two names would be rejected as duplicates of each other.
pub fn too_similar(a: &str, b: &str) -> bool {
    signature(a) == signature(b)
}
