//! Input validation for user-supplied text.
//!
//! Required fields are trimmed before checking; a field that is empty after
//! trimming is rejected with `EmptyInput` before anything reaches the store.

use crate::error::{AgoraError, Result};

/// Trims a required text field and checks it against a length limit.
///
/// # Errors
/// - `EmptyInput` if the value is blank
/// - `Validation` if the trimmed value is longer than `max_chars`
pub fn require_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AgoraError::empty_input(field));
    }

    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(AgoraError::validation(format!(
            "The {} can be at most {} characters long (got {})",
            field, max_chars, len
        )));
    }

    Ok(trimmed.to_string())
}
