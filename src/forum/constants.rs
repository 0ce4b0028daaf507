//! Shared constants for forum validation and limits.
//!
//! Limits are counted in characters, not bytes.

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum forum name length.
pub const MAX_FORUM_NAME_LEN: usize = 15;

/// Maximum forum description length.
pub const MAX_FORUM_DESCRIPTION_LEN: usize = 255;

/// Maximum post title length.
pub const MAX_POST_TITLE_LEN: usize = 30;

/// Maximum post or comment body length.
pub const MAX_CONTENT_LEN: usize = 255;

/// Maximum member bio length.
pub const MAX_BIO_LEN: usize = 255;

// =============================================================================
// Defaults
// =============================================================================

/// Bio given to members who register without one.
pub const DEFAULT_BIO: &str = "Hello everyone, I'm using Agora!";

// =============================================================================
// Feed
// =============================================================================

/// Number of replies shown in a member's feed.
pub const FEED_REPLY_LIMIT: usize = 3;
