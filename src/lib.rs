//! # Agora
//!
//! Community forums with scored posts and threaded comments.
//!
//! ## Features
//!
//! - **Forums**: named communities with an owner and members; names that
//!   differ only in case or punctuation are rejected as duplicates
//! - **Posts and comments**: comments attach to a post or reply to another comment
//! - **Voting**: one toggleable vote per user and target, applied atomically
//!   together with the target's score
//! - **Members**: profiles with a bio, a feed of recent activity, and account
//!   deletion that takes the member's content and votes with it
//! - **Persistence**: RocksDB with pessimistic row-locking transactions
//!
//! ## Examples
//!
//! ```rust,no_run
//! use agora::config::AgoraConfig;
//! use agora::forum::{ForumService, UserId, Votable, VoteKind};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ForumService::open(&AgoraConfig::from_env()?)?;
//! let alice = Some(UserId::new());
//!
//! service.register_member(alice, None)?;
//! service.create_forum(alice, "rust", "All things Rust")?;
//! let post = service.publish_post(alice, "rust", "Hello", "First post")?;
//!
//! let state = service.vote_post(alice, post.id(), VoteKind::Upvote)?;
//! assert_eq!(state.score, 1);
//! assert_eq!(state.buttons.upvote, "Remove Upvote");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod forum;
pub mod storage;

pub use error::{AgoraError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
