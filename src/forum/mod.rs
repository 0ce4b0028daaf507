//! Community forum with scored posts and threaded comments.
//!
//! Members create forums, publish posts in forums they belong to, and
//! comment on posts or reply to other comments. Posts and comments carry a
//! score that only the voting engine changes; every vote is backed by a
//! ledger record, one per (user, target).
//!
//! ## Hierarchy
//!
//! ```text
//! Forum
//!     └── Post
//!             └── Comment
//!                     └── Comment (reply)
//! ```
//!
//! ## Voting
//!
//! A vote intent (upvote or downvote) is resolved against the user's
//! existing vote on the target:
//!
//! | existing | intent   | score delta | ledger       |
//! |----------|----------|-------------|--------------|
//! | none     | up       | +1          | create up    |
//! | none     | down     | -1          | create down  |
//! | up       | up       | -1          | delete       |
//! | up       | down     | -2          | flip to down |
//! | down     | down     | +1          | delete       |
//! | down     | up       | +2          | flip to up   |
//!
//! The score change and the ledger change commit in one transaction, so a
//! target's score always equals its upvotes minus its downvotes.

mod comment;
mod community;
pub mod constants;
mod feed;
mod member;
pub mod naming;
pub mod permissions;
mod post;
pub mod service;
pub mod storage;
pub mod types;
pub mod validation;
pub mod vote;

pub use comment::{Comment, CommentLink};
pub use community::Forum;
pub use feed::Feed;
pub use member::Member;
pub use post::Post;
pub use service::ForumService;
pub use storage::{ForumStorage, MemberRemoval, StoredVotable};
pub use types::{CommentId, EntityId, ForumId, PostId, UserId};
pub use vote::{
    LedgerMutation, Votable, VoteAudit, VoteButtons, VoteKind, VoteOutcome, VoteRecord,
    VoteState, VoteTally, VoteTransition,
};
