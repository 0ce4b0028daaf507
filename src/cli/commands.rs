//! Command implementations for the Agora CLI.
//!
//! Each command runs against a [`ForumService`] and returns its result as
//! JSON; printing is left to the caller.

use crate::cli::args::{Command, Target};
use crate::cli::utils::to_json;
use crate::error::Result;
use crate::forum::{ForumService, UserId};
use serde_json::{json, Value};
use tracing::debug;

/// Executes one command on behalf of `actor`.
pub fn execute(service: &ForumService, actor: Option<UserId>, command: Command) -> Result<Value> {
    debug!(?command, actor = ?actor, "Executing command");

    match command {
        Command::Help => Ok(Value::Null),

        Command::MemberAdd { bio } => to_json(&service.register_member(actor, bio.as_deref())?),
        Command::MemberBio { bio } => to_json(&service.edit_bio(actor, &bio)?),
        Command::MemberShow { user } => to_json(&service.member(user)?),
        Command::MemberDelete => to_json(&service.delete_member(actor)?),
        Command::Feed => to_json(&service.feed(actor)?),

        Command::ForumCreate { name, description } => {
            to_json(&service.create_forum(actor, &name, &description)?)
        }
        Command::ForumList => to_json(&service.list_forums()?),
        Command::ForumShow { name } => {
            let forum = service.forum_by_name(&name)?;
            let members = service.forum_members(&name)?;
            Ok(json!({ "forum": to_json(&forum)?, "members": to_json(&members)? }))
        }
        Command::ForumJoin { name } => {
            let changed = service.join_forum(actor, &name)?;
            Ok(json!({ "forum": name, "joined": changed }))
        }
        Command::ForumLeave { name } => {
            let changed = service.leave_forum(actor, &name)?;
            Ok(json!({ "forum": name, "left": changed }))
        }

        Command::PostPublish {
            forum,
            title,
            content,
        } => to_json(&service.publish_post(actor, &forum, &title, &content)?),
        Command::PostShow { id } => {
            let post = service.post(id)?;
            let votes = service.post_vote_state(id, actor)?;
            Ok(json!({ "post": to_json(&post)?, "votes": to_json(&votes)? }))
        }
        Command::PostList { forum } => to_json(&service.forum_posts(&forum)?),
        Command::PostEdit { id, content } => to_json(&service.edit_post(actor, id, &content)?),
        Command::PostDelete { id } => {
            service.delete_post(actor, id)?;
            Ok(json!({ "deleted": id }))
        }

        Command::CommentAdd { post, content } => {
            to_json(&service.comment_on_post(actor, post, &content)?)
        }
        Command::CommentReply { parent, content } => {
            to_json(&service.reply_to_comment(actor, parent, &content)?)
        }
        Command::CommentShow { id } => {
            let comment = service.comment(id)?;
            let votes = service.comment_vote_state(id, actor)?;
            Ok(json!({ "comment": to_json(&comment)?, "votes": to_json(&votes)? }))
        }
        Command::CommentList { post } => to_json(&service.comments_for_post(post)?),
        Command::CommentReplies { parent } => to_json(&service.replies(parent)?),
        Command::CommentEdit { id, content } => {
            to_json(&service.edit_comment(actor, id, &content)?)
        }
        Command::CommentDelete { id } => {
            service.delete_comment(actor, id)?;
            Ok(json!({ "deleted": id }))
        }

        Command::Vote { target, direction } => match target {
            Target::Post(id) => to_json(&service.vote_post(actor, id, direction)?),
            Target::Comment(id) => to_json(&service.vote_comment(actor, id, direction)?),
        },
        Command::State { target } => match target {
            Target::Post(id) => to_json(&service.post_vote_state(id, actor)?),
            Target::Comment(id) => to_json(&service.comment_vote_state(id, actor)?),
        },
        Command::Audit { target } => match target {
            Target::Post(id) => to_json(&service.tally_post(id)?),
            Target::Comment(id) => to_json(&service.tally_comment(id)?),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{ForumStorage, Votable, VoteKind};
    use tempfile::TempDir;

    #[test]
    fn test_vote_output_shape() {
        let temp_dir = TempDir::new().unwrap();
        let service = ForumService::new(ForumStorage::new(temp_dir.path()).unwrap());
        let alice = Some(UserId::new());

        execute(&service, alice, Command::MemberAdd { bio: None }).unwrap();
        execute(
            &service,
            alice,
            Command::ForumCreate {
                name: "rust".into(),
                description: "about rust".into(),
            },
        )
        .unwrap();
        let post = service
            .publish_post(alice, "rust", "title", "body")
            .unwrap();

        let out = execute(
            &service,
            alice,
            Command::Vote {
                target: Target::Post(post.id()),
                direction: VoteKind::Downvote,
            },
        )
        .unwrap();
        assert_eq!(out["score"], -1);
        assert_eq!(out["vote"], "downvote");
        assert_eq!(out["buttons"]["downvote"], "Remove Downvote");

        let audit = execute(
            &service,
            None,
            Command::Audit {
                target: Target::Post(post.id()),
            },
        )
        .unwrap();
        assert_eq!(audit["consistent"], true);
        assert_eq!(audit["tally"]["downvotes"], 1);

        let feed = execute(&service, alice, Command::Feed).unwrap();
        assert_eq!(feed["posts"].as_array().map(Vec::len), Some(1));
        assert_eq!(feed["replies"].as_array().map(Vec::len), Some(0));

        let removal = execute(&service, alice, Command::MemberDelete).unwrap();
        assert_eq!(removal["forums"], 1);
        assert_eq!(removal["posts"], 1);
    }
}
