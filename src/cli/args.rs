//! Command-line argument parsing for Agora.

use crate::error::{AgoraError, Result};
use crate::forum::{CommentId, PostId, UserId, VoteKind};

/// A post or comment addressed from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Post(PostId),
    Comment(CommentId),
}

/// Command-line interface commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MemberAdd {
        bio: Option<String>,
    },
    MemberBio {
        bio: String,
    },
    MemberShow {
        user: UserId,
    },
    MemberDelete,
    Feed,
    ForumCreate {
        name: String,
        description: String,
    },
    ForumList,
    ForumShow {
        name: String,
    },
    ForumJoin {
        name: String,
    },
    ForumLeave {
        name: String,
    },
    PostPublish {
        forum: String,
        title: String,
        content: String,
    },
    PostShow {
        id: PostId,
    },
    PostList {
        forum: String,
    },
    PostEdit {
        id: PostId,
        content: String,
    },
    PostDelete {
        id: PostId,
    },
    CommentAdd {
        post: PostId,
        content: String,
    },
    CommentReply {
        parent: CommentId,
        content: String,
    },
    CommentShow {
        id: CommentId,
    },
    CommentList {
        post: PostId,
    },
    CommentReplies {
        parent: CommentId,
    },
    CommentEdit {
        id: CommentId,
        content: String,
    },
    CommentDelete {
        id: CommentId,
    },
    Vote {
        target: Target,
        direction: VoteKind,
    },
    State {
        target: Target,
    },
    Audit {
        target: Target,
    },
    Help,
}

/// A parsed command line: who is acting and what they asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub actor: Option<UserId>,
    pub command: Command,
}

/// Removes `--as <uuid>` from the arguments and parses it.
pub fn take_actor(args: &mut Vec<String>) -> Result<Option<UserId>> {
    let Some(pos) = args.iter().position(|a| a == "--as") else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(AgoraError::validation("--as requires a user id"));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    value.parse().map(Some)
}

/// Parses arguments (without the program name) into an invocation.
///
/// Storage flags must already have been consumed by
/// [`AgoraConfig::apply_args`](crate::config::AgoraConfig::apply_args).
pub fn parse_args(mut args: Vec<String>) -> Result<Invocation> {
    let actor = take_actor(&mut args)?;
    let command = parse_command(&args)?;
    Ok(Invocation { actor, command })
}

fn arg<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| AgoraError::validation(format!("Usage: agora {}", usage)))
}

fn parse_target(args: &[String], usage: &str) -> Result<Target> {
    let id = arg(args, 2, usage)?;
    match arg(args, 1, usage)? {
        "post" => Ok(Target::Post(id.parse()?)),
        "comment" => Ok(Target::Comment(id.parse()?)),
        other => Err(AgoraError::validation(format!(
            "Unknown target '{}', expected 'post' or 'comment'",
            other
        ))),
    }
}

fn parse_command(args: &[String]) -> Result<Command> {
    let Some(group) = args.first() else {
        return Ok(Command::Help);
    };
    let action = args.get(1).map(String::as_str).unwrap_or("");

    match (group.as_str(), action) {
        ("help" | "--help" | "-h", _) => Ok(Command::Help),

        ("member", "add") => Ok(Command::MemberAdd {
            bio: args.get(2).cloned(),
        }),
        ("member", "bio") => Ok(Command::MemberBio {
            bio: arg(args, 2, "member bio <text>")?.to_string(),
        }),
        ("member", "show") => Ok(Command::MemberShow {
            user: arg(args, 2, "member show <user-id>")?.parse()?,
        }),
        ("member", "delete") => Ok(Command::MemberDelete),
        ("feed", _) => Ok(Command::Feed),

        ("forum", "create") => Ok(Command::ForumCreate {
            name: arg(args, 2, "forum create <name> <description>")?.to_string(),
            description: arg(args, 3, "forum create <name> <description>")?.to_string(),
        }),
        ("forum", "list") => Ok(Command::ForumList),
        ("forum", "show") => Ok(Command::ForumShow {
            name: arg(args, 2, "forum show <name>")?.to_string(),
        }),
        ("forum", "join") => Ok(Command::ForumJoin {
            name: arg(args, 2, "forum join <name>")?.to_string(),
        }),
        ("forum", "leave") => Ok(Command::ForumLeave {
            name: arg(args, 2, "forum leave <name>")?.to_string(),
        }),

        ("post", "publish") => {
            let usage = "post publish <forum> <title> <content>";
            Ok(Command::PostPublish {
                forum: arg(args, 2, usage)?.to_string(),
                title: arg(args, 3, usage)?.to_string(),
                content: arg(args, 4, usage)?.to_string(),
            })
        }
        ("post", "show") => Ok(Command::PostShow {
            id: arg(args, 2, "post show <post-id>")?.parse()?,
        }),
        ("post", "list") => Ok(Command::PostList {
            forum: arg(args, 2, "post list <forum>")?.to_string(),
        }),
        ("post", "edit") => Ok(Command::PostEdit {
            id: arg(args, 2, "post edit <post-id> <content>")?.parse()?,
            content: arg(args, 3, "post edit <post-id> <content>")?.to_string(),
        }),
        ("post", "delete") => Ok(Command::PostDelete {
            id: arg(args, 2, "post delete <post-id>")?.parse()?,
        }),

        ("comment", "add") => Ok(Command::CommentAdd {
            post: arg(args, 2, "comment add <post-id> <content>")?.parse()?,
            content: arg(args, 3, "comment add <post-id> <content>")?.to_string(),
        }),
        ("comment", "reply") => Ok(Command::CommentReply {
            parent: arg(args, 2, "comment reply <comment-id> <content>")?.parse()?,
            content: arg(args, 3, "comment reply <comment-id> <content>")?.to_string(),
        }),
        ("comment", "show") => Ok(Command::CommentShow {
            id: arg(args, 2, "comment show <comment-id>")?.parse()?,
        }),
        ("comment", "list") => Ok(Command::CommentList {
            post: arg(args, 2, "comment list <post-id>")?.parse()?,
        }),
        ("comment", "replies") => Ok(Command::CommentReplies {
            parent: arg(args, 2, "comment replies <comment-id>")?.parse()?,
        }),
        ("comment", "edit") => Ok(Command::CommentEdit {
            id: arg(args, 2, "comment edit <comment-id> <content>")?.parse()?,
            content: arg(args, 3, "comment edit <comment-id> <content>")?.to_string(),
        }),
        ("comment", "delete") => Ok(Command::CommentDelete {
            id: arg(args, 2, "comment delete <comment-id>")?.parse()?,
        }),

        ("vote", _) => {
            let usage = "vote post|comment <id> up|down";
            Ok(Command::Vote {
                target: parse_target(args, usage)?,
                direction: arg(args, 3, usage)?.parse()?,
            })
        }
        ("state", _) => Ok(Command::State {
            target: parse_target(args, "state post|comment <id>")?,
        }),
        ("audit", _) => Ok(Command::Audit {
            target: parse_target(args, "audit post|comment <id>")?,
        }),

        _ => Err(AgoraError::validation(format!(
            "Unknown command '{}'",
            args.join(" ")
        ))),
    }
}

/// Print usage information
pub fn print_usage() {
    println!("Agora - community forums with voting");
    println!("====================================");
    println!();
    println!("Usage: agora [--data-dir <dir>] [--lock-timeout-ms <ms>] [--server] [--as <user-id>] <command>");
    println!();
    println!("Commands:");
    println!("  member add [bio]                         Create your member profile");
    println!("  member bio <text>                        Replace your bio");
    println!("  member show <user-id>                    Show a member profile");
    println!("  member delete                            Delete your account and its content");
    println!("  feed                                     Latest posts and replies for you");
    println!("  forum create <name> <description>        Create a forum");
    println!("  forum list                               List forums");
    println!("  forum show <name>                        Show a forum and its members");
    println!("  forum join|leave <name>                  Join or leave a forum");
    println!("  post publish <forum> <title> <content>   Publish a post");
    println!("  post show <post-id>                      Show a post");
    println!("  post list <forum>                        List posts, newest first");
    println!("  post edit <post-id> <content>            Edit your post");
    println!("  post delete <post-id>                    Delete your post");
    println!("  comment add <post-id> <content>          Comment on a post");
    println!("  comment reply <comment-id> <content>     Reply to a comment");
    println!("  comment show <comment-id>                Show a comment");
    println!("  comment list <post-id>                   List comments on a post");
    println!("  comment replies <comment-id>             List replies to a comment");
    println!("  comment edit <comment-id> <content>      Edit your comment");
    println!("  comment delete <comment-id>              Delete your comment");
    println!("  vote post|comment <id> up|down           Vote, flip or withdraw a vote");
    println!("  state post|comment <id>                  Show score and your vote");
    println!("  audit post|comment <id>                  Recount votes against the score");
    println!();
    println!("Examples:");
    println!("  agora --as 0b0e... member add");
    println!("  agora --as 0b0e... forum create rust 'All things Rust'");
    println!("  agora --as 0b0e... vote post 5f1c... up");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_empty_is_help() {
        assert_eq!(parse_args(vec![]).unwrap().command, Command::Help);
    }

    #[test]
    fn test_actor_flag_anywhere() {
        let user = UserId::new();
        let parsed = parse_args(args(&format!("forum list --as {}", user))).unwrap();
        assert_eq!(parsed.actor, Some(user));
        assert_eq!(parsed.command, Command::ForumList);

        assert!(parse_args(args("forum list --as")).is_err());
        assert!(parse_args(args("--as nope forum list")).is_err());
    }

    #[test]
    fn test_vote_command() {
        let post = PostId::new();
        let parsed = parse_args(args(&format!("vote post {} down", post))).unwrap();
        assert_eq!(
            parsed.command,
            Command::Vote {
                target: Target::Post(post),
                direction: VoteKind::Downvote,
            }
        );
        assert_eq!(parsed.actor, None);
    }

    #[test]
    fn test_bad_target_and_missing_args() {
        assert!(parse_args(args("vote thread x up")).is_err());
        assert!(parse_args(args("forum create rust")).is_err());
        assert!(parse_args(args("post show not-a-uuid")).is_err());
        assert!(parse_args(args("frobnicate")).is_err());
    }

    #[test]
    fn test_account_commands() {
        assert_eq!(
            parse_args(args("member delete")).unwrap().command,
            Command::MemberDelete
        );
        assert_eq!(parse_args(args("feed")).unwrap().command, Command::Feed);
    }

    #[test]
    fn test_member_add_optional_bio() {
        assert_eq!(
            parse_args(args("member add")).unwrap().command,
            Command::MemberAdd { bio: None }
        );
        assert_eq!(
            parse_args(args("member add hi")).unwrap().command,
            Command::MemberAdd {
                bio: Some("hi".to_string())
            }
        );
    }
}
