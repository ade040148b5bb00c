//! The closed set of commands the engine accepts, and their replies.
//!
//! Every variant maps 1:1 onto a handler in [`State`](crate::State). Commands
//! derive `Serialize`/`Deserialize` with an internal `type` tag, which is the
//! shape a JSON gateway decodes into:
//!
//! ```text
//! {"type":"vote","post_id":"Post 1","user_id":"bob","is_upvote":true}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::UserAction;
use crate::model::{DirectMessage, Post, Subreddit, User};
use crate::report::SimulationStats;

/// A request to mutate or query engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    RegisterUser {
        username: String,
    },
    CreateSubreddit {
        name: String,
        creator: String,
    },
    JoinSubreddit {
        subreddit_name: String,
        username: String,
    },
    LeaveSubreddit {
        subreddit_name: String,
        username: String,
    },
    /// `post_id` is assigned by the caller and must be globally unique.
    CreatePost {
        post_id: String,
        subreddit_name: String,
        author: String,
        title: String,
        content: String,
    },
    /// `parent_id == post_id` makes a top-level comment.
    CreateComment {
        post_id: String,
        parent_id: String,
        comment_id: String,
        author: String,
        content: String,
    },
    Vote {
        post_id: String,
        user_id: String,
        is_upvote: bool,
    },
    SendDirectMessage {
        from: String,
        to: String,
        content: String,
    },
    SharePostViaDirectMessage {
        from: String,
        to: String,
        post_id: String,
    },
    BookmarkPost {
        post_id: String,
        username: String,
    },
    UnbookmarkPost {
        post_id: String,
        username: String,
    },
    GetFeed {
        username: String,
    },
    GetUser {
        username: String,
    },
    GetSubreddit {
        name: String,
    },
    GetPost {
        post_id: String,
    },
    GetUserActions {
        username: String,
    },
    GetSimulationStats,
    PrintUserActions,
    PrintSubredditPostsAndComments,
}

impl Command {
    /// Stable name of the command, used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterUser { .. } => "RegisterUser",
            Command::CreateSubreddit { .. } => "CreateSubreddit",
            Command::JoinSubreddit { .. } => "JoinSubreddit",
            Command::LeaveSubreddit { .. } => "LeaveSubreddit",
            Command::CreatePost { .. } => "CreatePost",
            Command::CreateComment { .. } => "CreateComment",
            Command::Vote { .. } => "Vote",
            Command::SendDirectMessage { .. } => "SendDirectMessage",
            Command::SharePostViaDirectMessage { .. } => "SharePostViaDirectMessage",
            Command::BookmarkPost { .. } => "BookmarkPost",
            Command::UnbookmarkPost { .. } => "UnbookmarkPost",
            Command::GetFeed { .. } => "GetFeed",
            Command::GetUser { .. } => "GetUser",
            Command::GetSubreddit { .. } => "GetSubreddit",
            Command::GetPost { .. } => "GetPost",
            Command::GetUserActions { .. } => "GetUserActions",
            Command::GetSimulationStats => "GetSimulationStats",
            Command::PrintUserActions => "PrintUserActions",
            Command::PrintSubredditPostsAndComments => "PrintSubredditPostsAndComments",
        }
    }

    /// Returns true if a successful run of this command may change domain state.
    ///
    /// `GetFeed` is not a mutation even though it appends to the action log.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::RegisterUser { .. }
                | Command::CreateSubreddit { .. }
                | Command::JoinSubreddit { .. }
                | Command::LeaveSubreddit { .. }
                | Command::CreatePost { .. }
                | Command::CreateComment { .. }
                | Command::Vote { .. }
                | Command::SendDirectMessage { .. }
                | Command::SharePostViaDirectMessage { .. }
                | Command::BookmarkPost { .. }
                | Command::UnbookmarkPost { .. }
        )
    }
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// The command changed state.
    Done,
    /// The command succeeded without changing anything (already a member,
    /// not a member, silently skipped share).
    Unchanged,
    /// The message that was delivered to both mailboxes.
    Message(Arc<DirectMessage>),
    Feed(Vec<Post>),
    User(User),
    Subreddit(Subreddit),
    Post(Post),
    Actions(Vec<UserAction>),
    Stats(SimulationStats),
    /// Rendered text of a printing command.
    Report(String),
}

impl CommandReply {
    /// Returns true unless the reply is [`CommandReply::Unchanged`].
    pub fn changed(&self) -> bool {
        !matches!(self, CommandReply::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::Vote {
            post_id: "Post 1".into(),
            user_id: "bob".into(),
            is_upvote: true,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "vote");
        assert_eq!(json["post_id"], "Post 1");
        assert_eq!(json["is_upvote"], true);
    }

    #[test]
    fn test_command_decodes_from_gateway_json() {
        let cmd: Command = serde_json::from_str(
            r#"{"type":"create_comment","post_id":"p1","parent_id":"p1","comment_id":"c1","author":"bob","content":"nice"}"#,
        )
        .unwrap();
        assert_eq!(cmd.name(), "CreateComment");
        assert!(cmd.is_mutation());

        let cmd: Command = serde_json::from_str(r#"{"type":"get_simulation_stats"}"#).unwrap();
        assert_eq!(cmd, Command::GetSimulationStats);
        assert!(!cmd.is_mutation());
    }

    #[test]
    fn test_feed_is_not_a_mutation() {
        let cmd = Command::GetFeed {
            username: "alice".into(),
        };
        assert!(!cmd.is_mutation());
    }

    #[test]
    fn test_reply_changed() {
        assert!(CommandReply::Done.changed());
        assert!(!CommandReply::Unchanged.changed());
    }
}
