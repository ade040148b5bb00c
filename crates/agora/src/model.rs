//! Domain entities of the social graph.
//!
//! All identifiers are caller-assigned, case-sensitive strings, unique within
//! their collection. Entities are never deleted. Only the state engine
//! mutates them; everything handed to callers is an owned snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Derived from post authorship, comments and votes received.
    pub karma: i64,
    pub subscribed_subreddits: BTreeSet<String>,
    pub bookmarked_posts: BTreeSet<String>,
    /// Append-only. Entries are shared with the recipient's `received_messages`.
    pub sent_messages: Vec<Arc<DirectMessage>>,
    /// Append-only. Entries are shared with the sender's `sent_messages`.
    pub received_messages: Vec<Arc<DirectMessage>>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            karma: 0,
            subscribed_subreddits: BTreeSet::new(),
            bookmarked_posts: BTreeSet::new(),
            sent_messages: Vec::new(),
            received_messages: Vec::new(),
        }
    }

    pub fn is_subscribed(&self, subreddit_name: &str) -> bool {
        self.subscribed_subreddits.contains(subreddit_name)
    }
}

/// A community of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subreddit {
    pub name: String,
    /// Fixed at creation.
    pub creator: String,
    pub members: BTreeSet<String>,
    /// Ids of the posts made here, in creation order.
    pub posts: Vec<String>,
}

impl Subreddit {
    /// The creator is the initial member.
    pub fn new(name: impl Into<String>, creator: impl Into<String>) -> Self {
        let creator = creator.into();
        Self {
            name: name.into(),
            members: BTreeSet::from([creator.clone()]),
            creator,
            posts: Vec::new(),
        }
    }

    pub fn is_member(&self, username: &str) -> bool {
        self.members.contains(username)
    }
}

/// A post and its comment forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub subreddit_name: String,
    pub author: String,
    pub title: String,
    pub content: String,
    pub upvotes: u64,
    pub downvotes: u64,
    /// Top-level comments in insertion order; replies nest under `children`.
    pub comments: Vec<Comment>,
}

impl Post {
    /// A fresh post carries its author's self-upvote.
    pub fn new(
        id: impl Into<String>,
        subreddit_name: impl Into<String>,
        author: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subreddit_name: subreddit_name.into(),
            author: author.into(),
            title: title.into(),
            content: content.into(),
            upvotes: 1,
            downvotes: 0,
            comments: Vec::new(),
        }
    }

    /// Net score (upvotes minus downvotes).
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

/// A node in a post's comment forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    /// The owning post's id for top-level comments, otherwise the parent comment's id.
    pub parent_id: String,
    pub author: String,
    pub content: String,
    pub children: Vec<Comment>,
}

impl Comment {
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            author: author.into(),
            content: content.into(),
            children: Vec::new(),
        }
    }
}

/// Reference to a post carried by a shared direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPost {
    pub post_id: String,
    pub subreddit_name: String,
    pub title: String,
}

/// A direct message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub from: String,
    pub to: String,
    pub content: String,
    pub shared_post: Option<SharedPost>,
}

impl DirectMessage {
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            content: content.into(),
            shared_post: None,
        }
    }

    /// Build a message sharing `post`, with a one-line summary as content.
    pub fn sharing(from: impl Into<String>, to: impl Into<String>, post: &Post) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            content: format!(
                "Shared post {}: {} (in {})",
                post.id, post.title, post.subreddit_name
            ),
            shared_post: Some(SharedPost {
                post_id: post.id.clone(),
                subreddit_name: post.subreddit_name.clone(),
                title: post.title.clone(),
            }),
        }
    }
}
