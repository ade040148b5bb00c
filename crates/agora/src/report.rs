//! Read-only reports over engine state.
//!
//! Reports are `Display` wrappers so callers decide where the text goes. Output
//! is deterministic: users, subreddits and post ids are sorted by name, and
//! posts inside a subreddit appear in creation order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::ActionLog;
use crate::forest::PreOrder;
use crate::model::Post;
use crate::state::State;

/// Vote and comment totals for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub post_id: String,
    pub author: String,
    pub subreddit_name: String,
    pub upvotes: u64,
    pub downvotes: u64,
    /// Top-level comments only.
    pub comments: usize,
}

impl From<&Post> for PostStats {
    fn from(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            author: post.author.clone(),
            subreddit_name: post.subreddit_name.clone(),
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            comments: post.comments.len(),
        }
    }
}

/// Summary of the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub total_users: usize,
    pub total_subreddits: usize,
    pub total_posts: usize,
    /// `(username, karma)` sorted by username.
    pub karma: Vec<(String, i64)>,
    /// Sorted by post id.
    pub posts: Vec<PostStats>,
}

impl SimulationStats {
    pub fn collect(state: &State) -> Self {
        let mut karma: Vec<(String, i64)> = state
            .users()
            .map(|user| (user.username.clone(), user.karma))
            .collect();
        karma.sort();

        let mut posts: Vec<PostStats> = state.posts().map(PostStats::from).collect();
        posts.sort_by(|a, b| a.post_id.cmp(&b.post_id));

        Self {
            total_users: state.user_count(),
            total_subreddits: state.subreddit_count(),
            total_posts: state.post_count(),
            karma,
            posts,
        }
    }
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----Simulation Statistics----")?;
        writeln!(f, "Total Users: {}", self.total_users)?;
        writeln!(f, "Total Subreddits: {}", self.total_subreddits)?;
        writeln!(f, "Total Posts: {}", self.total_posts)?;

        writeln!(f, "\nUser Karma:")?;
        for (username, karma) in &self.karma {
            writeln!(f, "{}: {} karma", username, karma)?;
        }

        writeln!(f, "\nPost Statistics:")?;
        for post in &self.posts {
            writeln!(
                f,
                "{} by {} in {}: {} upvotes, {} downvotes, {} comments",
                post.post_id,
                post.author,
                post.subreddit_name,
                post.upvotes,
                post.downvotes,
                post.comments
            )?;
        }
        Ok(())
    }
}

/// Every user's action history.
pub struct UserActionsReport<'a> {
    log: &'a ActionLog,
}

impl<'a> UserActionsReport<'a> {
    pub fn new(log: &'a ActionLog) -> Self {
        Self { log }
    }
}

impl fmt::Display for UserActionsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------- Printing User Actions --------")?;
        for entry in self.log.sorted() {
            writeln!(f, "\n{} Actions:", entry.username)?;
            for action in &entry.actions {
                writeln!(f, "{}", action.action)?;
            }
        }
        Ok(())
    }
}

/// Every subreddit with its posts and indented comment forests.
pub struct SubredditReport<'a> {
    state: &'a State,
}

impl<'a> SubredditReport<'a> {
    pub fn new(state: &'a State) -> Self {
        Self { state }
    }

    fn write_post(f: &mut fmt::Formatter<'_>, number: usize, post: &Post) -> fmt::Result {
        writeln!(f, "\n>Post {}: {} by {}", number, post.title, post.author)?;
        writeln!(f, " Content: {}", post.content)?;
        writeln!(f, " Upvotes: {} | Downvotes: {}", post.upvotes, post.downvotes)?;
        if post.comments.is_empty() {
            return writeln!(f, " No comments yet.");
        }

        writeln!(f, " Comments:")?;
        for (depth, comment) in PreOrder::new(&post.comments) {
            let indent = "  ".repeat(depth + 1);
            writeln!(f, "{}- {}: {}", indent, comment.author, comment.content)?;
        }
        Ok(())
    }
}

impl fmt::Display for SubredditReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Subreddit-wise Posts and Comments ---")?;

        let mut subreddits: Vec<_> = self.state.subreddits().collect();
        subreddits.sort_by(|a, b| a.name.cmp(&b.name));

        for subreddit in subreddits {
            writeln!(f, "\nSubreddit: {}", subreddit.name)?;

            let posts: Vec<&Post> = subreddit
                .posts
                .iter()
                .filter_map(|id| self.state.post(id))
                .collect();
            if posts.is_empty() {
                writeln!(f, "\nNo posts in this subreddit yet.")?;
            }
            for (index, post) in posts.iter().enumerate() {
                Self::write_post(f, index + 1, post)?;
            }

            writeln!(f, "\n-> Summary:")?;
            writeln!(f, " Total {} Posts.", posts.len())?;
            writeln!(f, " Total {} members.", subreddit.members.len())?;
        }
        Ok(())
    }
}
