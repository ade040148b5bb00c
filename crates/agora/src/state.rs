//! The state container and one handler per command.
//!
//! `State` is plain synchronous data. It is owned by exactly one runtime task
//! (see [`Engine`](crate::Engine)), which is what serializes commands; the
//! handlers themselves never suspend.
//!
//! Every handler follows the same shape: look everything up and validate
//! first, then write. A handler that returns `Err` has not touched any
//! collection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::actions::{ActionLog, UserAction};
use crate::bus::EngineEvent;
use crate::command::{Command, CommandReply};
use crate::error::{EngineError, Entity, Result};
use crate::forest::find_comment_mut;
use crate::model::{Comment, DirectMessage, Post, Subreddit, User};
use crate::report::{SimulationStats, SubredditReport, UserActionsReport};

/// Facts produced by one command. Sharing a post produces two.
pub type Events = SmallVec<[EngineEvent; 2]>;

/// Outcome of a successful [`State::apply`].
#[derive(Debug, Clone)]
pub struct Applied {
    pub reply: CommandReply,
    pub events: Events,
}

impl Applied {
    fn reply(reply: CommandReply) -> Self {
        Self {
            reply,
            events: SmallVec::new(),
        }
    }

    fn done(event: EngineEvent) -> Self {
        Self {
            reply: CommandReply::Done,
            events: smallvec![event],
        }
    }
}

/// All mutable domain state.
#[derive(Debug, Clone, Default)]
pub struct State {
    users: HashMap<String, User>,
    subreddits: HashMap<String, Subreddit>,
    posts: HashMap<String, Post>,
    /// Every comment id in each post's forest.
    comment_ids: HashMap<String, HashSet<String>>,
    actions: ActionLog,
    strict_sharing: bool,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, sharing a post with a missing sender, recipient or post fails
    /// with `InvalidRecipient` instead of being skipped silently.
    pub fn with_strict_sharing(mut self, strict: bool) -> Self {
        self.strict_sharing = strict;
        self
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    pub fn subreddit(&self, name: &str) -> Option<&Subreddit> {
        self.subreddits.get(name)
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.get(post_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn subreddits(&self) -> impl Iterator<Item = &Subreddit> {
        self.subreddits.values()
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    pub fn actions(&self) -> &ActionLog {
        &self.actions
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn subreddit_count(&self) -> usize {
        self.subreddits.len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Apply one command.
    pub fn apply(&mut self, command: Command) -> Result<Applied> {
        match command {
            Command::RegisterUser { username } => self.register_user(username),
            Command::CreateSubreddit { name, creator } => self.create_subreddit(name, creator),
            Command::JoinSubreddit {
                subreddit_name,
                username,
            } => self.join_subreddit(&subreddit_name, &username),
            Command::LeaveSubreddit {
                subreddit_name,
                username,
            } => self.leave_subreddit(&subreddit_name, &username),
            Command::CreatePost {
                post_id,
                subreddit_name,
                author,
                title,
                content,
            } => self.create_post(Post::new(post_id, subreddit_name, author, title, content)),
            Command::CreateComment {
                post_id,
                parent_id,
                comment_id,
                author,
                content,
            } => self.create_comment(&post_id, Comment::new(comment_id, parent_id, author, content)),
            Command::Vote {
                post_id,
                user_id,
                is_upvote,
            } => self.vote(&post_id, &user_id, is_upvote),
            Command::SendDirectMessage { from, to, content } => {
                self.send_direct_message(DirectMessage::new(from, to, content))
            }
            Command::SharePostViaDirectMessage { from, to, post_id } => {
                self.share_post(&from, &to, &post_id)
            }
            Command::BookmarkPost { post_id, username } => self.bookmark_post(&post_id, &username),
            Command::UnbookmarkPost { post_id, username } => {
                self.unbookmark_post(&post_id, &username)
            }
            Command::GetFeed { username } => self.get_feed(&username),
            Command::GetUser { username } => self
                .user(&username)
                .cloned()
                .map(|user| Applied::reply(CommandReply::User(user)))
                .ok_or(EngineError::UnknownUser(username)),
            Command::GetSubreddit { name } => self
                .subreddit(&name)
                .cloned()
                .map(|subreddit| Applied::reply(CommandReply::Subreddit(subreddit)))
                .ok_or(EngineError::UnknownSubreddit(name)),
            Command::GetPost { post_id } => self
                .post(&post_id)
                .cloned()
                .map(|post| Applied::reply(CommandReply::Post(post)))
                .ok_or(EngineError::UnknownPost(post_id)),
            Command::GetUserActions { username } => Ok(Applied::reply(CommandReply::Actions(
                self.user_actions(&username),
            ))),
            Command::GetSimulationStats => Ok(Applied::reply(CommandReply::Stats(self.stats()))),
            Command::PrintUserActions => Ok(Applied::reply(CommandReply::Report(
                UserActionsReport::new(&self.actions).to_string(),
            ))),
            Command::PrintSubredditPostsAndComments => Ok(Applied::reply(CommandReply::Report(
                SubredditReport::new(self).to_string(),
            ))),
        }
    }

    // =========================================================================
    // Users and subreddits
    // =========================================================================

    fn register_user(&mut self, username: String) -> Result<Applied> {
        if self.users.contains_key(&username) {
            return Err(EngineError::AlreadyExists {
                entity: Entity::User,
                id: username,
            });
        }

        self.actions
            .record(&username, "[REGISTER USER] Registered as new user");
        self.users.insert(username.clone(), User::new(username.clone()));
        Ok(Applied::done(EngineEvent::UserRegistered { username }))
    }

    /// Name collision is checked before the creator's existence.
    fn create_subreddit(&mut self, name: String, creator: String) -> Result<Applied> {
        if self.subreddits.contains_key(&name) {
            return Err(EngineError::AlreadyExists {
                entity: Entity::Subreddit,
                id: name,
            });
        }
        let Some(user) = self.users.get_mut(&creator) else {
            return Err(EngineError::UnknownUser(creator));
        };

        user.subscribed_subreddits.insert(name.clone());
        self.actions.record(
            &creator,
            format!("[CREATE SUB] Subreddit created: {} by {}", name, creator),
        );
        self.subreddits
            .insert(name.clone(), Subreddit::new(name.clone(), creator.clone()));
        Ok(Applied::done(EngineEvent::SubredditCreated { name, creator }))
    }

    fn join_subreddit(&mut self, subreddit_name: &str, username: &str) -> Result<Applied> {
        let Some(subreddit) = self.subreddits.get_mut(subreddit_name) else {
            return Err(EngineError::UnknownSubreddit(subreddit_name.to_string()));
        };
        let Some(user) = self.users.get_mut(username) else {
            return Err(EngineError::UnknownUser(username.to_string()));
        };
        if subreddit.is_member(username) {
            return Ok(Applied::reply(CommandReply::Unchanged));
        }

        subreddit.members.insert(username.to_string());
        user.subscribed_subreddits.insert(subreddit_name.to_string());
        self.actions.record(
            username,
            format!("[JOIN SUB] {} joined subreddit {}", username, subreddit_name),
        );
        Ok(Applied::done(EngineEvent::SubredditJoined {
            subreddit_name: subreddit_name.to_string(),
            username: username.to_string(),
        }))
    }

    fn leave_subreddit(&mut self, subreddit_name: &str, username: &str) -> Result<Applied> {
        let Some(subreddit) = self.subreddits.get_mut(subreddit_name) else {
            return Err(EngineError::UnknownSubreddit(subreddit_name.to_string()));
        };
        let Some(user) = self.users.get_mut(username) else {
            return Err(EngineError::UnknownUser(username.to_string()));
        };
        if !subreddit.is_member(username) {
            return Ok(Applied::reply(CommandReply::Unchanged));
        }

        subreddit.members.remove(username);
        user.subscribed_subreddits.remove(subreddit_name);
        self.actions.record(
            username,
            format!("[LEAVE SUB] {} left subreddit {}", username, subreddit_name),
        );
        Ok(Applied::done(EngineEvent::SubredditLeft {
            subreddit_name: subreddit_name.to_string(),
            username: username.to_string(),
        }))
    }

    // =========================================================================
    // Posts, comments and votes
    // =========================================================================

    /// Subreddit is checked before the author.
    fn create_post(&mut self, post: Post) -> Result<Applied> {
        let Some(subreddit) = self.subreddits.get_mut(&post.subreddit_name) else {
            return Err(EngineError::UnknownSubreddit(post.subreddit_name));
        };
        let Some(author) = self.users.get_mut(&post.author) else {
            return Err(EngineError::UnknownUser(post.author));
        };
        if self.posts.contains_key(&post.id) {
            return Err(EngineError::AlreadyExists {
                entity: Entity::Post,
                id: post.id,
            });
        }

        // Self-upvote: Post::new starts at one upvote.
        author.karma += 1;
        subreddit.posts.push(post.id.clone());
        self.actions.record(
            &post.author,
            format!(
                "[POST] {} created in {} by {}: {}",
                post.id, post.subreddit_name, post.author, post.title
            ),
        );

        let event = EngineEvent::PostCreated {
            post_id: post.id.clone(),
            subreddit_name: post.subreddit_name.clone(),
            author: post.author.clone(),
        };
        self.comment_ids.insert(post.id.clone(), HashSet::new());
        self.posts.insert(post.id.clone(), post);
        Ok(Applied::done(event))
    }

    fn create_comment(&mut self, post_id: &str, comment: Comment) -> Result<Applied> {
        let Some(post) = self.posts.get_mut(post_id) else {
            return Err(EngineError::UnknownPost(post_id.to_string()));
        };
        let Some(author) = self.users.get_mut(&comment.author) else {
            return Err(EngineError::UnknownUser(comment.author));
        };
        let ids = self.comment_ids.entry(post_id.to_string()).or_default();
        if ids.contains(&comment.id) {
            return Err(EngineError::AlreadyExists {
                entity: Entity::Comment,
                id: comment.id,
            });
        }

        let top_level = comment.parent_id == post_id;
        let siblings = if top_level {
            &mut post.comments
        } else {
            // The id index is a fast negative check; the pre-order search
            // decides which node receives the reply.
            let parent = if ids.contains(&comment.parent_id) {
                find_comment_mut(&mut post.comments, &comment.parent_id)
            } else {
                None
            };
            match parent {
                Some(parent) => &mut parent.children,
                None => {
                    return Err(EngineError::UnknownParentComment {
                        post_id: post_id.to_string(),
                        parent_id: comment.parent_id,
                    })
                }
            }
        };

        let action = if top_level {
            format!(
                "[POST COMMENT] {} commented on post {}: {}",
                comment.author, post_id, comment.content
            )
        } else {
            format!(
                "[COMMENT REPLY] {} replied to {} on post {}: {}",
                comment.author, comment.parent_id, post_id, comment.content
            )
        };
        let event = EngineEvent::CommentCreated {
            post_id: post_id.to_string(),
            comment_id: comment.id.clone(),
            parent_id: comment.parent_id.clone(),
            author: comment.author.clone(),
        };

        author.karma += 1;
        ids.insert(comment.id.clone());
        self.actions.record(&comment.author, action);
        siblings.push(comment);
        Ok(Applied::done(event))
    }

    /// Adjusts the post author's karma; the voter's karma never changes.
    /// Repeated votes by the same user are counted independently.
    fn vote(&mut self, post_id: &str, voter: &str, is_upvote: bool) -> Result<Applied> {
        let Some(post) = self.posts.get_mut(post_id) else {
            return Err(EngineError::UnknownPost(post_id.to_string()));
        };
        if !self.users.contains_key(voter) {
            return Err(EngineError::UnknownUser(voter.to_string()));
        }
        let Some(author) = self.users.get_mut(&post.author) else {
            // Authors are checked at post creation and users are never deleted.
            return Err(EngineError::UnknownUser(post.author.clone()));
        };

        if is_upvote {
            post.upvotes += 1;
            author.karma += 1;
        } else {
            post.downvotes += 1;
            author.karma -= 1;
        }
        let author_karma = author.karma;

        let verb = if is_upvote { "upvoted" } else { "downvoted" };
        self.actions
            .record(voter, format!("[VOTE] {} {} post {}", voter, verb, post_id));
        Ok(Applied::done(EngineEvent::Voted {
            post_id: post_id.to_string(),
            voter: voter.to_string(),
            is_upvote,
            author_karma,
        }))
    }

    // =========================================================================
    // Messaging and bookmarks
    // =========================================================================

    /// Sender is checked before recipient.
    fn send_direct_message(&mut self, message: DirectMessage) -> Result<Applied> {
        if !self.users.contains_key(&message.from) {
            return Err(EngineError::UnknownUser(message.from));
        }
        if !self.users.contains_key(&message.to) {
            return Err(EngineError::UnknownUser(message.to));
        }

        let message = Arc::new(message);
        self.deliver(&message);
        self.actions.record(
            &message.from,
            format!("[DIRECT MESSAGE] DM sent to {}: {}", message.to, message.content),
        );
        Ok(Applied {
            events: smallvec![EngineEvent::MessageSent {
                from: message.from.clone(),
                to: message.to.clone(),
            }],
            reply: CommandReply::Message(message),
        })
    }

    /// Missing entities skip the share silently unless `strict_sharing` is set.
    fn share_post(&mut self, from: &str, to: &str, post_id: &str) -> Result<Applied> {
        let missing = [
            (from, self.users.contains_key(from)),
            (to, self.users.contains_key(to)),
            (post_id, self.posts.contains_key(post_id)),
        ]
        .into_iter()
        .find(|(_, exists)| !exists)
        .map(|(id, _)| id.to_string());

        let post = match (missing, self.posts.get(post_id)) {
            (None, Some(post)) => post,
            (Some(id), _) if self.strict_sharing => return Err(EngineError::InvalidRecipient(id)),
            _ => return Ok(Applied::reply(CommandReply::Unchanged)),
        };

        let message = Arc::new(DirectMessage::sharing(from, to, post));
        self.deliver(&message);
        self.actions
            .record(from, format!("[SHARE POST] Shared post {} with {}", post_id, to));
        self.actions
            .record(to, format!("[SHARE POST] Received post {} from {}", post_id, from));
        Ok(Applied {
            events: smallvec![
                EngineEvent::MessageSent {
                    from: from.to_string(),
                    to: to.to_string(),
                },
                EngineEvent::PostShared {
                    from: from.to_string(),
                    to: to.to_string(),
                    post_id: post_id.to_string(),
                },
            ],
            reply: CommandReply::Message(message),
        })
    }

    /// Push the same message into both mailboxes. Callers have checked both users exist.
    fn deliver(&mut self, message: &Arc<DirectMessage>) {
        if let Some(sender) = self.users.get_mut(&message.from) {
            sender.sent_messages.push(Arc::clone(message));
        }
        if let Some(recipient) = self.users.get_mut(&message.to) {
            recipient.received_messages.push(Arc::clone(message));
        }
    }

    fn bookmark_post(&mut self, post_id: &str, username: &str) -> Result<Applied> {
        if !self.posts.contains_key(post_id) {
            return Err(EngineError::UnknownPost(post_id.to_string()));
        }
        let Some(user) = self.users.get_mut(username) else {
            return Err(EngineError::UnknownUser(username.to_string()));
        };
        if !user.bookmarked_posts.insert(post_id.to_string()) {
            return Ok(Applied::reply(CommandReply::Unchanged));
        }

        self.actions
            .record(username, format!("[BOOKMARK] {} bookmarked post {}", username, post_id));
        Ok(Applied::done(EngineEvent::PostBookmarked {
            post_id: post_id.to_string(),
            username: username.to_string(),
        }))
    }

    fn unbookmark_post(&mut self, post_id: &str, username: &str) -> Result<Applied> {
        if !self.posts.contains_key(post_id) {
            return Err(EngineError::UnknownPost(post_id.to_string()));
        }
        let Some(user) = self.users.get_mut(username) else {
            return Err(EngineError::UnknownUser(username.to_string()));
        };
        if !user.bookmarked_posts.remove(post_id) {
            return Ok(Applied::reply(CommandReply::Unchanged));
        }

        self.actions.record(
            username,
            format!("[UNBOOKMARK] {} removed bookmark on post {}", username, post_id),
        );
        Ok(Applied::done(EngineEvent::PostUnbookmarked {
            post_id: post_id.to_string(),
            username: username.to_string(),
        }))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Posts from every subscribed subreddit. Order is unspecified.
    fn get_feed(&mut self, username: &str) -> Result<Applied> {
        let Some(user) = self.users.get(username) else {
            return Err(EngineError::UnknownUser(username.to_string()));
        };

        let feed: Vec<Post> = user
            .subscribed_subreddits
            .iter()
            .filter_map(|name| self.subreddits.get(name))
            .flat_map(|subreddit| subreddit.posts.iter())
            .filter_map(|post_id| self.posts.get(post_id))
            .cloned()
            .collect();

        self.actions
            .record(username, format!("[SHOW FEED] Feed for user {}", username));
        for post in &feed {
            self.actions.record(
                username,
                format!("[SHOW FEED]   {} (in {})", post.title, post.subreddit_name),
            );
        }
        Ok(Applied::reply(CommandReply::Feed(feed)))
    }

    fn user_actions(&self, username: &str) -> Vec<UserAction> {
        self.actions.actions(username).to_vec()
    }

    /// Counts plus per-user karma and per-post votes, sorted by identifier.
    pub fn stats(&self) -> SimulationStats {
        SimulationStats::collect(self)
    }
}
