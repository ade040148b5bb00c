//! Agora Engine - the single ingress point for commands.
//!
//! ```text
//! EngineClient ─┐
//! EngineClient ─┼─► mpsc (arrival order) ─► Runtime ─► State
//! EngineClient ─┘                              │
//!                                              └─► EventBus ─► subscribers
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use agora_core::{EngineBuilder, EngineConfig};
//!
//! let handle = EngineBuilder::new()
//!     .with_config(EngineConfig::default())
//!     .build()
//!     .start();
//!
//! // Await the result of one command
//! handle.register_user("alice").await?;
//!
//! // Or enqueue without waiting
//! handle.send(Command::RegisterUser { username: "bob".into() }).await?;
//!
//! // Drain the queue and take the final state
//! let state = handle.shutdown().await?;
//! ```
//!
//! # Submit vs Send
//!
//! - `submit()`: waits for the command to be applied and returns its reply.
//! - `send()`: returns once the command is queued. Failures are not reported.
//!
//! Both go through the same ordered channel, so a `submit` issued after a
//! `send` from the same task always observes the sent command's effects.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::actions::UserAction;
use crate::bus::{EventBus, EventEnvelope};
use crate::command::{Command, CommandReply};
use crate::config::EngineConfig;
use crate::correlation::CorrelationId;
use crate::error::{EngineError, Result};
use crate::model::{DirectMessage, Post, Subreddit, User};
use crate::report::SimulationStats;
use crate::runtime::{Envelope, Message, Runtime};
use crate::state::State;

// =============================================================================
// Engine
// =============================================================================

/// A built engine that has not been started yet.
pub struct Engine {
    runtime: Runtime,
    client: EngineClient,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Get the event bus.
    pub fn bus(&self) -> &EventBus {
        &self.client.bus
    }

    /// Start the engine, running the runtime in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> EngineHandle {
        info!("starting agora engine");

        let task = tokio::spawn(self.runtime.run());

        EngineHandle {
            client: self.client,
            task,
        }
    }
}

// =============================================================================
// Engine Handle
// =============================================================================

/// Owner of a running engine.
///
/// Derefs to [`EngineClient`] for submitting commands. Clone the client (via
/// [`EngineHandle::client`]) to submit from many tasks; the handle itself
/// stays with whoever is responsible for shutdown.
pub struct EngineHandle {
    client: EngineClient,
    task: JoinHandle<State>,
}

impl EngineHandle {
    /// A cloneable client feeding the same ordered channel.
    pub fn client(&self) -> EngineClient {
        self.client.clone()
    }

    /// Stop the engine after every command enqueued so far is applied.
    ///
    /// Returns the final state. Commands submitted afterwards fail with
    /// [`EngineError::Stopped`].
    pub async fn shutdown(self) -> Result<State> {
        // A closed channel means the task already exited; joining still
        // yields its state.
        if self.client.sender.send(Message::Shutdown).await.is_err() {
            warn!("engine channel already closed at shutdown");
        }
        self.task.await.map_err(|error| {
            warn!(error = %error, "engine task did not finish cleanly");
            EngineError::Stopped
        })
    }

    /// Abort the engine's background task.
    ///
    /// Call this during test teardown. Queued commands are dropped and their
    /// callers observe [`EngineError::Stopped`].
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Deref for EngineHandle {
    type Target = EngineClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("client", &self.client)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

// =============================================================================
// Engine Client
// =============================================================================

/// Cloneable sender side of the engine.
#[derive(Clone)]
pub struct EngineClient {
    sender: mpsc::Sender<Message>,
    bus: EventBus,
}

impl EngineClient {
    /// Submit a command and wait for its reply.
    ///
    /// Waits for channel capacity if the engine is backed up.
    pub async fn submit(&self, command: Command) -> Result<CommandReply> {
        let (reply, receiver) = oneshot::channel();
        let envelope = Envelope {
            cid: CorrelationId::new(),
            command,
            reply: Some(reply),
        };

        self.sender
            .send(Message::Command(envelope))
            .await
            .map_err(|_| EngineError::Stopped)?;

        receiver.await.map_err(|_| EngineError::Stopped)?
    }

    /// Submit a command and give up waiting after `duration`.
    ///
    /// The command may still be applied after this returns
    /// [`EngineError::Timeout`].
    pub async fn submit_timeout(&self, command: Command, duration: Duration) -> Result<CommandReply> {
        match tokio::time::timeout(duration, self.submit(command)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout { duration }),
        }
    }

    /// Enqueue a command without waiting for it to be applied.
    pub async fn send(&self, command: Command) -> Result<()> {
        let envelope = Envelope {
            cid: CorrelationId::new(),
            command,
            reply: None,
        };
        self.sender
            .send(Message::Command(envelope))
            .await
            .map_err(|_| EngineError::Stopped)
    }

    /// Subscribe to facts about applied commands.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.bus.subscribe()
    }

    /// Returns true once the engine has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    pub async fn register_user(&self, username: impl Into<String>) -> Result<()> {
        self.submit_done(Command::RegisterUser {
            username: username.into(),
        })
        .await
    }

    pub async fn create_subreddit(
        &self,
        name: impl Into<String>,
        creator: impl Into<String>,
    ) -> Result<()> {
        self.submit_done(Command::CreateSubreddit {
            name: name.into(),
            creator: creator.into(),
        })
        .await
    }

    /// Returns false if the user was already a member.
    pub async fn join_subreddit(
        &self,
        subreddit_name: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<bool> {
        self.submit_changed(Command::JoinSubreddit {
            subreddit_name: subreddit_name.into(),
            username: username.into(),
        })
        .await
    }

    /// Returns false if the user was not a member.
    pub async fn leave_subreddit(
        &self,
        subreddit_name: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<bool> {
        self.submit_changed(Command::LeaveSubreddit {
            subreddit_name: subreddit_name.into(),
            username: username.into(),
        })
        .await
    }

    pub async fn create_post(
        &self,
        post_id: impl Into<String>,
        subreddit_name: impl Into<String>,
        author: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        self.submit_done(Command::CreatePost {
            post_id: post_id.into(),
            subreddit_name: subreddit_name.into(),
            author: author.into(),
            title: title.into(),
            content: content.into(),
        })
        .await
    }

    /// `parent_id == post_id` makes a top-level comment.
    pub async fn create_comment(
        &self,
        post_id: impl Into<String>,
        parent_id: impl Into<String>,
        comment_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        self.submit_done(Command::CreateComment {
            post_id: post_id.into(),
            parent_id: parent_id.into(),
            comment_id: comment_id.into(),
            author: author.into(),
            content: content.into(),
        })
        .await
    }

    pub async fn vote(
        &self,
        post_id: impl Into<String>,
        user_id: impl Into<String>,
        is_upvote: bool,
    ) -> Result<()> {
        self.submit_done(Command::Vote {
            post_id: post_id.into(),
            user_id: user_id.into(),
            is_upvote,
        })
        .await
    }

    pub async fn send_direct_message(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Arc<DirectMessage>> {
        let command = Command::SendDirectMessage {
            from: from.into(),
            to: to.into(),
            content: content.into(),
        };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Message(message) => Ok(message),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    /// Returns `None` when the share was skipped because something was missing.
    pub async fn share_post(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        post_id: impl Into<String>,
    ) -> Result<Option<Arc<DirectMessage>>> {
        let command = Command::SharePostViaDirectMessage {
            from: from.into(),
            to: to.into(),
            post_id: post_id.into(),
        };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Message(message) => Ok(Some(message)),
            CommandReply::Unchanged => Ok(None),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    /// Returns false if the post was already bookmarked.
    pub async fn bookmark_post(
        &self,
        post_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<bool> {
        self.submit_changed(Command::BookmarkPost {
            post_id: post_id.into(),
            username: username.into(),
        })
        .await
    }

    /// Returns false if the post was not bookmarked.
    pub async fn unbookmark_post(
        &self,
        post_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<bool> {
        self.submit_changed(Command::UnbookmarkPost {
            post_id: post_id.into(),
            username: username.into(),
        })
        .await
    }

    /// Posts from every subreddit the user subscribes to, in no particular order.
    pub async fn get_feed(&self, username: impl Into<String>) -> Result<Vec<Post>> {
        let command = Command::GetFeed {
            username: username.into(),
        };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Feed(posts) => Ok(posts),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    pub async fn get_user(&self, username: impl Into<String>) -> Result<User> {
        let command = Command::GetUser {
            username: username.into(),
        };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::User(user) => Ok(user),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    pub async fn get_subreddit(&self, name: impl Into<String>) -> Result<Subreddit> {
        let command = Command::GetSubreddit { name: name.into() };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Subreddit(subreddit) => Ok(subreddit),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    pub async fn get_post(&self, post_id: impl Into<String>) -> Result<Post> {
        let command = Command::GetPost {
            post_id: post_id.into(),
        };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Post(post) => Ok(post),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    pub async fn get_user_actions(&self, username: impl Into<String>) -> Result<Vec<UserAction>> {
        let command = Command::GetUserActions {
            username: username.into(),
        };
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Actions(actions) => Ok(actions),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    pub async fn simulation_stats(&self) -> Result<SimulationStats> {
        match self.submit(Command::GetSimulationStats).await? {
            CommandReply::Stats(stats) => Ok(stats),
            _ => Err(EngineError::UnexpectedReply {
                command: "GetSimulationStats",
            }),
        }
    }

    /// Rendered history of every user.
    pub async fn print_user_actions(&self) -> Result<String> {
        self.submit_report(Command::PrintUserActions).await
    }

    /// Rendered subreddits with their posts and comment trees.
    pub async fn print_subreddits(&self) -> Result<String> {
        self.submit_report(Command::PrintSubredditPostsAndComments)
            .await
    }

    async fn submit_done(&self, command: Command) -> Result<()> {
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Done => Ok(()),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    async fn submit_changed(&self, command: Command) -> Result<bool> {
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Done => Ok(true),
            CommandReply::Unchanged => Ok(false),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }

    async fn submit_report(&self, command: Command) -> Result<String> {
        let name = command.name();
        match self.submit(command).await? {
            CommandReply::Report(text) => Ok(text),
            _ => Err(EngineError::UnexpectedReply { command: name }),
        }
    }
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("closed", &self.sender.is_closed())
            .field("bus", &self.bus)
            .finish()
    }
}

// =============================================================================
// Engine Builder
// =============================================================================

/// Builder for constructing an [`Engine`].
///
/// # Example
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .with_bus(shared_bus)  // Optional: use existing bus
///     .strict_sharing(true)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    bus: Option<EventBus>,
    state: Option<State>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing event bus instead of creating one from `bus_capacity`.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Start from an existing state, e.g. one returned by a previous shutdown.
    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    pub fn strict_sharing(mut self, strict: bool) -> Self {
        self.config.strict_sharing = strict;
        self
    }

    pub fn build(self) -> Engine {
        let bus = self
            .bus
            .unwrap_or_else(|| EventBus::with_capacity(self.config.bus_capacity));
        let state = self
            .state
            .unwrap_or_default()
            .with_strict_sharing(self.config.strict_sharing);
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));

        Engine {
            runtime: Runtime::new(state, receiver, bus.clone()),
            client: EngineClient { sender, bus },
        }
    }
}
