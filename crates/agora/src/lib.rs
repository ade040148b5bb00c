//! # Agora
//!
//! A single-writer state engine for a small social-discussion platform:
//! users, subreddits, posts, threaded comments, votes and direct messages.
//!
//! ## Core Concepts
//!
//! Agora separates **intent** from **facts**:
//! - [`Command`] = Intent (one request to mutate or query the social graph)
//! - [`EngineEvent`] = Facts (what a successful command changed)
//!
//! The key principle: **One Command = One Atomic Step**.
//! A command's precondition checks and all of its writes happen without any
//! other command observing the state in between. A failed command changes
//! nothing.
//!
//! ## Architecture
//!
//! ```text
//! Gateway / Workload generator
//!     │
//!     ▼ submit() / send()
//! EngineHandle (Clone, many callers)
//!     │
//!     ▼ ordered mpsc channel
//! Runtime loop (one tokio task)
//!     │
//!     ├─► State::apply(command) ─► Result<CommandReply, EngineError>
//!     │         │
//!     │         └─► ActionLog::record(...)
//!     │
//!     ├─► EventBus.emit(EngineEvent) ──► subscribers
//!     │
//!     └─► oneshot reply ──► caller
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Arrival order** - commands are applied in the order they reach the channel
//! 2. **No partial writes** - every handler validates before it mutates
//! 3. **Symmetric membership** - `u ∈ members(s)` iff `s ∈ subscriptions(u)`
//! 4. **Karma is derived** - only post creation, comments and votes change it
//! 5. **Shared messages** - a direct message is one `Arc` in two mailboxes
//!
//! ## Example
//!
//! ```ignore
//! use agora_core::EngineBuilder;
//!
//! let handle = EngineBuilder::new().build().start();
//!
//! handle.register_user("alice").await?;
//! handle.create_subreddit("r/cats", "alice").await?;
//! handle.create_post("p1", "r/cats", "alice", "hello", "first!").await?;
//!
//! let feed = handle.get_feed("alice").await?;
//! assert_eq!(feed.len(), 1);
//!
//! let state = handle.shutdown().await?;
//! assert_eq!(state.user("alice").map(|u| u.karma), Some(1));
//! ```
//!
//! ## What This Is Not
//!
//! Agora is **not**:
//! - Persistent (state lives for the life of the engine task)
//! - Distributed
//! - An authorization layer
//! - An HTTP server

// Core modules
mod actions;
mod bus;
mod command;
mod config;
mod correlation;
mod engine;
mod error;
mod forest;
mod model;
mod report;
mod runtime;
mod state;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export domain model
pub use model::{Comment, DirectMessage, Post, SharedPost, Subreddit, User};

// Re-export comment forest helpers
pub use forest::{find_comment, PreOrder};

// Re-export command types
pub use command::{Command, CommandReply};

// Re-export error types
pub use error::{EngineError, Entity, ErrorCategory, ErrorKind, Result};

// Re-export action log types
pub use actions::{ActionLog, UserAction, UserActions};

// Re-export report types
pub use report::{PostStats, SimulationStats, SubredditReport, UserActionsReport};

// Re-export state types
pub use state::{Applied, State};

// Re-export bus types
pub use bus::{EngineEvent, EventBus, EventEnvelope};

// Re-export correlation
pub use correlation::CorrelationId;

// Re-export config
pub use config::EngineConfig;

// Re-export engine types (primary entry point)
pub use engine::{Engine, EngineBuilder, EngineClient, EngineHandle};
