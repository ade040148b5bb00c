//! Structured error types for the agora engine.
//!
//! `EngineError` provides pattern-matchable errors instead of stringly-typed
//! failures. Domain kinds (`AlreadyExists`, `UnknownUser`, ...) are returned
//! by the state engine; runtime kinds (`Stopped`, `Timeout`) come from the
//! ingress path.
//!
//! # The Failure Rule
//!
//! > **A failed command leaves all state unchanged.**
//!
//! Errors are returned to the immediate caller and never retried by the
//! engine. Retry policy, if any, belongs to the caller.
//!
//! # Example
//!
//! ```ignore
//! use agora_core::{EngineError, ErrorCategory};
//!
//! match handle.register_user("alice").await {
//!     Ok(()) => println!("registered"),
//!     Err(e) => match e.category() {
//!         ErrorCategory::Conflict => eprintln!("409: {}", e),
//!         ErrorCategory::NotFound => eprintln!("404: {}", e),
//!         _ => eprintln!("500: {}", e.safe_message()),
//!     },
//! }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// The kind of entity an `AlreadyExists` failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Subreddit,
    Post,
    Comment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::User => write!(f, "user"),
            Entity::Subreddit => write!(f, "subreddit"),
            Entity::Post => write!(f, "post"),
            Entity::Comment => write!(f, "comment"),
        }
    }
}

/// Structured error type for engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An entity with this identifier is already registered.
    #[error("{entity} {id} already exists")]
    AlreadyExists {
        /// Which collection the identifier collided in.
        entity: Entity,
        /// The colliding identifier.
        id: String,
    },

    /// The named user was never registered.
    #[error("user {0} does not exist")]
    UnknownUser(String),

    /// The named subreddit was never created.
    #[error("subreddit {0} does not exist")]
    UnknownSubreddit(String),

    /// No post has this id.
    #[error("post {0} does not exist")]
    UnknownPost(String),

    /// The parent id resolves to neither the post nor any comment in its forest.
    #[error("parent comment {parent_id} does not exist on post {post_id}")]
    UnknownParentComment {
        /// The post whose forest was searched.
        post_id: String,
        /// The parent id that could not be found.
        parent_id: String,
    },

    /// Sender, recipient or shared post of a messaging operation is missing.
    #[error("cannot deliver message: {0} does not exist")]
    InvalidRecipient(String),

    /// The engine task is not running (never started, shut down, or aborted).
    #[error("engine is not running")]
    Stopped,

    /// The caller stopped waiting for a reply.
    ///
    /// The command may still be applied after this is returned.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// How long the caller waited.
        duration: Duration,
    },

    /// The engine answered a command with a reply of the wrong shape.
    #[error("unexpected reply to {command}")]
    UnexpectedReply {
        /// Name of the command that was submitted.
        command: &'static str,
    },
}

/// Flat, `Copy` discriminant of [`EngineError`] for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    UnknownUser,
    UnknownSubreddit,
    UnknownPost,
    UnknownParentComment,
    InvalidRecipient,
    Stopped,
    Timeout,
    UnexpectedReply,
}

/// Error category for mapping failures onto a transport.
///
/// # Exposure Rules
///
/// - `NotFound`, `Conflict`, `Validation`: safe to expose details
/// - `Unavailable`, `Internal`: expose only a generic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A referenced entity does not exist.
    NotFound,
    /// The identifier is already taken.
    Conflict,
    /// The request itself cannot be satisfied as stated.
    Validation,
    /// The engine is not accepting work, or the caller gave up waiting.
    Unavailable,
    /// A bug in the engine wiring.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Conflict => write!(f, "conflict"),
            ErrorCategory::Validation => write!(f, "validation_error"),
            ErrorCategory::Unavailable => write!(f, "unavailable"),
            ErrorCategory::Internal => write!(f, "internal_error"),
        }
    }
}

impl EngineError {
    /// Return the flat kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            EngineError::UnknownUser(_) => ErrorKind::UnknownUser,
            EngineError::UnknownSubreddit(_) => ErrorKind::UnknownSubreddit,
            EngineError::UnknownPost(_) => ErrorKind::UnknownPost,
            EngineError::UnknownParentComment { .. } => ErrorKind::UnknownParentComment,
            EngineError::InvalidRecipient(_) => ErrorKind::InvalidRecipient,
            EngineError::Stopped => ErrorKind::Stopped,
            EngineError::Timeout { .. } => ErrorKind::Timeout,
            EngineError::UnexpectedReply { .. } => ErrorKind::UnexpectedReply,
        }
    }

    /// Return the transport-facing category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::AlreadyExists { .. } => ErrorCategory::Conflict,
            EngineError::UnknownUser(_)
            | EngineError::UnknownSubreddit(_)
            | EngineError::UnknownPost(_) => ErrorCategory::NotFound,
            EngineError::UnknownParentComment { .. } | EngineError::InvalidRecipient(_) => {
                ErrorCategory::Validation
            }
            EngineError::Stopped | EngineError::Timeout { .. } => ErrorCategory::Unavailable,
            EngineError::UnexpectedReply { .. } => ErrorCategory::Internal,
        }
    }

    /// Return a message safe to show to an end user.
    pub fn safe_message(&self) -> Cow<'static, str> {
        match self.category() {
            ErrorCategory::NotFound | ErrorCategory::Conflict | ErrorCategory::Validation => {
                self.to_string().into()
            }
            ErrorCategory::Unavailable => "Service temporarily unavailable".into(),
            ErrorCategory::Internal => "An internal error occurred".into(),
        }
    }

    /// Returns true if this error came from a domain precondition, not the runtime.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Unavailable | ErrorCategory::Internal
        )
    }
}
