//! Per-user append-only history of human-readable action records.
//!
//! Written only by the state engine, as a side effect of successful commands.
//! A user's bucket is created on first write, so a user with no recorded
//! actions simply has an empty history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAction {
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// All actions recorded for one user, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActions {
    pub username: String,
    pub actions: Vec<UserAction>,
}

/// The action log, keyed by username.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    by_user: HashMap<String, UserActions>,
    total: usize,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action for `username`, stamped with the current time.
    pub fn record(&mut self, username: &str, action: impl Into<String>) {
        self.record_at(username, action, Utc::now());
    }

    /// Append an action with an explicit timestamp.
    pub fn record_at(&mut self, username: &str, action: impl Into<String>, timestamp: DateTime<Utc>) {
        self.by_user
            .entry(username.to_string())
            .or_insert_with(|| UserActions {
                username: username.to_string(),
                actions: Vec::new(),
            })
            .actions
            .push(UserAction {
                action: action.into(),
                timestamp,
            });
        self.total += 1;
    }

    /// Actions recorded for `username`, oldest first. Empty if none.
    pub fn actions(&self, username: &str) -> &[UserAction] {
        self.by_user
            .get(username)
            .map(|entry| entry.actions.as_slice())
            .unwrap_or(&[])
    }

    /// Per-user histories sorted by username.
    pub fn sorted(&self) -> Vec<&UserActions> {
        let mut entries: Vec<&UserActions> = self.by_user.values().collect();
        entries.sort_by(|a, b| a.username.cmp(&b.username));
        entries
    }

    /// Number of users with at least one recorded action.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Total number of recorded actions across all users.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creates_bucket_lazily() {
        let mut log = ActionLog::new();
        assert!(log.actions("alice").is_empty());
        assert_eq!(log.user_count(), 0);

        log.record("alice", "first");
        log.record("alice", "second");

        let actions: Vec<&str> = log.actions("alice").iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["first", "second"]);
        assert_eq!(log.user_count(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_record_at_keeps_timestamp() {
        let mut log = ActionLog::new();
        let at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        log.record_at("bob", "voted", at);
        assert_eq!(log.actions("bob")[0].timestamp, at);
    }

    #[test]
    fn test_sorted_orders_by_username() {
        let mut log = ActionLog::new();
        log.record("carol", "x");
        log.record("alice", "y");
        log.record("bob", "z");

        let names: Vec<&str> = log.sorted().iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }
}
