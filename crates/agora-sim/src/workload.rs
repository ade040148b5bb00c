//! Synthetic workload: register users, create subreddits, then issue a
//! random action mix from several concurrent tasks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use agora_core::{EngineClient, EngineError, ErrorKind, Result as EngineResult, SimulationStats};
use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, info};

use crate::config::Args;
use crate::zipf::Zipf;

/// What one workload run did.
#[derive(Debug)]
pub struct Summary {
    pub applied: usize,
    pub unchanged: usize,
    pub rejected: HashMap<ErrorKind, usize>,
    pub elapsed: Duration,
    pub stats: SimulationStats,
}

#[derive(Debug, Default)]
struct Tally {
    applied: usize,
    unchanged: usize,
    rejected: HashMap<ErrorKind, usize>,
}

impl Tally {
    fn record(&mut self, result: EngineResult<bool>) -> Result<()> {
        match result {
            Ok(true) => self.applied += 1,
            Ok(false) => self.unchanged += 1,
            Err(EngineError::Stopped) => return Err(EngineError::Stopped.into()),
            Err(error) => {
                debug!(error = %error, "action rejected");
                *self.rejected.entry(error.kind()).or_default() += 1;
            }
        }
        Ok(())
    }

    fn merge(&mut self, other: Tally) {
        self.applied += other.applied;
        self.unchanged += other.unchanged;
        for (kind, count) in other.rejected {
            *self.rejected.entry(kind).or_default() += count;
        }
    }
}

/// Identifiers the generator has handed out, shared by all tasks.
#[derive(Debug, Default)]
struct Catalog {
    posts: Vec<String>,
    /// Comment ids per post, only those the engine accepted.
    comments: HashMap<String, Vec<String>>,
    /// Next comment number per post.
    next_comment: HashMap<String, usize>,
    connected: HashSet<String>,
}

pub struct Simulator {
    client: EngineClient,
    users: Vec<String>,
    subreddits: Vec<String>,
    actions: usize,
    concurrency: usize,
    seed: Option<u64>,
    zipf: Zipf,
    next_post: AtomicUsize,
    catalog: Mutex<Catalog>,
}

impl Simulator {
    pub fn new(client: EngineClient, args: &Args) -> Result<Self> {
        anyhow::ensure!(args.users >= 2, "need at least two users to exchange messages");
        anyhow::ensure!(args.concurrency > 0, "concurrency must be at least 1");

        Ok(Self {
            client,
            users: (1..=args.users).map(|i| format!("User {}", i)).collect(),
            subreddits: (1..=args.subreddits).map(|i| format!("r/Sub {}", i)).collect(),
            actions: args.actions,
            concurrency: args.concurrency,
            seed: args.seed,
            zipf: Zipf::new(args.subreddits.max(1), args.zipf_exponent)
                .context("invalid zipf parameters")?,
            next_post: AtomicUsize::new(1),
            catalog: Mutex::new(Catalog::default()),
        })
    }

    pub async fn run(&self) -> Result<Summary> {
        let started = Instant::now();
        let mut master = match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        self.setup(&mut master).await?;
        info!(
            users = self.users.len(),
            subreddits = self.subreddits.len(),
            "setup complete"
        );

        let per_task = self.actions / self.concurrency;
        let extra = self.actions % self.concurrency;
        let workers = (0..self.concurrency).map(|task| {
            let rng = fastrand::Rng::with_seed(master.u64(..));
            let count = per_task + usize::from(task < extra);
            self.worker(task, rng, count)
        });

        let mut tally = Tally::default();
        for result in join_all(workers).await {
            tally.merge(result?);
        }

        let stats = self
            .client
            .simulation_stats()
            .await
            .context("failed to collect statistics")?;
        let elapsed = started.elapsed();
        info!(
            applied = tally.applied,
            unchanged = tally.unchanged,
            rejected = tally.rejected.values().sum::<usize>(),
            elapsed_ms = elapsed.as_millis() as u64,
            "workload finished"
        );

        Ok(Summary {
            applied: tally.applied,
            unchanged: tally.unchanged,
            rejected: tally.rejected,
            elapsed,
            stats,
        })
    }

    async fn setup(&self, rng: &mut fastrand::Rng) -> Result<()> {
        for user in &self.users {
            self.client
                .register_user(user.as_str())
                .await
                .with_context(|| format!("failed to register {}", user))?;
        }
        for name in &self.subreddits {
            let creator = self.pick_user(rng);
            self.client
                .create_subreddit(name.as_str(), creator)
                .await
                .with_context(|| format!("failed to create {}", name))?;
        }
        Ok(())
    }

    async fn worker(&self, task: usize, mut rng: fastrand::Rng, count: usize) -> Result<Tally> {
        let mut tally = Tally::default();
        for _ in 0..count {
            match rng.usize(0..11) {
                0 => self.join(&mut rng, &mut tally).await?,
                1 => tally.record(self.leave(&mut rng).await)?,
                2 => tally.record(self.post(&mut rng).await)?,
                3 => tally.record(self.comment(&mut rng).await)?,
                4 => tally.record(self.vote(&mut rng).await)?,
                5 => self.exchange_messages(&mut rng, &mut tally).await?,
                6 => tally.record(self.feed(&mut rng).await)?,
                7 => self.toggle_connection(&mut rng),
                8 => tally.record(self.bookmark(&mut rng).await)?,
                9 => tally.record(self.unbookmark(&mut rng).await)?,
                _ => tally.record(self.share(&mut rng).await)?,
            }
        }
        debug!(task, count, "worker finished");
        Ok(tally)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Every subreddit gets a Zipf-sized batch of join attempts from
    /// connected users.
    async fn join(&self, rng: &mut fastrand::Rng, tally: &mut Tally) -> Result<()> {
        for subreddit in &self.subreddits {
            for _ in 0..self.zipf.sample(rng) {
                let user = self.pick_user(rng);
                if !self.is_connected(user) {
                    continue;
                }
                tally.record(self.client.join_subreddit(subreddit.as_str(), user).await)?;
            }
        }
        Ok(())
    }

    async fn leave(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let Some(subreddit) = self.pick_subreddit(rng) else {
            return Ok(false);
        };
        self.client
            .leave_subreddit(subreddit, self.pick_user(rng))
            .await
    }

    async fn post(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let Some(subreddit) = self.pick_subreddit(rng) else {
            return Ok(false);
        };
        let post_id = format!("Post {}", self.next_post.fetch_add(1, Ordering::Relaxed));
        self.client
            .create_post(
                post_id.as_str(),
                subreddit,
                self.pick_user(rng),
                post_id.as_str(),
                format!("Hello there! This is content of {}", post_id),
            )
            .await?;
        self.catalog().posts.push(post_id);
        Ok(true)
    }

    /// Half of the comments reply to an existing comment on the same post.
    async fn comment(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let (post_id, parent_id, comment_id) = {
            let mut catalog = self.catalog();
            if catalog.posts.is_empty() {
                return Ok(false);
            }
            let post_id = catalog.posts[rng.usize(..catalog.posts.len())].clone();
            let parent_id = match catalog.comments.get(&post_id) {
                Some(ids) if !ids.is_empty() && rng.bool() => ids[rng.usize(..ids.len())].clone(),
                _ => post_id.clone(),
            };
            let next = catalog.next_comment.entry(post_id.clone()).or_insert(1);
            let comment_id = format!("Comment {}", next);
            *next += 1;
            (post_id, parent_id, comment_id)
        };

        self.client
            .create_comment(
                post_id.as_str(),
                parent_id,
                comment_id.as_str(),
                self.pick_user(rng),
                format!("This is a simulated {}.", comment_id),
            )
            .await?;
        self.catalog()
            .comments
            .entry(post_id)
            .or_default()
            .push(comment_id);
        Ok(true)
    }

    async fn vote(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let Some(post_id) = self.pick_post(rng) else {
            return Ok(false);
        };
        self.client
            .vote(post_id, self.pick_user(rng), rng.bool())
            .await
            .map(|()| true)
    }

    /// A message and its reply between two distinct users.
    async fn exchange_messages(&self, rng: &mut fastrand::Rng, tally: &mut Tally) -> Result<()> {
        let (from, to) = self.pick_pair(rng);
        let sent = self
            .client
            .send_direct_message(
                from,
                to,
                format!("This is a direct message from {} to {}", from, to),
            )
            .await
            .map(|_| true);
        tally.record(sent)?;

        let reply = self
            .client
            .send_direct_message(
                to,
                from,
                format!("This is a reply message from {} to {}", to, from),
            )
            .await
            .map(|_| true);
        tally.record(reply)
    }

    async fn feed(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        self.client.get_feed(self.pick_user(rng)).await.map(|_| true)
    }

    fn toggle_connection(&self, rng: &mut fastrand::Rng) {
        let user = self.pick_user(rng).to_string();
        let mut catalog = self.catalog();
        if rng.bool() {
            debug!(user = %user, "connected");
            catalog.connected.insert(user);
        } else {
            debug!(user = %user, "disconnected");
            catalog.connected.remove(&user);
        }
    }

    async fn bookmark(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let Some(post_id) = self.pick_post(rng) else {
            return Ok(false);
        };
        self.client.bookmark_post(post_id, self.pick_user(rng)).await
    }

    async fn unbookmark(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let Some(post_id) = self.pick_post(rng) else {
            return Ok(false);
        };
        self.client.unbookmark_post(post_id, self.pick_user(rng)).await
    }

    async fn share(&self, rng: &mut fastrand::Rng) -> EngineResult<bool> {
        let Some(post_id) = self.pick_post(rng) else {
            return Ok(false);
        };
        let (from, to) = self.pick_pair(rng);
        self.client
            .share_post(from, to, post_id)
            .await
            .map(|message| message.is_some())
    }

    // =========================================================================
    // Random picks
    // =========================================================================

    fn catalog(&self) -> std::sync::MutexGuard<'_, Catalog> {
        // The catalog holds no invariants a panicking task could break.
        self.catalog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_connected(&self, user: &str) -> bool {
        self.catalog().connected.contains(user)
    }

    fn pick_user(&self, rng: &mut fastrand::Rng) -> &str {
        &self.users[rng.usize(..self.users.len())]
    }

    fn pick_pair(&self, rng: &mut fastrand::Rng) -> (&str, &str) {
        let from = rng.usize(..self.users.len());
        let offset = rng.usize(1..self.users.len());
        let to = (from + offset) % self.users.len();
        (&self.users[from], &self.users[to])
    }

    /// Zipf-weighted: low-numbered subreddits are picked most often.
    fn pick_subreddit(&self, rng: &mut fastrand::Rng) -> Option<&str> {
        if self.subreddits.is_empty() {
            return None;
        }
        let rank = self.zipf.sample(rng);
        self.subreddits.get(rank - 1).map(String::as_str)
    }

    fn pick_post(&self, rng: &mut fastrand::Rng) -> Option<String> {
        let catalog = self.catalog();
        if catalog.posts.is_empty() {
            return None;
        }
        Some(catalog.posts[rng.usize(..catalog.posts.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::EngineBuilder;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["agora-sim"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_produces_consistent_stats() {
        let args = args(&["--users", "10", "--subreddits", "3", "--actions", "150", "--seed", "9"]);
        let handle = EngineBuilder::new().build().start();
        let simulator = Simulator::new(handle.client(), &args).unwrap();

        let summary = simulator.run().await.unwrap();
        assert_eq!(summary.stats.total_users, 10);
        assert_eq!(summary.stats.total_subreddits, 3);

        let state = handle.shutdown().await.unwrap();
        for user in state.users() {
            for name in &user.subscribed_subreddits {
                assert!(state.subreddit(name).unwrap().is_member(&user.username));
            }
        }
        // Every post's author karma is accounted for by posts, comments and votes.
        let posts: i64 = state.posts().map(|p| p.score()).sum();
        let comments: usize = state
            .posts()
            .map(|p| agora_core::PreOrder::new(&p.comments).count())
            .sum();
        let karma: i64 = state.users().map(|u| u.karma).sum();
        assert_eq!(karma, posts + comments as i64);
    }

    #[tokio::test]
    async fn test_rejects_single_user() {
        let handle = EngineBuilder::new().build().start();
        assert!(Simulator::new(handle.client(), &args(&["--users", "1"])).is_err());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_pair_is_distinct() {
        let handle = EngineBuilder::new().build().start();
        let simulator = Simulator::new(handle.client(), &args(&["--users", "2"])).unwrap();
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..100 {
            let (from, to) = simulator.pick_pair(&mut rng);
            assert_ne!(from, to);
        }
        handle.shutdown().await.unwrap();
    }
}
