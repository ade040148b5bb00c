//! Stress tests that hammer one engine from many tasks.
//!
//! These exercise racing registrations, concurrent karma updates, contended
//! comment trees and callers that give up early.

#[cfg(test)]
mod stress_tests {
    use crate::bus::EngineEvent;
    use crate::command::Command;
    use crate::engine::{EngineBuilder, EngineHandle};
    use crate::error::{EngineError, ErrorKind};
    use crate::forest::PreOrder;
    use anyhow::Result;
    use std::collections::HashSet;
    use std::time::Duration;

    // ==========================================================================
    // Helpers
    // ==========================================================================

    fn start() -> EngineHandle {
        EngineBuilder::new().build().start()
    }

    async fn seed(handle: &EngineHandle, users: usize) -> Result<()> {
        for i in 0..users {
            handle.register_user(format!("user{}", i)).await?;
        }
        handle.create_subreddit("r/stress", "user0").await?;
        handle
            .create_post("p0", "r/stress", "user0", "stress", "body")
            .await?;
        Ok(())
    }

    // ==========================================================================
    // Tests
    // ==========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_registrations_admit_exactly_one() -> Result<()> {
        let handle = start();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let client = handle.client();
                tokio::spawn(async move { client.register_user("contested").await })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await? {
                Ok(()) => ok += 1,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 63);

        let state = handle.shutdown().await?;
        assert_eq!(state.user_count(), 1);
        assert_eq!(state.actions().actions("contested").len(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_sum_exactly() -> Result<()> {
        let handle = start();
        seed(&handle, 20).await?;

        let tasks: Vec<_> = (0..20)
            .flat_map(|voter| (0..25).map(move |round| (voter, round)))
            .map(|(voter, round)| {
                let client = handle.client();
                tokio::spawn(async move {
                    client
                        .vote("p0", format!("user{}", voter), round % 5 != 0)
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await??;
        }

        // 500 votes, one in five down: 400 up, 100 down.
        let post = handle.get_post("p0").await?;
        assert_eq!(post.upvotes, 1 + 400);
        assert_eq!(post.downvotes, 100);

        let author = handle.get_user("user0").await?;
        assert_eq!(author.karma, 1 + 400 - 100);
        for i in 1..20 {
            assert_eq!(handle.get_user(format!("user{}", i)).await?.karma, 0);
        }
        handle.shutdown().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replies_build_one_consistent_tree() -> Result<()> {
        let handle = start();
        seed(&handle, 8).await?;
        handle
            .create_comment("p0", "p0", "root", "user0", "root")
            .await?;

        // Each task builds its own chain under the shared root.
        let tasks: Vec<_> = (0..8)
            .map(|t| {
                let client = handle.client();
                tokio::spawn(async move {
                    let mut parent = "root".to_string();
                    for depth in 0..10 {
                        let id = format!("t{}d{}", t, depth);
                        client
                            .create_comment("p0", parent.clone(), id.clone(), format!("user{}", t), "reply")
                            .await?;
                        parent = id;
                    }
                    Ok::<_, EngineError>(())
                })
            })
            .collect();
        for task in tasks {
            task.await??;
        }

        let post = handle.get_post("p0").await?;
        let ids: Vec<&str> = PreOrder::new(&post.comments)
            .map(|(_, c)| c.id.as_str())
            .collect();
        assert_eq!(ids.len(), 1 + 8 * 10);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());

        let max_depth = PreOrder::new(&post.comments)
            .map(|(depth, _)| depth)
            .max()
            .unwrap_or(0);
        assert_eq!(max_depth, 10);

        // user0 wrote the post, the root and chain t0.
        assert_eq!(handle.get_user("user0").await?.karma, 1 + 1 + 10);
        handle.shutdown().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_join_leave_churn_keeps_membership_symmetric() -> Result<()> {
        let handle = start();
        seed(&handle, 16).await?;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let client = handle.client();
                tokio::spawn(async move {
                    let user = format!("user{}", i);
                    for round in 0..20 {
                        if (round + i) % 3 == 0 {
                            client.leave_subreddit("r/stress", user.clone()).await?;
                        } else {
                            client.join_subreddit("r/stress", user.clone()).await?;
                        }
                    }
                    Ok::<_, EngineError>(())
                })
            })
            .collect();
        for task in tasks {
            task.await??;
        }

        let state = handle.shutdown().await?;
        for user in state.users() {
            for name in &user.subscribed_subreddits {
                assert!(state.subreddit(name).unwrap().is_member(&user.username));
            }
        }
        for subreddit in state.subreddits() {
            for member in &subreddit.members {
                assert!(state.user(member).unwrap().is_subscribed(&subreddit.name));
            }
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fire_and_forget_flood_is_fully_applied_before_shutdown() -> Result<()> {
        let handle = EngineBuilder::new()
            .with_config(crate::EngineConfig {
                channel_capacity: 8,
                ..Default::default()
            })
            .build()
            .start();

        let tasks: Vec<_> = (0..10)
            .map(|t| {
                let client = handle.client();
                tokio::spawn(async move {
                    for i in 0..50 {
                        client
                            .send(Command::RegisterUser {
                                username: format!("t{}u{}", t, i),
                            })
                            .await?;
                    }
                    Ok::<_, EngineError>(())
                })
            })
            .collect();
        for task in tasks {
            task.await??;
        }

        let state = handle.shutdown().await?;
        assert_eq!(state.user_count(), 500);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_callers_do_not_wedge_engine() -> Result<()> {
        let handle = start();
        seed(&handle, 2).await?;

        // Time out immediately; the commands still land.
        for _ in 0..100 {
            let _ = handle
                .submit_timeout(
                    Command::Vote {
                        post_id: "p0".into(),
                        user_id: "user1".into(),
                        is_upvote: true,
                    },
                    Duration::from_nanos(1),
                )
                .await;
        }

        // A submit after them sees every vote that was enqueued.
        let post = handle.get_post("p0").await?;
        assert!(post.upvotes >= 1);
        assert_eq!(handle.get_user("user0").await?.karma, post.upvotes as i64);
        handle.shutdown().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_event_stream_matches_successful_mutations() -> Result<()> {
        let handle = start();
        let mut events = handle.subscribe();
        seed(&handle, 10).await?;

        let tasks: Vec<_> = (1..10)
            .map(|i| {
                let client = handle.client();
                tokio::spawn(async move {
                    client.join_subreddit("r/stress", format!("user{}", i)).await
                })
            })
            .collect();
        for task in tasks {
            task.await??;
        }
        handle.shutdown().await?;

        let mut joined = 0;
        let mut total = 0;
        while let Ok(envelope) = events.try_recv() {
            total += 1;
            if matches!(envelope.event, EngineEvent::SubredditJoined { .. }) {
                joined += 1;
            }
        }
        assert_eq!(joined, 9);
        // 10 registrations, 1 subreddit, 1 post, 9 joins.
        assert_eq!(total, 21);
        Ok(())
    }
}
