//! End-to-end scenarios driven through a running engine.

use std::sync::Arc;
use std::time::Duration;

use agora_core::{
    find_comment, Command, CommandReply, EngineBuilder, EngineError, EngineEvent, EngineHandle,
    ErrorCategory, ErrorKind,
};
use anyhow::Result;

fn start() -> EngineHandle {
    EngineBuilder::new().build().start()
}

#[tokio::test]
async fn alice_bob_cats_scenario() -> Result<()> {
    let handle = start();

    handle.register_user("alice").await?;
    handle.register_user("bob").await?;
    handle.create_subreddit("r/cats", "alice").await?;
    handle.join_subreddit("r/cats", "bob").await?;
    handle
        .create_post("p1", "r/cats", "alice", "Cute cat", "look at this cat")
        .await?;

    handle.vote("p1", "bob", true).await?;
    let p1 = handle.get_post("p1").await?;
    assert_eq!(p1.upvotes, 2);
    assert_eq!(handle.get_user("alice").await?.karma, 2);

    handle
        .create_comment("p1", "p1", "c1", "bob", "so cute")
        .await?;
    let p1 = handle.get_post("p1").await?;
    let ids: Vec<&str> = p1.comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1"]);
    assert_eq!(handle.get_user("bob").await?.karma, 1);

    let feed = handle.get_feed("bob").await?;
    let feed_ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(feed_ids, vec!["p1"]);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn ghost_creator_scenario() -> Result<()> {
    let handle = start();

    let err = handle.create_subreddit("r/x", "ghost").await.unwrap_err();
    assert_eq!(err, EngineError::UnknownUser("ghost".into()));
    assert_eq!(err.category(), ErrorCategory::NotFound);

    handle.register_user("alice").await?;
    handle.create_subreddit("r/x", "alice").await?;

    let err = handle.create_subreddit("r/x", "ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(err.category(), ErrorCategory::Conflict);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn comment_tree_round_trip() -> Result<()> {
    let handle = start();
    handle.register_user("alice").await?;
    handle.create_subreddit("r/t", "alice").await?;
    handle.create_post("p", "r/t", "alice", "t", "c").await?;

    handle.create_comment("p", "p", "c1", "alice", "top").await?;
    handle.create_comment("p", "c1", "c2", "alice", "reply").await?;
    let before = handle.get_post("p").await?;
    assert_eq!(before.comments.len(), 1);
    let c1 = find_comment(&before.comments, "c1").unwrap();
    assert_eq!(c1.children[0].id, "c2");

    let err = handle
        .create_comment("p", "missing", "c3", "alice", "lost")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownParentComment);
    assert_eq!(handle.get_post("p").await?, before);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn direct_messages_share_one_value() -> Result<()> {
    let handle = start();
    handle.register_user("alice").await?;
    handle.register_user("bob").await?;
    handle.create_subreddit("r/cats", "alice").await?;
    handle.create_post("p1", "r/cats", "alice", "Cute cat", "meow").await?;

    let sent = handle.send_direct_message("alice", "bob", "hello").await?;
    let shared = handle.share_post("bob", "alice", "p1").await?.unwrap();
    assert_eq!(shared.shared_post.as_ref().unwrap().post_id, "p1");

    let state = handle.shutdown().await?;
    let alice = state.user("alice").unwrap();
    let bob = state.user("bob").unwrap();
    assert!(Arc::ptr_eq(&alice.sent_messages[0], &bob.received_messages[0]));
    assert!(Arc::ptr_eq(&sent, &alice.sent_messages[0]));
    assert!(Arc::ptr_eq(&bob.sent_messages[0], &alice.received_messages[0]));
    Ok(())
}

#[tokio::test]
async fn events_follow_successful_commands() -> Result<()> {
    let handle = start();
    let mut events = handle.subscribe();

    handle.register_user("alice").await?;
    let _ = handle.register_user("alice").await;
    handle.create_subreddit("r/cats", "alice").await?;
    handle.create_post("p1", "r/cats", "alice", "t", "c").await?;
    handle.vote("p1", "alice", false).await?;

    let received: Vec<EngineEvent> = (0..4)
        .map(|_| events.try_recv().map(|envelope| envelope.event))
        .collect::<std::result::Result<_, _>>()?;
    assert!(matches!(received[0], EngineEvent::UserRegistered { .. }));
    assert!(matches!(received[1], EngineEvent::SubredditCreated { .. }));
    assert!(matches!(received[2], EngineEvent::PostCreated { .. }));
    assert_eq!(
        received[3],
        EngineEvent::Voted {
            post_id: "p1".into(),
            voter: "alice".into(),
            is_upvote: false,
            author_karma: 0,
        }
    );
    assert!(events.try_recv().is_err());

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn shutdown_drains_queue_then_rejects() -> Result<()> {
    let handle = start();
    let client = handle.client();

    for i in 0..10 {
        client
            .send(Command::RegisterUser {
                username: format!("u{}", i),
            })
            .await?;
    }
    let state = handle.shutdown().await?;
    assert_eq!(state.user_count(), 10);

    let err = client
        .submit_timeout(Command::GetSimulationStats, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Stopped);
    assert_eq!(err.category(), ErrorCategory::Unavailable);
    Ok(())
}

#[tokio::test]
async fn reports_render_current_state() -> Result<()> {
    let handle = start();
    handle.register_user("alice").await?;
    handle.create_subreddit("r/cats", "alice").await?;
    handle.create_post("p1", "r/cats", "alice", "Cute cat", "meow").await?;
    handle.create_comment("p1", "p1", "c1", "alice", "first").await?;

    let text = handle.print_subreddits().await?;
    assert!(text.contains("Subreddit: r/cats"));
    assert!(text.contains("  - alice: first"));
    assert!(text.contains(" Total 1 Posts."));

    match handle.submit(Command::GetSimulationStats).await? {
        CommandReply::Stats(stats) => {
            assert_eq!(stats.karma, vec![("alice".to_string(), 2)]);
        }
        other => panic!("Expected Stats, got {:?}", other),
    }

    let history = handle.get_user_actions("alice").await?;
    assert_eq!(history.len(), 4);
    assert!(handle.get_user_actions("nobody").await?.is_empty());

    handle.shutdown().await?;
    Ok(())
}
