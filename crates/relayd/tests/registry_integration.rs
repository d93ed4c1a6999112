//! Integration tests for the identity registry.
//!
//! These tests drive the registry through its public handle, the way
//! connection tasks do, with an emphasis on claim-or-reject under
//! concurrency. The last section repeats the race over real TCP clients.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::HashSet;
use std::time::Duration;

use relay_core::{ConnectionId, Nickname};
use relayd::config::RelayConfig;
use relayd::registry::spawn_registry;
use relayd::server::RelayServer;
use relayd::session::{outbound_channel, OutboundQueue, Session};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

/// Creates a session with a live outbound queue.
fn create_test_session(id: u64, nickname: &str) -> (Session, OutboundQueue) {
    let (outbound, queue) = outbound_channel();
    let session = Session::new(ConnectionId::new(id), Nickname::new(nickname), outbound);
    (session, queue)
}

fn sorted(mut nicknames: Vec<Nickname>) -> Vec<String> {
    nicknames.sort();
    nicknames.into_iter().map(Nickname::into_inner).collect()
}

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    let registry = spawn_registry();
    let (session, _queue) = create_test_session(1, "alice");

    assert!(registry.try_register(session).await.unwrap());
    assert_eq!(registry.len().await, 1);

    let found = registry.lookup(&Nickname::new("alice")).await.unwrap();
    assert_eq!(found.id, ConnectionId::new(1));

    assert!(registry.unregister(&Nickname::new("alice")).await);
    assert!(registry.is_empty().await);
    assert!(registry.lookup(&Nickname::new("alice")).await.is_none());
}

#[tokio::test]
async fn test_duplicate_claim_rejected() {
    let registry = spawn_registry();
    let (first, _q1) = create_test_session(1, "alice");
    let (second, _q2) = create_test_session(2, "alice");

    assert!(registry.try_register(first).await.unwrap());
    assert!(!registry.try_register(second).await.unwrap());

    // The original holder is untouched
    let holder = registry.lookup(&Nickname::new("alice")).await.unwrap();
    assert_eq!(holder.id, ConnectionId::new(1));
}

#[tokio::test]
async fn test_nicknames_are_case_sensitive() {
    let registry = spawn_registry();
    let (lower, _q1) = create_test_session(1, "alice");
    let (upper, _q2) = create_test_session(2, "Alice");

    assert!(registry.try_register(lower).await.unwrap());
    assert!(registry.try_register(upper).await.unwrap());
    assert_eq!(sorted(registry.snapshot().await), vec!["Alice", "alice"]);
}

#[tokio::test]
async fn test_unregister_is_idempotent() {
    let registry = spawn_registry();
    let (session, _queue) = create_test_session(1, "alice");
    registry.try_register(session).await.unwrap();

    assert!(registry.unregister(&Nickname::new("alice")).await);
    assert!(!registry.unregister(&Nickname::new("alice")).await);
    assert!(!registry.unregister(&Nickname::new("nobody")).await);
}

#[tokio::test]
async fn test_lookup_result_delivers_to_holder() {
    let registry = spawn_registry();
    let (session, mut queue) = create_test_session(1, "alice");
    registry.try_register(session).await.unwrap();

    let found = registry.lookup(&Nickname::new("alice")).await.unwrap();
    assert!(found.deliver("hello"));
    assert_eq!(queue.recv().await.as_deref(), Some("hello"));
}

// ============================================================================
// Roster Tests
// ============================================================================

#[tokio::test]
async fn test_snapshot_lists_every_member() {
    let registry = spawn_registry();
    let mut queues = Vec::new();

    for (i, name) in ["dave", "alice", "carol", "bob"].iter().enumerate() {
        let (session, queue) = create_test_session(i as u64, name);
        assert!(registry.try_register(session).await.unwrap());
        queues.push(queue);
    }

    assert_eq!(
        sorted(registry.snapshot().await),
        vec!["alice", "bob", "carol", "dave"]
    );
    assert_eq!(registry.sessions().await.len(), 4);
}

#[tokio::test]
async fn test_snapshot_is_a_copy() {
    let registry = spawn_registry();
    let (session, _queue) = create_test_session(1, "alice");
    registry.try_register(session).await.unwrap();

    let before = registry.snapshot().await;
    registry.unregister(&Nickname::new("alice")).await;

    assert_eq!(before, vec![Nickname::new("alice")]);
    assert!(registry.snapshot().await.is_empty());
}

// ============================================================================
// Concurrent Access Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_nickname_has_one_winner() {
    let registry = spawn_registry();
    let mut handles = Vec::new();

    for i in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let (session, queue) = create_test_session(i, "contested");
            let won = registry.try_register(session).await.unwrap();
            (i, won, queue)
        }));
    }

    let mut winners = Vec::new();
    let mut queues = Vec::new();
    for handle in handles {
        let (id, won, queue) = handle.await.unwrap();
        if won {
            winners.push(id);
        }
        queues.push(queue);
    }

    assert_eq!(winners.len(), 1, "exactly one claim must win");
    let holder = registry.lookup(&Nickname::new("contested")).await.unwrap();
    assert_eq!(holder.id, ConnectionId::new(winners[0]));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_nicknames_all_win() {
    let registry = spawn_registry();
    let mut handles = Vec::new();

    for i in 0..50 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let (session, queue) = create_test_session(i, &format!("user-{i}"));
            let won = registry.try_register(session).await.unwrap();
            (won, queue)
        }));
    }

    let mut queues = Vec::new();
    for handle in handles {
        let (won, queue) = handle.await.unwrap();
        assert!(won);
        queues.push(queue);
    }

    assert_eq!(registry.len().await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_operations() {
    let registry = spawn_registry();
    let mut handles = Vec::new();

    for i in 0..20u64 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let nickname = format!("user-{i}");
            let (session, _queue) = create_test_session(i, &nickname);
            assert!(registry.try_register(session).await.unwrap());
            let _ = registry.snapshot().await;
            if i % 2 == 0 {
                assert!(registry.unregister(&Nickname::new(nickname)).await);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let remaining: HashSet<String> = registry
        .snapshot()
        .await
        .into_iter()
        .map(Nickname::into_inner)
        .collect();
    let expected: HashSet<String> = (0..20).filter(|i| i % 2 == 1).map(|i| format!("user-{i}")).collect();
    assert_eq!(remaining, expected);
}

// ============================================================================
// Racing Over TCP
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tcp_clients_racing_for_one_nickname() {
    let mut config = RelayConfig::default();
    config.apply_listen_override("test", "127.0.0.1:0").unwrap();

    let registry = spawn_registry();
    let cancel_token = CancellationToken::new();
    let server = RelayServer::bind(config, registry.clone(), cancel_token.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut handles = Vec::new();
    for _ in 0..8 {
        handles.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, mut writer) = stream.into_split();
            writer.write_all(b"racer\n").await.unwrap();

            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            timeout(Duration::from_secs(2), reader.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            (line.trim_end().to_string(), reader, writer)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let welcomed = results.iter().filter(|(line, _, _)| line == "Welcome racer").count();
    let rejected = results
        .iter()
        .filter(|(line, _, _)| line == "Nickname already in use. Try another one.")
        .count();

    assert_eq!(welcomed, 1);
    assert_eq!(rejected, 7);
    assert_eq!(registry.snapshot().await, vec![Nickname::new("racer")]);

    cancel_token.cancel();
}
