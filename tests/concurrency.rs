//! Concurrent access to the player registry

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use gamespy_login::protocol::registry::{
    candidate_id, PlayerIdentity, PlayerRegistry, BASE_PLAYER_ID,
};
use tokio::task::JoinSet;

fn identity(nick: &str) -> PlayerIdentity<'_> {
    PlayerIdentity {
        nick,
        product_id: "10439",
        game_name: "battlefield2",
        namespace_id: "12",
        sdk_revision: "3",
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_assign_same_identity() {
    let registry = Arc::new(PlayerRegistry::new());

    let mut tasks = JoinSet::new();
    for _ in 0..64 {
        let registry = registry.clone();
        tasks.spawn(async move { registry.assign(&identity("shared-nick")).unwrap() });
    }

    let mut ids = HashSet::new();
    while let Some(res) = tasks.join_next().await {
        ids.insert(res.unwrap());
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(registry.len().unwrap(), 1);
    assert!(ids.contains(&candidate_id(&identity("shared-nick").fingerprint())));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_assign_distinct_identities() {
    let registry = Arc::new(PlayerRegistry::new());
    let nicks: Vec<String> = (0..200).map(|i| format!("player-{i}")).collect();

    let mut tasks = JoinSet::new();
    for nick in nicks.clone() {
        let registry = registry.clone();
        tasks.spawn(async move {
            let id = registry.assign(&identity(&nick)).unwrap();
            (nick, id)
        });
    }

    let mut ids = HashSet::new();
    while let Some(res) = tasks.join_next().await {
        let (nick, id) = res.unwrap();
        assert!(ids.insert(id), "id {id} assigned twice");
        assert_eq!(
            registry.fingerprint_of(id).unwrap(),
            Some(identity(&nick).fingerprint())
        );
    }

    // Every identity, collided or not, owns exactly one slot
    assert_eq!(registry.len().unwrap(), nicks.len());
    assert!(ids.iter().all(|id| *id > BASE_PLAYER_ID - 10_000));
}

#[test]
fn concurrent_assign_from_threads() {
    let registry = Arc::new(PlayerRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                (0..100)
                    .map(|i| {
                        let nick = format!("nick-{}", i % 10 + t % 2);
                        registry.assign(&identity(&nick)).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // nick-0 through nick-10
    assert_eq!(registry.len().unwrap(), 11);
}
