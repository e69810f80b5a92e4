//! Process-wide player identity registry.
//!
//! Maps each assigned player id to the fingerprint that claimed it. First-time
//! identities land at `BASE_PLAYER_ID + checksum16(fingerprint)`; an identity
//! whose candidate is owned by another fingerprint falls back to a random id
//! below the base.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::{checksum16, digest};

/// Offset added to the fingerprint checksum for first-time identities
pub const BASE_PLAYER_ID: i64 = 500_000_000;

/// Width of the fallback range below [`BASE_PLAYER_ID`]
pub const COLLISION_RANGE: i64 = 10_000;

/// Attributes that identify a player across logins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerIdentity<'a> {
    pub nick: &'a str,
    pub product_id: &'a str,
    pub game_name: &'a str,
    pub namespace_id: &'a str,
    pub sdk_revision: &'a str,
}

impl PlayerIdentity<'_> {
    /// MD5 of the colon-joined attributes
    pub fn fingerprint(&self) -> String {
        digest(
            &[
                self.nick,
                self.product_id,
                self.game_name,
                self.namespace_id,
                self.sdk_revision,
            ]
            .join(":"),
        )
    }
}

/// Reproducible id for a fingerprint that has not collided
pub fn candidate_id(fingerprint: &str) -> i64 {
    BASE_PLAYER_ID + i64::from(checksum16(fingerprint))
}

/// How an id was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// Candidate slot was free
    New,
    /// Candidate slot already belonged to this fingerprint
    Returning,
    /// Candidate slot belonged to another fingerprint
    Collision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub player_id: i64,
    pub kind: AssignmentKind,
}

/// Thread-safe id → fingerprint map shared by all connections.
///
/// Entries are never removed. A poisoned lock is reported as `Custom` by every
/// accessor; the map is never read past a panic.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Mutex<BTreeMap<i64, String>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an id to `identity`, returning only the id
    pub fn assign(&self, identity: &PlayerIdentity<'_>) -> Result<i64> {
        self.assign_detailed(identity).map(|a| a.player_id)
    }

    /// Assign an id to `identity`.
    ///
    /// The check and the insert happen under one lock acquisition.
    ///
    /// # Errors
    /// - `RegistryExhausted` if a collision occurs and the fallback range is full
    /// - `Custom` if the lock is poisoned
    pub fn assign_detailed(&self, identity: &PlayerIdentity<'_>) -> Result<Assignment> {
        let fingerprint = identity.fingerprint();
        let candidate = candidate_id(&fingerprint);

        let mut players = self.players()?;

        match players.get(&candidate) {
            None => {
                players.insert(candidate, fingerprint);
                debug!(player_id = candidate, nick = identity.nick, "New player registered");
                Ok(Assignment {
                    player_id: candidate,
                    kind: AssignmentKind::New,
                })
            }
            Some(owner) if *owner == fingerprint => Ok(Assignment {
                player_id: candidate,
                kind: AssignmentKind::Returning,
            }),
            Some(_) => {
                let fallback_floor = BASE_PLAYER_ID - (COLLISION_RANGE - 1);
                let taken = players.range(fallback_floor..=BASE_PLAYER_ID).count() as i64;
                if taken >= COLLISION_RANGE {
                    return Err(ProtocolError::RegistryExhausted);
                }

                let mut rng = rand::rng();
                let player_id = loop {
                    let id = BASE_PLAYER_ID - rng.random_range(0..COLLISION_RANGE);
                    if !players.contains_key(&id) {
                        break id;
                    }
                };
                players.insert(player_id, fingerprint);

                warn!(
                    candidate,
                    player_id,
                    nick = identity.nick,
                    "Player id collision, assigned fallback id"
                );
                Ok(Assignment {
                    player_id,
                    kind: AssignmentKind::Collision,
                })
            }
        }
    }

    /// Claim `player_id` for `fingerprint`, replacing any previous owner
    pub fn insert(&self, player_id: i64, fingerprint: impl Into<String>) -> Result<()> {
        self.players()?.insert(player_id, fingerprint.into());
        Ok(())
    }

    /// Fingerprint that owns `player_id`, if any
    pub fn fingerprint_of(&self, player_id: i64) -> Result<Option<String>> {
        Ok(self.players()?.get(&player_id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.players()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.players()?.is_empty())
    }

    fn players(&self) -> Result<MutexGuard<'_, BTreeMap<i64, String>>> {
        self.players
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_LOCK.into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn identity(nick: &str) -> PlayerIdentity<'_> {
        PlayerIdentity {
            nick,
            product_id: "10439",
            game_name: "battlefield2",
            namespace_id: "12",
            sdk_revision: "3",
        }
    }

    #[test]
    fn test_fingerprint_joins_attributes() {
        let id = identity("some-nick");
        assert_eq!(
            id.fingerprint(),
            digest("some-nick:10439:battlefield2:12:3")
        );
    }

    #[test]
    fn test_first_assignment_is_reproducible() {
        let registry = PlayerRegistry::new();
        let id = PlayerIdentity {
            nick: "some-nick",
            product_id: "some-productID",
            game_name: "some-gameName",
            namespace_id: "some-namespaceID",
            sdk_revision: "some-sdkRevision",
        };
        assert_eq!(registry.assign(&id).unwrap(), 500_057_082);
    }

    #[test]
    fn test_assign_is_idempotent() {
        let registry = PlayerRegistry::new();
        let first = registry.assign_detailed(&identity("some-nick")).unwrap();
        let second = registry.assign_detailed(&identity("some-nick")).unwrap();

        assert_eq!(first.kind, AssignmentKind::New);
        assert_eq!(second.kind, AssignmentKind::Returning);
        assert_eq!(first.player_id, second.player_id);
        assert_eq!(first.player_id, candidate_id(&identity("some-nick").fingerprint()));
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_collision_falls_below_base() {
        let registry = PlayerRegistry::new();
        let colliding = identity("collider");
        let candidate = candidate_id(&colliding.fingerprint());
        registry.insert(candidate, "someone-else").unwrap();

        let mut seen = HashSet::new();
        for _ in 0..5 {
            let assignment = registry.assign_detailed(&colliding).unwrap();
            assert_eq!(assignment.kind, AssignmentKind::Collision);
            assert_ne!(assignment.player_id, candidate);
            assert!(assignment.player_id <= BASE_PLAYER_ID);
            assert!(assignment.player_id > BASE_PLAYER_ID - COLLISION_RANGE);
            assert!(seen.insert(assignment.player_id));
        }

        // Previous owner is untouched
        assert_eq!(
            registry.fingerprint_of(candidate).unwrap().as_deref(),
            Some("someone-else")
        );
        assert_eq!(registry.len().unwrap(), 6);
    }

    #[test]
    fn test_exhausted_fallback_range() {
        let registry = PlayerRegistry::new();
        for offset in 0..COLLISION_RANGE {
            registry.insert(BASE_PLAYER_ID - offset, "filler").unwrap();
        }
        let colliding = identity("collider");
        registry
            .insert(candidate_id(&colliding.fingerprint()), "someone-else")
            .unwrap();

        assert!(matches!(
            registry.assign(&colliding),
            Err(ProtocolError::RegistryExhausted)
        ));
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let registry = Arc::new(PlayerRegistry::new());
        registry.assign(&identity("some-nick")).unwrap();

        let poisoner = Arc::clone(&registry);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.players.lock().unwrap();
            panic!("panic while holding the registry lock");
        })
        .join();
        assert!(joined.is_err());

        assert!(matches!(registry.len(), Err(ProtocolError::Custom(_))));
        assert!(matches!(registry.is_empty(), Err(ProtocolError::Custom(_))));
        assert!(matches!(
            registry.fingerprint_of(BASE_PLAYER_ID),
            Err(ProtocolError::Custom(_))
        ));
        assert!(matches!(
            registry.assign(&identity("some-nick")),
            Err(ProtocolError::Custom(_))
        ));
    }
}
