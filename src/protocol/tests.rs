// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::packet::Packet;
use crate::protocol::handshake::*;
use crate::protocol::login::{LoginReply, LoginRequest};
use crate::protocol::registry::{candidate_id, PlayerRegistry, BASE_PLAYER_ID, COLLISION_RANGE};
use crate::utils::crypto::{checksum16, derive_proof};

const SERVER_CHALLENGE: &str = "4Jp6A4kK02";
const CLIENT_CHALLENGE: &str = "YJk5UFExKBwn0PEpOpinWHsRCDcfejyJ";
const RESPONSE: &str = "131def0e93e67e3e62b39d74d6316511";

fn request() -> LoginRequest {
    LoginRequest {
        login: Some(String::new()),
        challenge: CLIENT_CHALLENGE.into(),
        unique_nick: "some-nick".into(),
        response: RESPONSE.into(),
        port: "2475".into(),
        product_id: "10439".into(),
        game_name: "battlefield2".into(),
        namespace_id: "12".into(),
        sdk_revision: "3".into(),
        id: "1".into(),
    }
}

fn ready_handshake() -> ServerHandshake {
    let mut handshake = ServerHandshake::with_challenge(SERVER_CHALLENGE);
    handshake.advance(HandshakeState::ChallengeSent).unwrap();
    handshake.advance(HandshakeState::AwaitingLoginRead).unwrap();
    handshake
}

#[test]
fn test_login_success_reply() {
    let registry = PlayerRegistry::new();
    let mut handshake = ready_handshake();

    let outcome = handshake
        .process_login(&request().to_packet().to_bytes(), &registry)
        .expect("Login should be processed");
    assert_eq!(handshake.state(), HandshakeState::ResponseBuilt);

    let player_id = match &outcome {
        LoginOutcome::Accepted {
            player_id,
            collided,
            ..
        } => {
            assert!(!collided);
            *player_id
        }
        other => panic!("Expected acceptance, got {other:?}"),
    };
    assert_eq!(player_id, candidate_id(&request().identity().fingerprint()));

    let response = outcome.response();
    assert_eq!(response.get_int("lc").unwrap(), Some(2));
    assert_eq!(
        response.get_int("sesskey").unwrap(),
        Some(i64::from(checksum16("some-nick")))
    );
    assert_eq!(
        response.get("proof"),
        Some(derive_proof("some-nick", RESPONSE, SERVER_CHALLENGE, CLIENT_CHALLENGE).as_str())
    );
    assert_eq!(response.get("proof"), Some("f7914097b628f62ac64cd9400472ce98"));
    assert_eq!(response.get_int("userid").unwrap(), Some(player_id));
    assert_eq!(response.get_int("profileid").unwrap(), Some(player_id));
    assert_eq!(response.get("uniquenick"), Some("some-nick"));

    let ticket = response.get("lt").unwrap();
    assert_eq!(ticket.len(), LOGIN_TICKET_LEN + LOGIN_TICKET_SUFFIX.len());
    assert!(ticket.ends_with(LOGIN_TICKET_SUFFIX));
    assert_eq!(response.get_int("id").unwrap(), Some(1));
}

#[test]
fn test_reply_binds_on_client_side() {
    let registry = PlayerRegistry::new();
    let outcome = ready_handshake()
        .process_login(&request().to_packet().to_bytes(), &registry)
        .unwrap();

    let wire = Packet::from_bytes(&outcome.response().to_bytes()).unwrap();
    match LoginReply::from_packet(&wire).unwrap() {
        LoginReply::Accepted(reply) => {
            assert_eq!(reply.lc, 2);
            assert_eq!(reply.session_key, checksum16("some-nick"));
            assert_eq!(reply.unique_nick, "some-nick");
        }
        other => panic!("Expected acceptance, got {other:?}"),
    }
}

#[test]
fn test_invalid_request_gets_error_reply() {
    let registry = PlayerRegistry::new();
    let mut bad = request();
    bad.challenge = "a".repeat(15);

    let mut handshake = ready_handshake();
    let outcome = handshake
        .process_login(&bad.to_packet().to_bytes(), &registry)
        .unwrap();

    match &outcome {
        LoginOutcome::Rejected { reason, response } => {
            assert!(reason.contains("challenge"));
            assert_eq!(response, &error_response());
        }
        other => panic!("Expected rejection, got {other:?}"),
    }
    assert_eq!(handshake.state(), HandshakeState::ErrorResponseBuilt);
    assert!(registry.is_empty().unwrap());
}

#[test]
fn test_garbage_bytes_get_error_reply() {
    let registry = PlayerRegistry::new();
    let outcome = ready_handshake()
        .process_login(b"GET / HTTP/1.1\r\n\r\n", &registry)
        .unwrap();
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.response(), &error_response());
}

#[test]
fn test_login_requires_challenge_first() {
    let registry = PlayerRegistry::new();
    let mut handshake = ServerHandshake::with_challenge(SERVER_CHALLENGE);
    assert!(handshake
        .process_login(&request().to_packet().to_bytes(), &registry)
        .is_err());
    assert!(registry.is_empty().unwrap());
}

#[test]
fn test_repeated_login_keeps_player_id() {
    let registry = PlayerRegistry::new();
    let raw = request().to_packet().to_bytes();

    let first = ready_handshake().process_login(&raw, &registry).unwrap();
    let second = ready_handshake().process_login(&raw, &registry).unwrap();

    assert_eq!(
        first.response().get("userid"),
        second.response().get("userid")
    );
    assert_eq!(registry.len().unwrap(), 1);
}

/// Registry whose fallback range is full and whose slot for `request()` is taken
fn exhausted_registry() -> PlayerRegistry {
    let registry = PlayerRegistry::new();
    for offset in 0..COLLISION_RANGE {
        registry.insert(BASE_PLAYER_ID - offset, "filler").unwrap();
    }
    registry
        .insert(candidate_id(&request().identity().fingerprint()), "someone-else")
        .unwrap();
    registry
}

#[test]
fn test_exhausted_registry_gets_error_reply() {
    let registry = exhausted_registry();
    let mut handshake = ready_handshake();

    let outcome = handshake
        .process_login(&request().to_packet().to_bytes(), &registry)
        .expect("Exhaustion should be answered, not returned");

    match &outcome {
        LoginOutcome::Rejected { reason, response } => {
            assert!(reason.contains("No free player id"));
            assert_eq!(response, &error_response());
        }
        other => panic!("Expected rejection, got {other:?}"),
    }
    assert_eq!(handshake.state(), HandshakeState::ErrorResponseBuilt);
    handshake.advance(HandshakeState::ResponseSent).unwrap();
}
