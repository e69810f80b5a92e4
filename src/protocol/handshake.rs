//! Server side of the challenge/login handshake.
//!
//! A [`ServerHandshake`] is created per connection. It owns the server
//! challenge and tracks the connection through [`HandshakeState`]; the I/O
//! harness drives it by calling [`ServerHandshake::advance`] around its own
//! reads and writes and handing the raw login bytes to
//! [`ServerHandshake::process_login`].

use std::fmt;

use tracing::{debug, instrument, warn};

use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::login::LoginRequest;
use crate::protocol::registry::{AssignmentKind, PlayerRegistry};
use crate::utils::crypto::{checksum16, derive_proof, random_token};

/// Length of the server challenge
pub const SERVER_CHALLENGE_LEN: usize = 10;

/// Length of the random part of the login ticket
pub const LOGIN_TICKET_LEN: usize = 22;

/// Suffix appended to the login ticket
pub const LOGIN_TICKET_SUFFIX: &str = "__";

/// Error code sent on any rejected login
pub const LOGIN_ERROR_CODE: i64 = 256;

/// Message sent on any rejected login
pub const LOGIN_ERROR_MESSAGE: &str = "There was an error logging in to the GP backend.";

/// Per-connection progress through the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingChallengeSend,
    ChallengeSent,
    AwaitingLoginRead,
    LoginReceived,
    Validated,
    Invalid,
    RegistryAssign,
    ResponseBuilt,
    ErrorResponseBuilt,
    ResponseSent,
    Closed,
}

impl HandshakeState {
    pub fn name(self) -> &'static str {
        match self {
            HandshakeState::AwaitingChallengeSend => "AwaitingChallengeSend",
            HandshakeState::ChallengeSent => "ChallengeSent",
            HandshakeState::AwaitingLoginRead => "AwaitingLoginRead",
            HandshakeState::LoginReceived => "LoginReceived",
            HandshakeState::Validated => "Validated",
            HandshakeState::Invalid => "Invalid",
            HandshakeState::RegistryAssign => "RegistryAssign",
            HandshakeState::ResponseBuilt => "ResponseBuilt",
            HandshakeState::ErrorResponseBuilt => "ErrorResponseBuilt",
            HandshakeState::ResponseSent => "ResponseSent",
            HandshakeState::Closed => "Closed",
        }
    }

    /// Whether `next` is a legal successor. Every state may close.
    pub fn can_advance_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;

        if next == Closed {
            return true;
        }
        matches!(
            (self, next),
            (AwaitingChallengeSend, ChallengeSent)
                | (ChallengeSent, AwaitingLoginRead)
                | (AwaitingLoginRead, LoginReceived)
                | (LoginReceived, Validated)
                | (LoginReceived, Invalid)
                | (Validated, RegistryAssign)
                | (Validated, Invalid)
                | (RegistryAssign, ResponseBuilt)
                | (RegistryAssign, Invalid)
                | (Invalid, ErrorResponseBuilt)
                | (ResponseBuilt, ResponseSent)
                | (ErrorResponseBuilt, ResponseSent)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == HandshakeState::Closed
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of processing one login request
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Accepted {
        player_id: i64,
        collided: bool,
        response: Packet,
    },
    Rejected {
        reason: String,
        response: Packet,
    },
}

impl LoginOutcome {
    /// Packet to write back to the client
    pub fn response(&self) -> &Packet {
        match self {
            LoginOutcome::Accepted { response, .. } | LoginOutcome::Rejected { response, .. } => {
                response
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, LoginOutcome::Accepted { .. })
    }
}

/// Handshake state of one connection
#[derive(Debug)]
pub struct ServerHandshake {
    challenge: String,
    state: HandshakeState,
}

impl ServerHandshake {
    /// Start a handshake with a fresh random challenge
    pub fn new() -> Self {
        Self::with_challenge(random_token(SERVER_CHALLENGE_LEN))
    }

    /// Start a handshake with a fixed challenge
    pub fn with_challenge(challenge: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            state: HandshakeState::AwaitingChallengeSend,
        }
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// `InvalidStateTransition` if `next` is not a legal successor.
    pub fn advance(&mut self, next: HandshakeState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(ProtocolError::InvalidStateTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = HandshakeState::Closed;
    }

    /// `\lc\1\challenge\<challenge>\id\1\final\`
    pub fn challenge_packet(&self) -> Packet {
        let mut packet = Packet::new();
        packet.add_int("lc", 1);
        packet.add("challenge", self.challenge.as_str());
        packet.add_int("id", 1);
        packet
    }

    /// Turn the raw login bytes into the reply packet.
    ///
    /// Decode, binding and validation failures produce an error reply and a
    /// `Rejected` outcome, as does an exhausted registry. Other registry
    /// failures are returned as errors.
    #[instrument(skip(self, raw, registry), fields(challenge = %self.challenge))]
    pub fn process_login(&mut self, raw: &[u8], registry: &PlayerRegistry) -> Result<LoginOutcome> {
        self.advance(HandshakeState::LoginReceived)?;

        let request = match Packet::from_bytes(raw).and_then(|p| LoginRequest::from_packet(&p)) {
            Ok(request) => request,
            Err(e) if e.is_login_failure() => {
                debug!(error = %e, data = %String::from_utf8_lossy(raw), "Login request rejected");
                return self.reject(e);
            }
            Err(e) => return Err(e),
        };
        self.advance(HandshakeState::Validated)?;

        self.advance(HandshakeState::RegistryAssign)?;
        let assignment = match registry.assign_detailed(&request.identity()) {
            Ok(assignment) => assignment,
            Err(ProtocolError::RegistryExhausted) => {
                warn!(nick = %request.unique_nick, "No free fallback player id, rejecting login");
                return self.reject(ProtocolError::RegistryExhausted);
            }
            Err(e) => return Err(e),
        };

        let response = login_response(&request, &self.challenge, assignment.player_id);
        self.advance(HandshakeState::ResponseBuilt)?;

        debug!(
            player_id = assignment.player_id,
            kind = ?assignment.kind,
            nick = %request.unique_nick,
            "Player id assigned"
        );

        Ok(LoginOutcome::Accepted {
            player_id: assignment.player_id,
            collided: assignment.kind == AssignmentKind::Collision,
            response,
        })
    }

    fn reject(&mut self, reason: ProtocolError) -> Result<LoginOutcome> {
        self.advance(HandshakeState::Invalid)?;
        self.advance(HandshakeState::ErrorResponseBuilt)?;
        Ok(LoginOutcome::Rejected {
            reason: reason.to_string(),
            response: error_response(),
        })
    }
}

impl Default for ServerHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Success reply for a validated request
pub fn login_response(request: &LoginRequest, server_challenge: &str, player_id: i64) -> Packet {
    let nick = request.unique_nick.as_str();

    let mut packet = Packet::new();
    packet.add_int("lc", 2);
    packet.add_int("sesskey", checksum16(nick));
    packet.add(
        "proof",
        derive_proof(nick, &request.response, server_challenge, &request.challenge),
    );
    packet.add_int("userid", player_id);
    packet.add_int("profileid", player_id);
    packet.add("uniquenick", nick);
    packet.add(
        "lt",
        format!("{}{}", random_token(LOGIN_TICKET_LEN), LOGIN_TICKET_SUFFIX),
    );
    packet.add_int("id", 1);
    packet
}

/// The single error reply of the login service
pub fn error_response() -> Packet {
    let mut packet = Packet::new();
    packet.add("error", "");
    packet.add_int("err", LOGIN_ERROR_CODE);
    packet.add("fatal", "");
    packet.add("errmsg", LOGIN_ERROR_MESSAGE);
    packet.add_int("id", 1);
    packet
}
