//! Login request and reply models.
//!
//! A [`LoginRequest`] is bound from the client's packet and must pass
//! [`LoginRequest::validate`] before it is eligible for a player id. The reply
//! types are the client-side view of the server's answer.

use crate::core::bind::{bind_int, FromPacket};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result, ValidationRule};
use crate::protocol::registry::PlayerIdentity;
use crate::utils::crypto::is_md5_hex;

/// Required length of the client challenge
pub const CLIENT_CHALLENGE_LEN: usize = 32;

/// Wire keys of the login request, in canonical order
pub mod keys {
    pub const LOGIN: &str = "login";
    pub const CHALLENGE: &str = "challenge";
    pub const UNIQUE_NICK: &str = "uniquenick";
    pub const RESPONSE: &str = "response";
    pub const PORT: &str = "port";
    pub const PRODUCT_ID: &str = "productid";
    pub const GAME_NAME: &str = "gamename";
    pub const NAMESPACE_ID: &str = "namespaceid";
    pub const SDK_REVISION: &str = "sdkrevision";
    pub const ID: &str = "id";
}

/// Typed view of a client login packet.
///
/// Numeric attributes stay textual; they are checked by [`validate`](Self::validate)
/// and fed verbatim into the identity fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    /// `None` when the `login` key is missing
    pub login: Option<String>,
    pub challenge: String,
    pub unique_nick: String,
    pub response: String,
    pub port: String,
    pub product_id: String,
    pub game_name: String,
    pub namespace_id: String,
    pub sdk_revision: String,
    pub id: String,
}

impl FromPacket for LoginRequest {
    fn assign(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        match key {
            keys::LOGIN => self.login = Some(value),
            keys::CHALLENGE => self.challenge = value,
            keys::UNIQUE_NICK => self.unique_nick = value,
            keys::RESPONSE => self.response = value,
            keys::PORT => self.port = value,
            keys::PRODUCT_ID => self.product_id = value,
            keys::GAME_NAME => self.game_name = value,
            keys::NAMESPACE_ID => self.namespace_id = value,
            keys::SDK_REVISION => self.sdk_revision = value,
            keys::ID => self.id = value,
            _ => {}
        }
        Ok(())
    }
}

fn violation(field: &'static str, rule: ValidationRule) -> ProtocolError {
    ProtocolError::Validation { field, rule }
}

fn require_numeric(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(violation(field, ValidationRule::Required));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(violation(field, ValidationRule::Numeric));
    }
    Ok(())
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(violation(field, ValidationRule::NonEmpty));
    }
    Ok(())
}

impl LoginRequest {
    /// Bind and validate a decoded packet in one step
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let request: Self = packet.bind()?;
        request.validate()?;
        Ok(request)
    }

    /// Check every field, stopping at the first violation.
    ///
    /// # Errors
    /// `ProtocolError::Validation` naming the wire key and the broken rule.
    pub fn validate(&self) -> Result<()> {
        match self.login.as_deref() {
            None => return Err(violation(keys::LOGIN, ValidationRule::Required)),
            Some(login) if !login.is_empty() => {
                return Err(violation(keys::LOGIN, ValidationRule::Empty))
            }
            Some(_) => {}
        }

        if self.challenge.chars().count() != CLIENT_CHALLENGE_LEN {
            return Err(violation(
                keys::CHALLENGE,
                ValidationRule::Length(CLIENT_CHALLENGE_LEN),
            ));
        }

        require_non_empty(keys::UNIQUE_NICK, &self.unique_nick)?;

        if self.response.is_empty() {
            return Err(violation(keys::RESPONSE, ValidationRule::Required));
        }
        if !is_md5_hex(&self.response) {
            return Err(violation(keys::RESPONSE, ValidationRule::Md5));
        }

        require_numeric(keys::PORT, &self.port)?;
        require_numeric(keys::PRODUCT_ID, &self.product_id)?;
        require_non_empty(keys::GAME_NAME, &self.game_name)?;
        require_numeric(keys::NAMESPACE_ID, &self.namespace_id)?;
        require_numeric(keys::SDK_REVISION, &self.sdk_revision)?;
        require_numeric(keys::ID, &self.id)?;

        Ok(())
    }

    /// Attributes that identify the player across logins
    pub fn identity(&self) -> PlayerIdentity<'_> {
        PlayerIdentity {
            nick: &self.unique_nick,
            product_id: &self.product_id,
            game_name: &self.game_name,
            namespace_id: &self.namespace_id,
            sdk_revision: &self.sdk_revision,
        }
    }

    /// Encode the request in canonical key order, `login` first and empty
    pub fn to_packet(&self) -> Packet {
        let mut packet = Packet::new();
        packet.add(keys::LOGIN, self.login.clone().unwrap_or_default());
        packet.add(keys::CHALLENGE, self.challenge.as_str());
        packet.add(keys::UNIQUE_NICK, self.unique_nick.as_str());
        packet.add(keys::RESPONSE, self.response.as_str());
        packet.add(keys::PORT, self.port.as_str());
        packet.add(keys::PRODUCT_ID, self.product_id.as_str());
        packet.add(keys::GAME_NAME, self.game_name.as_str());
        packet.add(keys::NAMESPACE_ID, self.namespace_id.as_str());
        packet.add(keys::SDK_REVISION, self.sdk_revision.as_str());
        packet.add(keys::ID, self.id.as_str());
        packet
    }
}

/// Successful login reply (`lc=2`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub lc: i64,
    pub session_key: u16,
    pub proof: String,
    pub user_id: i64,
    pub profile_id: i64,
    pub unique_nick: String,
    pub login_ticket: String,
    pub id: i64,
}

impl FromPacket for LoginResponse {
    fn assign(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "lc" => bind_int(&mut self.lc, key, value)?,
            "sesskey" => bind_int(&mut self.session_key, key, value)?,
            "proof" => self.proof = value.to_string(),
            "userid" => bind_int(&mut self.user_id, key, value)?,
            "profileid" => bind_int(&mut self.profile_id, key, value)?,
            "uniquenick" => self.unique_nick = value.to_string(),
            "lt" => self.login_ticket = value.to_string(),
            "id" => bind_int(&mut self.id, key, value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Error login reply (`\error\\err\...`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginFailure {
    pub code: i64,
    pub fatal: bool,
    pub message: String,
    pub id: i64,
}

impl FromPacket for LoginFailure {
    fn assign(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "err" => bind_int(&mut self.code, key, value)?,
            "fatal" => self.fatal = true,
            "errmsg" => self.message = value.to_string(),
            "id" => bind_int(&mut self.id, key, value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Either answer the server can give to a login request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    Accepted(LoginResponse),
    Rejected(LoginFailure),
}

impl LoginReply {
    /// Classify and bind a reply packet; error replies carry an `error` key
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        if packet.contains_key("error") {
            Ok(LoginReply::Rejected(packet.bind()?))
        } else {
            Ok(LoginReply::Accepted(packet.bind()?))
        }
    }
}
