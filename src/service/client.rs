use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result, ValidationRule};
use crate::protocol::login::{keys, LoginReply, LoginRequest, LoginResponse};
use crate::utils::crypto::derive_proof;
use crate::utils::timeout::{with_timeout_error, DEFAULT_TIMEOUT};

/// Client side of the login exchange
pub struct LoginClient {
    framed: Framed<TcpStream, PacketCodec>,
    timeout: Duration,
}

impl LoginClient {
    /// Connect to a login server
    #[instrument(skip(addr))]
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = with_timeout_error(
            async { TcpStream::connect(addr).await.map_err(ProtocolError::from) },
            DEFAULT_TIMEOUT,
        )
        .await?;
        debug!(peer = ?stream.peer_addr().ok(), "Connected to login server");

        Ok(Self {
            framed: Framed::new(stream, PacketCodec::new()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Deadline applied to every send and receive
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn send(&mut self, packet: Packet) -> Result<()> {
        with_timeout_error(self.framed.send(packet), self.timeout).await
    }

    pub async fn receive(&mut self) -> Result<Packet> {
        match with_timeout_error(
            async { self.framed.next().await.transpose() },
            self.timeout,
        )
        .await?
        {
            Some(packet) => Ok(packet),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Read the server challenge packet
    pub async fn receive_challenge(&mut self) -> Result<String> {
        let packet = self.receive().await?;
        packet
            .get("challenge")
            .map(str::to_string)
            .ok_or(ProtocolError::Validation {
                field: keys::CHALLENGE,
                rule: ValidationRule::Required,
            })
    }

    /// Run the exchange without interpreting the reply.
    ///
    /// Returns the server challenge and the reply.
    #[instrument(skip(self, request), fields(nick = %request.unique_nick))]
    pub async fn exchange(&mut self, request: &LoginRequest) -> Result<(String, LoginReply)> {
        let challenge = self.receive_challenge().await?;
        debug!(challenge = %challenge, "Received server challenge");

        self.send(request.to_packet()).await?;
        let reply = LoginReply::from_packet(&self.receive().await?)?;
        Ok((challenge, reply))
    }

    /// Log in and check the server proof.
    ///
    /// # Errors
    /// `Custom` when the server rejects the login or its proof does not match.
    pub async fn login(&mut self, request: &LoginRequest) -> Result<LoginResponse> {
        match self.exchange(request).await? {
            (challenge, LoginReply::Accepted(response)) => {
                verify_proof(request, &challenge, &response)?;
                Ok(response)
            }
            (_, LoginReply::Rejected(failure)) => Err(ProtocolError::Custom(format!(
                "{} ({}): {}",
                constants::ERR_LOGIN_REJECTED,
                failure.code,
                failure.message
            ))),
        }
    }
}

/// Check that `response.proof` was derived from this request and challenge
pub fn verify_proof(
    request: &LoginRequest,
    server_challenge: &str,
    response: &LoginResponse,
) -> Result<()> {
    let expected = derive_proof(
        &request.unique_nick,
        &request.response,
        server_challenge,
        &request.challenge,
    );
    if expected == response.proof {
        Ok(())
    } else {
        Err(ProtocolError::Custom(constants::ERR_PROOF_MISMATCH.into()))
    }
}
