/*
 * maillon mail transfer agent
 * Copyright (C) 2024 The maillon developers
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/

use crate::{
    mechanism::{Exchange, Step},
    reader::Reader,
    Error,
};
use base64::Engine;
use maillon_common::{auth::Mechanism, Address, Domain};
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;

/// Credential store consulted by the SASL subsystem. May be shared across
/// connections; implementations must be safe to call concurrently.
#[async_trait::async_trait]
pub trait Realm: Send + Sync {
    /// Verify a cleartext proof (PLAIN, LOGIN).
    async fn verify_password(&self, authcid: &str, password: &str) -> anyhow::Result<bool>;

    /// The stored secret of a user, needed by keyed-digest mechanisms
    /// (CRAM-MD5, SCRAM-SHA-256). `None` when the user does not exist.
    async fn stored_password(&self, authcid: &str) -> anyhow::Result<Option<String>>;

    /// Role membership, used for sender authorisation and proxy
    /// authentication (`admin`, `postmaster`).
    async fn has_role(&self, principal: &str, role: &str) -> anyhow::Result<bool>;

    /// Mechanisms this realm can verify.
    fn mechanisms(&self) -> Vec<Mechanism> {
        vec![
            Mechanism::Plain,
            Mechanism::Login,
            Mechanism::CramMd5,
            Mechanism::ScramSha256,
        ]
    }
}

/// Why a SASL exchange did not produce a principal.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credentials did not verify.
    #[error("authentication credentials invalid")]
    Failed,
    /// The client cancelled the exchange with `*`.
    #[error("authentication cancelled by the client")]
    Cancelled,
    /// Base64 or mechanism syntax error.
    #[error("malformed authentication response")]
    Malformed,
    /// The mechanism is known but has no verifier here.
    #[error("mechanism not supported")]
    UnsupportedMechanism,
    /// A server-first mechanism received an initial response.
    #[error("initial response not allowed for this mechanism")]
    ClientMustNotStart,
    /// The realm failed or no randomness was available.
    #[error("authentication temporarily unavailable")]
    Unavailable,
    /// The client went silent mid-exchange.
    #[error("timeout during the authentication exchange")]
    Timeout,
    /// Transport failure; the connection is unusable.
    #[error(transparent)]
    Io(#[from] Error),
}

/// Drive one AUTH exchange over `334` challenges until it produces an
/// authorisation identity.
///
/// Replies for the outcome itself (`235`, `535`, …) are the caller's to
/// send; only the intermediate challenges go out here.
pub(crate) async fn authenticate<W, R>(
    stream: &mut Reader<R>,
    sink: &mut W,
    realm: &dyn Realm,
    mechanism: Mechanism,
    initial_response: Option<Vec<u8>>,
    server_name: &Domain,
    timeout: std::time::Duration,
) -> Result<String, AuthError>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let (mut exchange, first_challenge) = Exchange::start(mechanism, server_name)?;

    let mut input = match initial_response {
        Some(encoded) => {
            if mechanism.server_first() {
                return Err(AuthError::ClientMustNotStart);
            }
            decode_response(&encoded)?
        }
        None => {
            send_challenge(sink, &first_challenge).await?;
            read_response(stream, timeout).await?
        }
    };

    loop {
        match exchange.step(realm, &input).await? {
            Step::Done(authid) => return Ok(authid),
            Step::Challenge(challenge) => {
                send_challenge(sink, &challenge).await?;
                input = read_response(stream, timeout).await?;
            }
        }
    }
}

async fn send_challenge<W>(sink: &mut W, payload: &[u8]) -> Result<(), AuthError>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let line = format!(
        "334 {}\r\n",
        base64::engine::general_purpose::STANDARD.encode(payload)
    );
    tracing::trace!(">> {:?}", line);
    sink.write_all(line.as_bytes())
        .await
        .map_err(|e| AuthError::Io(e.into()))
}

async fn read_response<R>(
    stream: &mut Reader<R>,
    timeout: std::time::Duration,
) -> Result<Vec<u8>, AuthError>
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let line = {
        let lines = stream.as_line_stream().timeout(timeout);
        tokio::pin!(lines);
        match lines.try_next().await {
            Ok(Some(Ok(line))) => line,
            Ok(Some(Err(_e))) => return Err(AuthError::Malformed),
            Ok(None) => {
                return Err(AuthError::Io(
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed during the authentication exchange",
                    )
                    .into(),
                ))
            }
            Err(_elapsed) => return Err(AuthError::Timeout),
        }
    };
    let line = line
        .strip_suffix(b"\r\n")
        .ok_or(AuthError::Malformed)?;
    if line == b"*" {
        return Err(AuthError::Cancelled);
    }
    decode_response(line)
}

fn decode_response(encoded: &[u8]) -> Result<Vec<u8>, AuthError> {
    if encoded.is_empty() {
        return Ok(vec![]);
    }
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_e| AuthError::Malformed)
}

/// May the authenticated principal submit mail as `sender`? True when the
/// principal is the full address or its local part, or holds an
/// administrative role in the realm.
pub(crate) async fn sender_authorized(
    realm: Option<&dyn Realm>,
    principal: &str,
    sender: &Address,
) -> anyhow::Result<bool> {
    if principal == sender.full() || principal == sender.local_part() {
        return Ok(true);
    }
    if let Some(realm) = realm {
        for role in ["admin", "postmaster"] {
            if realm.has_role(principal, role).await? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
