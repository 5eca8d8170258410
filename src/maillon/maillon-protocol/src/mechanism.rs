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

//! Server-side SASL exchanges. One [`Exchange`] value per AUTH command,
//! stepped on every decoded client response until it is done or fails.

use crate::auth::{AuthError, Realm};
use base64::Engine;
use hmac::Mac;
use maillon_common::Domain;
use sha2::Digest;

type HmacSha256 = hmac::Hmac<sha2::Sha256>;
type HmacMd5 = hmac::Hmac<md5::Md5>;

/// What the exchange needs next.
pub(crate) enum Step {
    /// Send a `334` challenge with this payload (before base64).
    Challenge(Vec<u8>),
    /// The exchange succeeded; the value is the authorisation identity.
    Done(String),
}

fn random_bytes<const N: usize>() -> Result<[u8; N], AuthError> {
    let mut bytes = [0; N];
    getrandom::getrandom(&mut bytes).map_err(|_e| AuthError::Unavailable)?;
    Ok(bytes)
}

#[allow(clippy::expect_used)]
fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[allow(clippy::expect_used)]
fn hmac_md5_hex(key: &[u8], data: &[u8]) -> String {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn b64(input: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

fn b64_decode(input: &str) -> Result<Vec<u8>, AuthError> {
    base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|_e| AuthError::Malformed)
}

/// Undo the `=2C` / `=3D` escaping of a SCRAM saslname (RFC 5802 §5.1).
fn decode_sasl_name(input: &str) -> Result<String, AuthError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('=') {
        out.push_str(&rest[..pos]);
        match rest.get(pos + 1..pos + 3) {
            Some("2C") => out.push(','),
            Some("3D") => out.push('='),
            _ => return Err(AuthError::Malformed),
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    if out.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(out)
}

enum ScramState {
    ExpectClientFirst,
    ExpectClientFinal {
        authid: String,
        username: String,
        gs2_header: String,
        client_first_bare: String,
        server_first: String,
        full_nonce: String,
        salt: Vec<u8>,
        iterations: u32,
    },
    ExpectClosingResponse {
        authid: String,
    },
}

/// Server side of SCRAM-SHA-256 (RFC 5802, RFC 7677), without channel
/// binding (the `-PLUS` variant is not advertised).
pub(crate) struct ScramSha256 {
    state: ScramState,
}

const SCRAM_ITERATIONS: u32 = 4096;

impl ScramSha256 {
    const fn new() -> Self {
        Self {
            state: ScramState::ExpectClientFirst,
        }
    }

    fn client_first(&mut self, input: &[u8]) -> Result<Step, AuthError> {
        let input = std::str::from_utf8(input).map_err(|_e| AuthError::Malformed)?;

        let (cbind, rest) = input.split_once(',').ok_or(AuthError::Malformed)?;
        match cbind {
            // "y" means the client *could* do channel binding; both resolve
            // to the unbound exchange here.
            "n" | "y" => (),
            // A channel-binding request cannot be honored.
            _ => return Err(AuthError::Failed),
        }
        let (authzid_part, client_first_bare) =
            rest.split_once(',').ok_or(AuthError::Malformed)?;
        let authzid = authzid_part
            .strip_prefix("a=")
            .map(decode_sasl_name)
            .transpose()?;

        let mut username = None;
        let mut client_nonce = None;
        for attr in client_first_bare.split(',') {
            match attr.split_once('=') {
                Some(("n", value)) if username.is_none() => {
                    username = Some(decode_sasl_name(value)?);
                }
                Some(("r", _)) if client_nonce.is_none() => {
                    client_nonce = Some(&attr[2..]);
                }
                // Optional extensions are tolerated once the mandatory
                // attributes are in.
                Some(_) if username.is_some() && client_nonce.is_some() => (),
                _ => return Err(AuthError::Malformed),
            }
        }
        let username = username.ok_or(AuthError::Malformed)?;
        let client_nonce = client_nonce.ok_or(AuthError::Malformed)?;

        let authid = match authzid {
            Some(authzid) if authzid != username => return Err(AuthError::Failed),
            Some(authzid) => authzid,
            None => username.clone(),
        };

        let full_nonce = format!("{client_nonce}{}", b64(&random_bytes::<18>()?));
        let salt = random_bytes::<16>()?.to_vec();
        let server_first = format!(
            "r={full_nonce},s={},i={SCRAM_ITERATIONS}",
            b64(&salt)
        );

        let challenge = server_first.clone().into_bytes();
        self.state = ScramState::ExpectClientFinal {
            authid,
            username,
            gs2_header: format!("{cbind},{authzid_part},"),
            client_first_bare: client_first_bare.to_owned(),
            server_first,
            full_nonce,
            salt,
            iterations: SCRAM_ITERATIONS,
        };
        Ok(Step::Challenge(challenge))
    }

    #[allow(clippy::too_many_lines)]
    async fn client_final(&mut self, realm: &dyn Realm, input: &[u8]) -> Result<Step, AuthError> {
        let ScramState::ExpectClientFinal {
            authid,
            username,
            gs2_header,
            client_first_bare,
            server_first,
            full_nonce,
            salt,
            iterations,
        } = &self.state
        else {
            return Err(AuthError::Malformed);
        };
        let authid = authid.clone();

        let input = std::str::from_utf8(input).map_err(|_e| AuthError::Malformed)?;
        let (without_proof, proof) = input
            .rsplit_once(",p=")
            .ok_or(AuthError::Malformed)?;

        let mut channel_binding = None;
        let mut nonce = None;
        for attr in without_proof.split(',') {
            match attr.split_once('=') {
                Some(("c", value)) if channel_binding.is_none() => {
                    channel_binding = Some(value.to_owned());
                }
                Some(("r", _)) if nonce.is_none() => nonce = Some(&attr[2..]),
                Some(_) if channel_binding.is_some() && nonce.is_some() => (),
                _ => return Err(AuthError::Malformed),
            }
        }
        if channel_binding.as_deref() != Some(b64(gs2_header.as_bytes()).as_str()) {
            return Err(AuthError::Failed);
        }
        if nonce != Some(full_nonce.as_str()) {
            return Err(AuthError::Failed);
        }

        let Some(password) = realm
            .stored_password(username)
            .await
            .map_err(|_e| AuthError::Unavailable)?
        else {
            return Err(AuthError::Failed);
        };

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
            password.as_bytes(),
            salt,
            *iterations,
            &mut salted_password,
        );
        let client_key = hmac_sha256(&salted_password, b"Client Key");
        let stored_key: [u8; 32] = sha2::Sha256::digest(client_key).into();
        let auth_message = format!("{client_first_bare},{server_first},{without_proof}");
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());

        let proof = b64_decode(proof)?;
        if proof.len() != client_key.len() {
            return Err(AuthError::Failed);
        }
        let recovered_key = proof
            .iter()
            .zip(client_signature.iter())
            .map(|(p, s)| p ^ s)
            .collect::<Vec<_>>();
        if <[u8; 32]>::from(sha2::Sha256::digest(recovered_key)) != stored_key {
            return Err(AuthError::Failed);
        }

        let server_key = hmac_sha256(&salted_password, b"Server Key");
        let server_signature = hmac_sha256(&server_key, auth_message.as_bytes());
        let verifier = format!("v={}", b64(&server_signature));

        self.state = ScramState::ExpectClosingResponse { authid };
        Ok(Step::Challenge(verifier.into_bytes()))
    }
}

/// One in-flight SASL exchange.
pub(crate) enum Exchange {
    Plain,
    Login { username: Option<String> },
    CramMd5 { challenge: String },
    Scram(ScramSha256),
}

impl Exchange {
    /// Open an exchange. The second value is the payload of the initial
    /// `334` challenge sent when the client provided no initial response.
    pub(crate) fn start(
        mechanism: maillon_common::auth::Mechanism,
        server_name: &Domain,
    ) -> Result<(Self, Vec<u8>), AuthError> {
        use maillon_common::auth::Mechanism;
        match mechanism {
            Mechanism::Plain => Ok((Self::Plain, vec![])),
            Mechanism::Login => Ok((
                Self::Login { username: None },
                b"Username:".to_vec(),
            )),
            Mechanism::CramMd5 => {
                let nonce = u64::from_be_bytes(random_bytes::<8>()?);
                let challenge = format!(
                    "<{nonce:016x}.{}@{server_name}>",
                    time::OffsetDateTime::now_utc().unix_timestamp(),
                );
                let payload = challenge.clone().into_bytes();
                Ok((Self::CramMd5 { challenge }, payload))
            }
            Mechanism::ScramSha256 => Ok((Self::Scram(ScramSha256::new()), vec![])),
            _ => Err(AuthError::UnsupportedMechanism),
        }
    }

    /// Step the exchange on one decoded client response.
    pub(crate) async fn step(
        &mut self,
        realm: &dyn Realm,
        input: &[u8],
    ) -> Result<Step, AuthError> {
        match self {
            Self::Plain => {
                let mut parts = input.split(|byte| *byte == 0);
                let (Some(authzid), Some(authcid), Some(password), None) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return Err(AuthError::Malformed);
                };
                if authcid.is_empty() || password.is_empty() {
                    return Err(AuthError::Failed);
                }
                let authcid =
                    std::str::from_utf8(authcid).map_err(|_e| AuthError::Malformed)?;
                let password =
                    std::str::from_utf8(password).map_err(|_e| AuthError::Malformed)?;
                let authzid =
                    std::str::from_utf8(authzid).map_err(|_e| AuthError::Malformed)?;

                if !realm
                    .verify_password(authcid, password)
                    .await
                    .map_err(|_e| AuthError::Unavailable)?
                {
                    return Err(AuthError::Failed);
                }
                if !authzid.is_empty() && authzid != authcid {
                    // Proxy authorisation needs an administrative role.
                    if !realm
                        .has_role(authcid, "admin")
                        .await
                        .map_err(|_e| AuthError::Unavailable)?
                    {
                        return Err(AuthError::Failed);
                    }
                    return Ok(Step::Done(authzid.to_owned()));
                }
                Ok(Step::Done(authcid.to_owned()))
            }
            Self::Login { username } => match username.take() {
                None => {
                    let decoded = String::from_utf8(input.to_vec())
                        .map_err(|_e| AuthError::Malformed)?;
                    if decoded.is_empty() {
                        return Err(AuthError::Failed);
                    }
                    *username = Some(decoded);
                    Ok(Step::Challenge(b"Password:".to_vec()))
                }
                Some(user) => {
                    let password = String::from_utf8(input.to_vec())
                        .map_err(|_e| AuthError::Malformed)?;
                    if password.is_empty() {
                        return Err(AuthError::Failed);
                    }
                    if realm
                        .verify_password(&user, &password)
                        .await
                        .map_err(|_e| AuthError::Unavailable)?
                    {
                        Ok(Step::Done(user))
                    } else {
                        Err(AuthError::Failed)
                    }
                }
            },
            Self::CramMd5 { challenge } => {
                let input = std::str::from_utf8(input).map_err(|_e| AuthError::Malformed)?;
                let (username, digest) =
                    input.rsplit_once(' ').ok_or(AuthError::Malformed)?;
                if username.is_empty() || digest.len() != 32 {
                    return Err(AuthError::Malformed);
                }
                let Some(password) = realm
                    .stored_password(username)
                    .await
                    .map_err(|_e| AuthError::Unavailable)?
                else {
                    return Err(AuthError::Failed);
                };
                if hmac_md5_hex(password.as_bytes(), challenge.as_bytes())
                    == digest.to_ascii_lowercase()
                {
                    Ok(Step::Done(username.to_owned()))
                } else {
                    Err(AuthError::Failed)
                }
            }
            Self::Scram(scram) => match &scram.state {
                ScramState::ExpectClientFirst => scram.client_first(input),
                ScramState::ExpectClientFinal { .. } => scram.client_final(realm, input).await,
                ScramState::ExpectClosingResponse { authid } => {
                    if input.is_empty() {
                        Ok(Step::Done(authid.clone()))
                    } else {
                        Err(AuthError::Malformed)
                    }
                }
            },
        }
    }
}
