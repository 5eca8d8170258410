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

use crate::{auth::Credentials, Address, ClientName, Domain, Stage};
use tokio_rustls::rustls;

/// See "SMTP Service Extension for 8-bit MIME Transport" (RFC 6152) and
/// "Binary content" (RFC 3030).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumVariantNames,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub enum BodyType {
    /// US-ASCII lines, the RFC 5321 default.
    #[default]
    #[strum(serialize = "7BIT")]
    SevenBit,
    /// 8-bit MIME content, still line-oriented.
    #[strum(serialize = "8BITMIME")]
    EightBitMime,
    /// Arbitrary binary content; may only be transferred with BDAT.
    #[strum(serialize = "BINARYMIME")]
    BinaryMime,
}

/// RFC 3461: return either the full message or only the headers in a
/// delivery failure notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DsnReturn {
    /// Complete message.
    Full,
    /// Only the message headers.
    Headers,
}

/// RFC 3461 `NOTIFY` argument of a recipient.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub enum NotifyOn {
    /// This message must explicitly not produce a DSN.
    Never,
    /// One or more scenarios that should produce a DSN.
    Some {
        /// The delivery of the message to the recipient was successful.
        success: bool,
        /// The delivery of the message to the recipient failed.
        failure: bool,
        /// The delivery of the message to the recipient has been delayed.
        delay: bool,
    },
}

impl Default for NotifyOn {
    #[inline]
    fn default() -> Self {
        Self::Some {
            success: false,
            failure: true,
            delay: false,
        }
    }
}

/// RFC 3461 `ORCPT` argument of a recipient.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OriginalRecipient {
    /// The type of address used in the `ORCPT` argument (usually `rfc822`).
    pub addr_type: String,
    /// The original recipient address, xtext-decoded.
    pub mailbox: Address,
}

/// RFC 2852 `BY` modifier: what happens when the deadline is missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliverByMode {
    /// Return the message to the sender.
    Return,
    /// Issue a delayed DSN and keep trying.
    Notify,
}

/// RFC 2852 `BY` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeliverBy {
    /// Seconds from reception within which delivery must complete.
    pub seconds: u64,
    /// Behavior on a missed deadline.
    pub mode: DeliverByMode,
}

/// Forward-delivery constraints collected from MAIL FROM parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeliveryRequirements {
    /// RFC 8689: every onward hop must use TLS.
    pub require_tls: bool,
    /// RFC 6710 `MT-PRIORITY`, in `[-9, 9]`.
    pub priority: Option<i8>,
    /// RFC 4865 `HOLDFOR`/`HOLDUNTIL`: do not deliver before this instant.
    #[serde(default, with = "time::serde::iso8601::option")]
    pub release_at: Option<time::OffsetDateTime>,
    /// RFC 2852 `BY`.
    pub deliver_by: Option<DeliverBy>,
}

/// One accepted recipient with its DSN parameters, in acceptance order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Recipient {
    /// The forward path.
    pub forward_path: Address,
    /// RFC 3461 `NOTIFY`.
    pub notify_on: NotifyOn,
    /// RFC 3461 `ORCPT`.
    pub original_forward_path: Option<OriginalRecipient>,
}

/// Negotiated TLS parameters of a secured connection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TlsProperties {
    /// Negotiated protocol version (TLS 1.2, TLS 1.3, …).
    #[serde(with = "serde_protocol_version")]
    pub protocol_version: rustls::ProtocolVersion,
    /// Negotiated cipher suite.
    #[serde(with = "serde_cipher_suite")]
    pub cipher_suite: rustls::CipherSuite,
    /// SNI hostname presented by the client, if any.
    pub sni: Option<String>,
    /// Client certificate chain, if one was presented.
    #[serde(
        default,
        skip_deserializing,
        serialize_with = "serialize_peer_certificates"
    )]
    pub peer_certificates: Option<Vec<rustls::Certificate>>,
    /// Negotiated ALPN protocol, if any.
    pub alpn_protocol: Option<Vec<u8>>,
}

mod serde_protocol_version {
    use tokio_rustls::rustls;

    pub fn serialize<S: serde::Serializer>(
        value: &rustls::ProtocolVersion,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(value.get_u16())
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<rustls::ProtocolVersion, D::Error> {
        <u16 as serde::Deserialize>::deserialize(deserializer).map(rustls::ProtocolVersion::from)
    }
}

mod serde_cipher_suite {
    use tokio_rustls::rustls;

    pub fn serialize<S: serde::Serializer>(
        value: &rustls::CipherSuite,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(value.get_u16())
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<rustls::CipherSuite, D::Error> {
        <u16 as serde::Deserialize>::deserialize(deserializer).map(rustls::CipherSuite::from)
    }
}

fn serialize_peer_certificates<S: serde::Serializer>(
    value: &Option<Vec<rustls::Certificate>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use base64::Engine;
    let encoded = value.as_ref().map(|certs| {
        certs
            .iter()
            .map(|cert| base64::engine::general_purpose::STANDARD.encode(&cert.0))
            .collect::<Vec<_>>()
    });
    <Option<Vec<String>> as serde::Serialize>::serialize(&encoded, serializer)
}

/// Properties of the authentication SASL exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthProperties {
    /// Has a SASL exchange completed successfully?
    pub authenticated: bool,
    /// Number of times an exchange was cancelled or failed on this
    /// connection.
    pub failure_count: usize,
    /// The credentials established by the last successful exchange. They
    /// survive RSET and transaction boundaries.
    pub credentials: Option<Credentials>,
}

/// Properties known right after the TCP connection is accepted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectProperties {
    /// Instant the connection was accepted.
    #[serde(with = "time::serde::iso8601")]
    pub connect_timestamp: time::OffsetDateTime,
    /// Unique identifier of the connection.
    pub connect_uuid: uuid::Uuid,
    /// Peer address (possibly overridden by XCLIENT).
    pub client_addr: std::net::SocketAddr,
    /// Local address the client connected to (possibly overridden by
    /// XCLIENT `DESTADDR`/`DESTPORT`).
    pub server_addr: std::net::SocketAddr,
    /// Name this server presents in its banner and EHLO reply.
    pub server_name: Domain,
    /// Client hostname asserted by a trusted proxy (XCLIENT `NAME`).
    pub client_host: Option<String>,
    /// TLS parameters once the channel is secured.
    pub tls: Option<TlsProperties>,
    /// SASL state of the connection.
    pub auth: Option<AuthProperties>,
}

/// Properties known after HELO/EHLO.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeloProperties {
    /// Name the client presented.
    pub client_name: ClientName,
    /// True for the historical HELO, false for EHLO.
    pub using_deprecated: bool,
}

/// The envelope fields set by a MAIL FROM command, as one record so the
/// transition into the transaction is a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailFromEnvelope {
    /// Sender address; `None` is the empty bounce sender.
    pub reverse_path: Option<Address>,
    /// SMTPUTF8 was requested for this transaction.
    pub utf8: bool,
    /// `BODY` parameter.
    pub body_type: BodyType,
    /// `SIZE` declaration.
    pub size_hint: Option<u64>,
    /// `ENVID`, xtext-decoded.
    pub envelope_id: Option<String>,
    /// `RET`.
    pub dsn_return: Option<DsnReturn>,
    /// REQUIRETLS / MT-PRIORITY / HOLDFOR / HOLDUNTIL / BY.
    pub requirements: DeliveryRequirements,
}

/// Properties known after MAIL FROM.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MailFromProperties {
    /// Sender address; `None` is the empty bounce sender.
    pub reverse_path: Option<Address>,
    /// Instant the transaction was opened.
    #[serde(with = "time::serde::iso8601")]
    pub mail_timestamp: time::OffsetDateTime,
    /// Unique identifier of the message.
    pub message_uuid: uuid::Uuid,
    /// SMTPUTF8 is active for this transaction.
    pub utf8: bool,
    /// Negotiated body type.
    pub body_type: BodyType,
    /// Declared message size, if any.
    pub size_hint: Option<u64>,
    /// RFC 3461 envelope identifier.
    pub envelope_id: Option<String>,
    /// RFC 3461 `RET`.
    pub dsn_return: Option<DsnReturn>,
    /// Delivery constraints.
    pub requirements: DeliveryRequirements,
}

/// Properties known after RCPT TO.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RcptToProperties {
    /// Accepted recipients, in acceptance order.
    pub forward_paths: Vec<Recipient>,
}

/// Properties known once the message content has been fully received.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FinishedProperties {
    /// Number of content bytes delivered to the application.
    pub delivered_bytes: u64,
}

/// Error produced when accessing a field outside the stages it exists in.
#[derive(Debug)]
pub struct FieldAccessError {
    field: &'static str,
    stage: Vec<Stage>,
}

impl FieldAccessError {
    fn new(field: &'static str, stage: Vec<Stage>) -> Self {
        Self { field, stage }
    }
}

impl std::error::Error for FieldAccessError {}

impl std::fmt::Display for FieldAccessError {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "field '{}' is available in [{}]",
            self.field,
            self.stage
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

macro_rules! after {
    (Helo) => {
        vec![Stage::Helo, Stage::MailFrom, Stage::RcptTo, Stage::Quit]
    };
    (MailFrom) => {
        vec![Stage::MailFrom, Stage::RcptTo]
    };
    (RcptTo) => {
        vec![Stage::RcptTo]
    };
}

/// A step-by-step SMTP envelope, one record per protocol stage so a field
/// only exists while the protocol defines it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Context {
    /// See [`Stage::Connect`].
    Connect {
        /// Connection-lifetime properties.
        connect: ConnectProperties,
    },
    /// See [`Stage::Helo`].
    Helo {
        /// Connection-lifetime properties.
        connect: ConnectProperties,
        /// HELO/EHLO properties.
        helo: HeloProperties,
    },
    /// See [`Stage::MailFrom`].
    MailFrom {
        /// Connection-lifetime properties.
        connect: ConnectProperties,
        /// HELO/EHLO properties.
        helo: HeloProperties,
        /// Open transaction properties.
        mail_from: MailFromProperties,
    },
    /// See [`Stage::RcptTo`].
    RcptTo {
        /// Connection-lifetime properties.
        connect: ConnectProperties,
        /// HELO/EHLO properties.
        helo: HeloProperties,
        /// Open transaction properties.
        mail_from: MailFromProperties,
        /// Recipient set.
        rcpt_to: RcptToProperties,
    },
    /// The message has been fully received.
    Finished(ContextFinished),
}

/// The complete envelope handed to the application on message completion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContextFinished {
    /// Connection-lifetime properties.
    pub connect: ConnectProperties,
    /// HELO/EHLO properties.
    pub helo: HeloProperties,
    /// Transaction properties.
    pub mail_from: MailFromProperties,
    /// Recipient set.
    pub rcpt_to: RcptToProperties,
    /// Completion properties.
    pub finished: FinishedProperties,
}

/// Error produced by an invalid stage transition or field access.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested transition is not legal from the current stage.
    #[error("bad stage transition")]
    Conversion {},
    /// A field was accessed outside the stages it exists in.
    #[error("{0}")]
    BadState(#[from] FieldAccessError),
}

impl Context {
    /// Create the context of a freshly accepted connection.
    #[inline]
    #[must_use]
    pub fn new(
        client_addr: std::net::SocketAddr,
        server_addr: std::net::SocketAddr,
        server_name: Domain,
        timestamp: time::OffsetDateTime,
        uuid: uuid::Uuid,
    ) -> Self {
        Self::Connect {
            connect: ConnectProperties {
                connect_timestamp: timestamp,
                connect_uuid: uuid,
                client_addr,
                server_addr,
                server_name,
                client_host: None,
                tls: None,
                auth: None,
            },
        }
    }

    /// Rebuild a connect-stage context from explicit connection properties
    /// (used by the XCLIENT trust-delegation reset).
    #[inline]
    #[must_use]
    pub const fn with_connect(connect: ConnectProperties) -> Self {
        Self::Connect { connect }
    }

    /// Get the current protocol stage this envelope corresponds to.
    #[inline]
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Connect { .. } => Stage::Connect,
            Self::Helo { .. } => Stage::Helo,
            Self::MailFrom { .. } => Stage::MailFrom,
            Self::RcptTo { .. } => Stage::RcptTo,
            Self::Finished(_) => Stage::Quit,
        }
    }

    fn connect(&self) -> &ConnectProperties {
        match self {
            Self::Connect { connect }
            | Self::Helo { connect, .. }
            | Self::MailFrom { connect, .. }
            | Self::RcptTo { connect, .. }
            | Self::Finished(ContextFinished { connect, .. }) => connect,
        }
    }

    fn connect_mut(&mut self) -> &mut ConnectProperties {
        match self {
            Self::Connect { connect }
            | Self::Helo { connect, .. }
            | Self::MailFrom { connect, .. }
            | Self::RcptTo { connect, .. }
            | Self::Finished(ContextFinished { connect, .. }) => connect,
        }
    }

    /// Connection-lifetime properties.
    #[inline]
    #[must_use]
    pub fn connect_properties(&self) -> &ConnectProperties {
        self.connect()
    }

    /// Address of the peer.
    #[inline]
    #[must_use]
    pub fn client_addr(&self) -> &std::net::SocketAddr {
        &self.connect().client_addr
    }

    /// Address the peer connected to.
    #[inline]
    #[must_use]
    pub fn server_addr(&self) -> &std::net::SocketAddr {
        &self.connect().server_addr
    }

    /// Name this server presents to the client.
    #[inline]
    #[must_use]
    pub fn server_name(&self) -> &Domain {
        &self.connect().server_name
    }

    /// Unique identifier of the connection.
    #[inline]
    #[must_use]
    pub fn connection_uuid(&self) -> &uuid::Uuid {
        &self.connect().connect_uuid
    }

    /// Is the channel encrypted?
    #[inline]
    #[must_use]
    pub fn is_secured(&self) -> bool {
        self.connect().tls.is_some()
    }

    /// Has a SASL exchange completed successfully?
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.connect()
            .auth
            .as_ref()
            .map_or(false, |auth| auth.authenticated)
    }

    /// The authenticated principal, if any.
    #[inline]
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        self.connect()
            .auth
            .as_ref()
            .and_then(|auth| auth.credentials.as_ref())
            .map(|credentials| credentials.authid.as_str())
    }

    /// Record a successful SASL exchange. Legal at any stage: XCLIENT may
    /// assert a login outside the hello phase.
    #[inline]
    pub fn set_credentials(&mut self, credentials: Credentials) {
        let connect = self.connect_mut();
        let auth = connect.auth.get_or_insert_with(AuthProperties::default);
        auth.authenticated = true;
        auth.credentials = Some(credentials);
    }

    /// Record a failed or cancelled SASL exchange.
    #[inline]
    pub fn count_auth_failure(&mut self) {
        let auth = self
            .connect_mut()
            .auth
            .get_or_insert_with(AuthProperties::default);
        auth.failure_count += 1;
    }

    /// Drop the authenticated principal (XCLIENT `LOGIN=[UNAVAILABLE]`).
    #[inline]
    pub fn clear_credentials(&mut self) {
        if let Some(auth) = &mut self.connect_mut().auth {
            auth.authenticated = false;
            auth.credentials = None;
        }
    }

    /// Record the negotiated TLS parameters and fall back to the connect
    /// stage: RFC 3207 requires the hello state to be discarded.
    ///
    /// # Errors
    ///
    /// * a transaction is open (STARTTLS is refused there by the engine)
    #[inline]
    pub fn to_secured(&mut self, tls: TlsProperties) -> Result<(), Error> {
        match self {
            Self::Connect { connect } | Self::Helo { connect, .. } => {
                connect.tls = Some(tls);
                *self = Self::Connect {
                    connect: connect.clone(),
                };
                Ok(())
            }
            Self::MailFrom { .. } | Self::RcptTo { .. } | Self::Finished(_) => {
                Err(Error::Conversion {})
            }
        }
    }

    /// Record a HELO/EHLO, entering (or re-entering) the hello stage.
    ///
    /// # Errors
    ///
    /// * a transaction is open
    #[inline]
    pub fn to_helo(&mut self, client_name: ClientName, using_deprecated: bool) -> Result<(), Error> {
        match self {
            Self::Connect { connect } => {
                *self = Self::Helo {
                    connect: connect.clone(),
                    helo: HeloProperties {
                        client_name,
                        using_deprecated,
                    },
                };
                Ok(())
            }
            Self::Helo { helo, .. } => {
                helo.client_name = client_name;
                helo.using_deprecated = using_deprecated;
                Ok(())
            }
            Self::MailFrom { .. } | Self::RcptTo { .. } | Self::Finished(_) => {
                Err(Error::Conversion {})
            }
        }
    }

    /// Open a mail transaction.
    ///
    /// # Errors
    ///
    /// * not in the hello stage
    #[inline]
    pub fn to_mail_from(
        &mut self,
        envelope: MailFromEnvelope,
        timestamp: time::OffsetDateTime,
    ) -> Result<(), Error> {
        match self {
            Self::Helo { connect, helo } => {
                *self = Self::MailFrom {
                    connect: connect.clone(),
                    helo: helo.clone(),
                    mail_from: MailFromProperties {
                        reverse_path: envelope.reverse_path,
                        mail_timestamp: timestamp,
                        message_uuid: uuid::Uuid::new_v4(),
                        utf8: envelope.utf8,
                        body_type: envelope.body_type,
                        size_hint: envelope.size_hint,
                        envelope_id: envelope.envelope_id,
                        dsn_return: envelope.dsn_return,
                        requirements: envelope.requirements,
                    },
                };
                Ok(())
            }
            Self::Connect { .. } | Self::MailFrom { .. } | Self::RcptTo { .. } | Self::Finished(_) => {
                Err(Error::Conversion {})
            }
        }
    }

    /// Append a recipient, entering the rcpt stage on the first one.
    ///
    /// # Errors
    ///
    /// * no transaction is open
    #[inline]
    pub fn add_forward_path(&mut self, recipient: Recipient) -> Result<(), Error> {
        match self {
            Self::MailFrom {
                connect,
                helo,
                mail_from,
            } => {
                *self = Self::RcptTo {
                    connect: connect.clone(),
                    helo: helo.clone(),
                    mail_from: mail_from.clone(),
                    rcpt_to: RcptToProperties {
                        forward_paths: vec![recipient],
                    },
                };
                Ok(())
            }
            Self::RcptTo { rcpt_to, .. } => {
                rcpt_to.forward_paths.push(recipient);
                Ok(())
            }
            Self::Connect { .. } | Self::Helo { .. } | Self::Finished(_) => Err(Error::Conversion {}),
        }
    }

    /// Close the envelope once the message content has been received.
    ///
    /// # Errors
    ///
    /// * not in the rcpt stage
    #[inline]
    pub fn to_finished(&mut self, delivered_bytes: u64) -> Result<(), Error> {
        match self {
            Self::RcptTo {
                connect,
                helo,
                mail_from,
                rcpt_to,
            } => {
                *self = Self::Finished(ContextFinished {
                    connect: connect.clone(),
                    helo: helo.clone(),
                    mail_from: mail_from.clone(),
                    rcpt_to: rcpt_to.clone(),
                    finished: FinishedProperties { delivered_bytes },
                });
                Ok(())
            }
            Self::Connect { .. } | Self::Helo { .. } | Self::MailFrom { .. } | Self::Finished(_) => {
                Err(Error::Conversion {})
            }
        }
    }

    /// Transactional reset: drop the open transaction (sender, recipients,
    /// DSN parameters, delivery requirements, SMTPUTF8, body type) and fall
    /// back to the hello stage. Connection and hello properties, including
    /// the authenticated principal, are preserved. A reset before any hello
    /// is a no-op.
    #[inline]
    pub fn reset(&mut self) {
        match self {
            Self::Connect { .. } => (),
            Self::Helo { .. } => (),
            Self::MailFrom { connect, helo, .. }
            | Self::RcptTo { connect, helo, .. }
            | Self::Finished(ContextFinished { connect, helo, .. }) => {
                *self = Self::Helo {
                    connect: connect.clone(),
                    helo: helo.clone(),
                };
            }
        }
    }

    /// Name the client presented with HELO/EHLO.
    ///
    /// # Errors
    ///
    /// * no hello has been accepted yet
    #[inline]
    pub fn client_name(&self) -> Result<&ClientName, Error> {
        match self {
            Self::Connect { .. } => {
                Err(FieldAccessError::new("client_name", after!(Helo)).into())
            }
            Self::Helo { helo, .. }
            | Self::MailFrom { helo, .. }
            | Self::RcptTo { helo, .. }
            | Self::Finished(ContextFinished { helo, .. }) => Ok(&helo.client_name),
        }
    }

    /// Sender of the open transaction (`None` is the bounce sender).
    ///
    /// # Errors
    ///
    /// * no transaction is open
    #[inline]
    pub fn reverse_path(&self) -> Result<&Option<Address>, Error> {
        match self {
            Self::Connect { .. } | Self::Helo { .. } => {
                Err(FieldAccessError::new("reverse_path", after!(MailFrom)).into())
            }
            Self::MailFrom { mail_from, .. }
            | Self::RcptTo { mail_from, .. }
            | Self::Finished(ContextFinished { mail_from, .. }) => Ok(&mail_from.reverse_path),
        }
    }

    /// Is SMTPUTF8 active for the open transaction? `false` outside one.
    #[inline]
    #[must_use]
    pub const fn is_utf8_advertised(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Helo { .. } => false,
            Self::MailFrom { mail_from, .. }
            | Self::RcptTo { mail_from, .. }
            | Self::Finished(ContextFinished { mail_from, .. }) => mail_from.utf8,
        }
    }

    /// Body type of the open transaction; the 7BIT default outside one.
    #[inline]
    #[must_use]
    pub const fn body_type(&self) -> BodyType {
        match self {
            Self::Connect { .. } | Self::Helo { .. } => BodyType::SevenBit,
            Self::MailFrom { mail_from, .. }
            | Self::RcptTo { mail_from, .. }
            | Self::Finished(ContextFinished { mail_from, .. }) => mail_from.body_type,
        }
    }

    /// Number of recipients accepted so far in the open transaction.
    #[inline]
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        match self {
            Self::Connect { .. } | Self::Helo { .. } | Self::MailFrom { .. } => 0,
            Self::RcptTo { rcpt_to, .. }
            | Self::Finished(ContextFinished { rcpt_to, .. }) => rcpt_to.forward_paths.len(),
        }
    }

    /// Recipients accepted so far.
    ///
    /// # Errors
    ///
    /// * no recipient has been accepted yet
    #[inline]
    pub fn forward_paths(&self) -> Result<&Vec<Recipient>, Error> {
        match self {
            Self::Connect { .. } | Self::Helo { .. } | Self::MailFrom { .. } => {
                Err(FieldAccessError::new("forward_paths", after!(RcptTo)).into())
            }
            Self::RcptTo { rcpt_to, .. }
            | Self::Finished(ContextFinished { rcpt_to, .. }) => Ok(&rcpt_to.forward_paths),
        }
    }

    /// Convert the instance into a [`ContextFinished`].
    ///
    /// # Errors
    ///
    /// * the message has not been completed
    #[inline]
    pub fn unwrap_finished(self) -> Result<ContextFinished, Error> {
        match self {
            Self::Finished(finished) => Ok(finished),
            Self::Connect { .. } | Self::Helo { .. } | Self::MailFrom { .. } | Self::RcptTo { .. } => {
                Err(Error::Conversion {})
            }
        }
    }
}
