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

use crate::{ConnectionKind, Error, ParseArgsError};
use maillon_common::{
    auth::Mechanism, Address, BodyType, ClientName, DeliverBy, DeliverByMode, DsnReturn, Domain,
    NotifyOn, OriginalRecipient,
};

macro_rules! strip_suffix_crlf {
    ($v:expr) => {
        $v.0.strip_suffix(b"\r\n")
            .ok_or(ParseArgsError::InvalidArgs)?
    };
}

fn strip_quote(input: &[u8]) -> Result<&[u8], ParseArgsError> {
    input
        .strip_prefix(b"<")
        .ok_or(ParseArgsError::InvalidArgs)?
        .strip_suffix(b">")
        .ok_or(ParseArgsError::InvalidArgs)
}

fn split_args(slice: &[u8]) -> Option<(&[u8], &[u8])> {
    slice.iter().position(|c| *c == b'=').map(|pos| {
        let (k, v) = slice.split_at(pos);
        (k, &v[1..])
    })
}

/// Decode RFC 3461 xtext: `+HH` stands for the byte with hex value `HH`,
/// every other byte stands for itself.
pub(crate) fn decode_xtext(input: &[u8]) -> Result<String, ParseArgsError> {
    let mut out = Vec::with_capacity(input.len());
    let mut bytes = input.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte == b'+' {
            let hex = [
                bytes.next().ok_or(ParseArgsError::BadXtext)?,
                bytes.next().ok_or(ParseArgsError::BadXtext)?,
            ];
            let hex = std::str::from_utf8(&hex).map_err(|_e| ParseArgsError::BadXtext)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_e| ParseArgsError::BadXtext)?);
        } else {
            out.push(byte);
        }
    }
    Ok(String::from_utf8(out)?)
}

/// Buffer received from the client, CRLF included.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct UnparsedArgs(pub Vec<u8>);

/// A framed command: the recognized verb and its raw argument bytes.
pub type Command<Verb, Args> = (Verb, Args);

/// One TCP window worth of framed commands.
pub type Batch = Vec<Result<Command<Verb, UnparsedArgs>, Error>>;

/// Information known when the TCP/IP connection is accepted.
#[non_exhaustive]
pub struct AcceptArgs {
    /// Peer address of the connection.
    pub client_addr: std::net::SocketAddr,
    /// Address of the server which accepted the connection.
    pub server_addr: std::net::SocketAddr,
    /// Instant when the connection was accepted.
    pub timestamp: time::OffsetDateTime,
    /// Universal unique identifier of the connection.
    pub uuid: uuid::Uuid,
    /// Kind of connection.
    pub kind: ConnectionKind,
}

impl AcceptArgs {
    /// Create a new instance.
    #[inline]
    #[must_use]
    pub const fn new(
        client_addr: std::net::SocketAddr,
        server_addr: std::net::SocketAddr,
        timestamp: time::OffsetDateTime,
        uuid: uuid::Uuid,
        kind: ConnectionKind,
    ) -> Self {
        Self {
            client_addr,
            server_addr,
            timestamp,
            uuid,
            kind,
        }
    }
}

/// Argument of the historical HELO command.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct HeloArgs {
    /// Name of the client.
    pub client_name: Domain,
}

impl TryFrom<UnparsedArgs> for HeloArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);
        if !value.is_ascii() {
            return Err(ParseArgsError::NotAscii);
        }
        let value = std::str::from_utf8(value)?;

        Ok(Self {
            client_name: value
                .parse()
                .map_err(|_err| ParseArgsError::InvalidArgs)?,
        })
    }
}

/// Argument of the EHLO command.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct EhloArgs {
    /// Name of the client, possibly an address literal.
    pub client_name: ClientName,
}

impl TryFrom<UnparsedArgs> for EhloArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);
        if !value.is_ascii() {
            return Err(ParseArgsError::NotAscii);
        }
        let value = std::str::from_utf8(value)?;

        Ok(Self {
            client_name: value
                .parse()
                .map_err(|_err| ParseArgsError::InvalidArgs)?,
        })
    }
}

/// Arguments of the AUTH command.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct AuthArgs {
    /// Authentication mechanism.
    pub mechanism: Mechanism,
    /// Initial client response, still base64-encoded. `Some(vec![])` is the
    /// explicit empty response `=`.
    pub initial_response: Option<Vec<u8>>,
}

impl TryFrom<UnparsedArgs> for AuthArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);
        if !value.is_ascii() {
            return Err(ParseArgsError::NotAscii);
        }

        let (mechanism, initial_response) = match value.iter().position(u8::is_ascii_whitespace) {
            Some(idx) => {
                let (mechanism, rest) = value.split_at(idx);
                let response = rest.get(1..).ok_or(ParseArgsError::InvalidArgs)?;
                (
                    mechanism,
                    Some(if response == b"=" {
                        vec![]
                    } else {
                        response.to_vec()
                    }),
                )
            }
            None => (value, None),
        };

        let mechanism = std::str::from_utf8(mechanism)?
            .parse()
            .map_err(|_err| ParseArgsError::InvalidArgs)?;

        Ok(Self {
            mechanism,
            initial_response,
        })
    }
}

/// Arguments of the MAIL FROM command: the reverse path and every
/// extension parameter of spec interest.
#[non_exhaustive]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MailFromArgs {
    /// Sender address; `None` is the empty bounce sender `<>`.
    pub reverse_path: Option<Address>,
    /// `BODY` (RFC 6152, RFC 3030).
    pub body_type: Option<BodyType>,
    /// `SIZE` (RFC 1870).
    pub size: Option<u64>,
    /// `SMTPUTF8` (RFC 6531).
    pub use_smtputf8: bool,
    /// `ENVID` (RFC 3461), xtext-decoded.
    pub envelope_id: Option<String>,
    /// `RET` (RFC 3461).
    pub ret: Option<DsnReturn>,
    /// `REQUIRETLS` (RFC 8689).
    pub require_tls: bool,
    /// `MT-PRIORITY` (RFC 6710).
    pub priority: Option<i8>,
    /// `HOLDFOR` seconds (RFC 4865).
    pub hold_for: Option<u64>,
    /// `HOLDUNTIL` instant (RFC 4865).
    pub hold_until: Option<time::OffsetDateTime>,
    /// `BY` (RFC 2852).
    pub deliver_by: Option<DeliverBy>,
    /// At least one extension parameter was present (they are all
    /// ESMTP-gated).
    pub has_extension_parameters: bool,
}

fn duplicate<T>(slot: &Option<T>, key: &'static str) -> Result<(), ParseArgsError> {
    if slot.is_some() {
        Err(ParseArgsError::DuplicatedParameter { key })
    } else {
        Ok(())
    }
}

impl MailFromArgs {
    #[allow(clippy::too_many_lines)]
    fn parse_parameter(&mut self, raw_arg: &[u8]) -> Result<(), ParseArgsError> {
        match split_args(raw_arg) {
            Some((key, value)) if key.eq_ignore_ascii_case(b"BODY") => {
                duplicate(&self.body_type, "BODY")?;
                self.body_type = Some(
                    <BodyType as strum::VariantNames>::VARIANTS
                        .iter()
                        .find(|i| value.eq_ignore_ascii_case(i.as_bytes()))
                        .ok_or(ParseArgsError::BadParameterValue { key: "BODY" })?
                        .parse()
                        .map_err(|_e| ParseArgsError::BadParameterValue { key: "BODY" })?,
                );
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"SIZE") => {
                duplicate(&self.size, "SIZE")?;
                self.size = Some(
                    std::str::from_utf8(value)?
                        .parse()
                        .map_err(|_e| ParseArgsError::BadParameterValue { key: "SIZE" })?,
                );
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"RET") => {
                duplicate(&self.ret, "RET")?;
                self.ret = match value {
                    value if value.eq_ignore_ascii_case(b"FULL") => Some(DsnReturn::Full),
                    value if value.eq_ignore_ascii_case(b"HDRS") => Some(DsnReturn::Headers),
                    _ => return Err(ParseArgsError::BadParameterValue { key: "RET" }),
                };
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"ENVID") => {
                duplicate(&self.envelope_id, "ENVID")?;
                if value.is_empty() {
                    return Err(ParseArgsError::BadParameterValue { key: "ENVID" });
                }
                self.envelope_id = Some(decode_xtext(value)?);
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"MT-PRIORITY") => {
                duplicate(&self.priority, "MT-PRIORITY")?;
                let priority: i8 = std::str::from_utf8(value)?
                    .parse()
                    .map_err(|_e| ParseArgsError::BadParameterValue { key: "MT-PRIORITY" })?;
                if !(-9..=9).contains(&priority) {
                    return Err(ParseArgsError::BadParameterValue { key: "MT-PRIORITY" });
                }
                self.priority = Some(priority);
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"HOLDFOR") => {
                if self.hold_for.is_some() || self.hold_until.is_some() {
                    return Err(ParseArgsError::DuplicatedParameter { key: "HOLDFOR" });
                }
                self.hold_for = Some(
                    std::str::from_utf8(value)?
                        .parse()
                        .map_err(|_e| ParseArgsError::BadParameterValue { key: "HOLDFOR" })?,
                );
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"HOLDUNTIL") => {
                if self.hold_for.is_some() || self.hold_until.is_some() {
                    return Err(ParseArgsError::DuplicatedParameter { key: "HOLDUNTIL" });
                }
                self.hold_until = Some(
                    time::OffsetDateTime::parse(
                        std::str::from_utf8(value)?,
                        &time::format_description::well_known::Iso8601::DEFAULT,
                    )
                    .map_err(|_e| ParseArgsError::BadParameterValue { key: "HOLDUNTIL" })?,
                );
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"BY") => {
                duplicate(&self.deliver_by, "BY")?;
                let value = std::str::from_utf8(value)?;
                let (seconds, mode) = match value.split_once(';') {
                    Some((seconds, mode)) if mode.eq_ignore_ascii_case("R") => {
                        (seconds, DeliverByMode::Return)
                    }
                    Some((seconds, mode)) if mode.eq_ignore_ascii_case("N") => {
                        (seconds, DeliverByMode::Notify)
                    }
                    Some(_) => return Err(ParseArgsError::BadParameterValue { key: "BY" }),
                    None => (value, DeliverByMode::Notify),
                };
                let seconds: u64 = seconds
                    .parse()
                    .map_err(|_e| ParseArgsError::BadParameterValue { key: "BY" })?;
                if seconds == 0 {
                    return Err(ParseArgsError::BadParameterValue { key: "BY" });
                }
                self.deliver_by = Some(DeliverBy { seconds, mode });
                Ok(())
            }
            _ => Err(ParseArgsError::InvalidArgs),
        }
    }

    fn parse_option(&mut self, raw_arg: &[u8]) -> Result<(), ParseArgsError> {
        match raw_arg {
            arg if arg.eq_ignore_ascii_case(b"SMTPUTF8") => {
                self.use_smtputf8 = true;
                Ok(())
            }
            arg if arg.eq_ignore_ascii_case(b"REQUIRETLS") => {
                self.require_tls = true;
                Ok(())
            }
            _ => Err(ParseArgsError::InvalidArgs),
        }
    }
}

impl TryFrom<UnparsedArgs> for MailFromArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);

        let mut args = value
            .split(u8::is_ascii_whitespace)
            .filter(|s| !s.is_empty());

        let mailbox = strip_quote(args.next().ok_or(ParseArgsError::InvalidArgs)?)?;
        let mailbox = if mailbox.is_empty() {
            None
        } else {
            Some(String::from_utf8(mailbox.to_vec())?)
        };

        let mut result = Self::default();
        for arg in args {
            result.has_extension_parameters = true;
            if arg.contains(&b'=') {
                result.parse_parameter(arg)?;
            } else {
                result.parse_option(arg)?;
            }
        }

        if !result.use_smtputf8 && !value.is_ascii() {
            return Err(ParseArgsError::SmtpUtf8Required);
        }

        result.reverse_path = match mailbox {
            Some(mailbox) => match mailbox.parse::<Address>() {
                Ok(mailbox) => Some(mailbox),
                Err(_error) => return Err(ParseArgsError::InvalidMailAddress { mail: mailbox }),
            },
            None => None,
        };
        Ok(result)
    }
}

/// Arguments of the RCPT TO command.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct RcptToArgs {
    /// Recipient address.
    pub forward_path: Address,
    /// `ORCPT` (RFC 3461).
    pub original_forward_path: Option<OriginalRecipient>,
    /// `NOTIFY` (RFC 3461).
    pub notify_on: NotifyOn,
    /// At least one extension parameter was present.
    pub has_extension_parameters: bool,
}

impl RcptToArgs {
    fn parse_parameter(&mut self, raw_arg: &[u8]) -> Result<(), ParseArgsError> {
        match split_args(raw_arg) {
            Some((key, value)) if key.eq_ignore_ascii_case(b"ORCPT") => {
                duplicate(&self.original_forward_path, "ORCPT")?;
                let semicolon = memchr::memchr(b';', value)
                    .ok_or(ParseArgsError::BadParameterValue { key: "ORCPT" })?;
                let (addr_type, addr) = (&value[..semicolon], &value[semicolon + 1..]);
                if addr_type.is_empty() || addr.is_empty() {
                    return Err(ParseArgsError::BadParameterValue { key: "ORCPT" });
                }

                let mailbox = decode_xtext(addr)?;
                self.original_forward_path = match mailbox.parse::<Address>() {
                    Ok(parsed) => Some(OriginalRecipient {
                        addr_type: std::str::from_utf8(addr_type)?.to_owned(),
                        mailbox: parsed,
                    }),
                    Err(_error) => {
                        return Err(ParseArgsError::InvalidMailAddress { mail: mailbox })
                    }
                };
                Ok(())
            }
            Some((key, value)) if key.eq_ignore_ascii_case(b"NOTIFY") => {
                let mut notify: Option<NotifyOn> = None;
                for item in value.split(|c| *c == b',') {
                    // NEVER is exclusive with every other keyword.
                    if item.eq_ignore_ascii_case(b"NEVER") {
                        if notify.is_some() {
                            return Err(ParseArgsError::BadParameterValue { key: "NOTIFY" });
                        }
                        notify = Some(NotifyOn::Never);
                        continue;
                    }
                    let (mut success, mut failure, mut delay) = match notify {
                        Some(NotifyOn::Never) => {
                            return Err(ParseArgsError::BadParameterValue { key: "NOTIFY" })
                        }
                        Some(NotifyOn::Some {
                            success,
                            failure,
                            delay,
                        }) => (success, failure, delay),
                        None => (false, false, false),
                    };
                    match item {
                        item if item.eq_ignore_ascii_case(b"SUCCESS") => success = true,
                        item if item.eq_ignore_ascii_case(b"FAILURE") => failure = true,
                        item if item.eq_ignore_ascii_case(b"DELAY") => delay = true,
                        _ => return Err(ParseArgsError::BadParameterValue { key: "NOTIFY" }),
                    }
                    notify = Some(NotifyOn::Some {
                        success,
                        failure,
                        delay,
                    });
                }
                self.notify_on =
                    notify.ok_or(ParseArgsError::BadParameterValue { key: "NOTIFY" })?;
                Ok(())
            }
            _ => Err(ParseArgsError::InvalidArgs),
        }
    }
}

impl TryFrom<UnparsedArgs> for RcptToArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);

        let mut args = value
            .split(u8::is_ascii_whitespace)
            .filter(|s| !s.is_empty());

        let mailbox = strip_quote(args.next().ok_or(ParseArgsError::InvalidArgs)?)?;
        if mailbox.is_empty() {
            return Err(ParseArgsError::InvalidArgs);
        }
        let mailbox = String::from_utf8(mailbox.to_vec())?;

        let mut result = Self {
            forward_path: mailbox
                .parse()
                .map_err(|_error| ParseArgsError::InvalidMailAddress { mail: mailbox })?,
            original_forward_path: None,
            notify_on: NotifyOn::default(),
            has_extension_parameters: false,
        };

        for arg in args {
            result.has_extension_parameters = true;
            if arg.contains(&b'=') {
                result.parse_parameter(arg)?;
            } else {
                return Err(ParseArgsError::InvalidArgs);
            }
        }

        Ok(result)
    }
}

/// Arguments of a BDAT chunk command (RFC 3030).
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct BdatArgs {
    /// Exact number of content bytes following the command line.
    pub size: u64,
    /// This chunk completes the message.
    pub last: bool,
}

impl TryFrom<UnparsedArgs> for BdatArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);
        if !value.is_ascii() {
            return Err(ParseArgsError::NotAscii);
        }

        let mut args = value
            .split(u8::is_ascii_whitespace)
            .filter(|s| !s.is_empty());

        let size = std::str::from_utf8(args.next().ok_or(ParseArgsError::InvalidArgs)?)?
            .parse()
            .map_err(|_e| ParseArgsError::BadParameterValue { key: "BDAT" })?;

        let last = match args.next() {
            Some(last) if last.eq_ignore_ascii_case(b"LAST") => true,
            Some(_) => return Err(ParseArgsError::InvalidArgs),
            None => false,
        };
        if args.next().is_some() {
            return Err(ParseArgsError::InvalidArgs);
        }

        Ok(Self { size, last })
    }
}

/// The `PROTO` attribute of XCLIENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(ascii_case_insensitive)]
pub enum XclientProto {
    /// Plain SMTP: the proxied client said HELO.
    #[strum(serialize = "SMTP")]
    Smtp,
    /// Extended SMTP: the proxied client said EHLO.
    #[strum(serialize = "ESMTP")]
    Esmtp,
}

/// One `ATTR=VALUE` pair of an XCLIENT command; `None` values are the
/// `[UNAVAILABLE]` / `[TEMPUNAVAIL]` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XclientAttribute {
    /// Client hostname from the proxy's reverse lookup.
    Name(Option<String>),
    /// True client address.
    Addr(Option<std::net::IpAddr>),
    /// True client port.
    Port(Option<u16>),
    /// Protocol the proxied client used.
    Proto(Option<XclientProto>),
    /// Hello name the proxied client presented.
    Helo(Option<String>),
    /// SASL login asserted by the proxy; `None` clears authentication.
    Login(Option<String>),
    /// Address the proxied client connected to.
    DestAddr(Option<std::net::IpAddr>),
    /// Port the proxied client connected to.
    DestPort(Option<u16>),
}

/// Arguments of the Postfix XCLIENT command, in wire order.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub struct XclientArgs {
    /// Attribute overrides to apply.
    pub attributes: Vec<XclientAttribute>,
}

fn xclient_value(value: &[u8]) -> Result<Option<&str>, ParseArgsError> {
    if value.eq_ignore_ascii_case(b"[UNAVAILABLE]") || value.eq_ignore_ascii_case(b"[TEMPUNAVAIL]")
    {
        return Ok(None);
    }
    Ok(Some(std::str::from_utf8(value)?))
}

fn xclient_addr(value: &str) -> Result<std::net::IpAddr, ParseArgsError> {
    match value.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("IPV6:") => {
            Ok(std::net::IpAddr::V6(value[5..].parse()?))
        }
        _ => Ok(value.parse()?),
    }
}

impl TryFrom<UnparsedArgs> for XclientArgs {
    type Error = ParseArgsError;

    #[inline]
    fn try_from(value: UnparsedArgs) -> Result<Self, Self::Error> {
        let value = strip_suffix_crlf!(value);
        if !value.is_ascii() {
            return Err(ParseArgsError::NotAscii);
        }

        let mut attributes = vec![];
        for arg in value
            .split(u8::is_ascii_whitespace)
            .filter(|s| !s.is_empty())
        {
            let (key, value) = split_args(arg).ok_or(ParseArgsError::InvalidArgs)?;
            let value = xclient_value(value)?;
            attributes.push(match key {
                key if key.eq_ignore_ascii_case(b"NAME") => {
                    XclientAttribute::Name(value.map(str::to_owned))
                }
                key if key.eq_ignore_ascii_case(b"ADDR") => {
                    XclientAttribute::Addr(value.map(xclient_addr).transpose()?)
                }
                key if key.eq_ignore_ascii_case(b"PORT") => XclientAttribute::Port(
                    value
                        .map(|v| {
                            v.parse()
                                .map_err(|_e| ParseArgsError::BadParameterValue { key: "PORT" })
                        })
                        .transpose()?,
                ),
                key if key.eq_ignore_ascii_case(b"PROTO") => XclientAttribute::Proto(
                    value
                        .map(|v| {
                            v.parse()
                                .map_err(|_e| ParseArgsError::BadParameterValue { key: "PROTO" })
                        })
                        .transpose()?,
                ),
                key if key.eq_ignore_ascii_case(b"HELO") => {
                    XclientAttribute::Helo(value.map(str::to_owned))
                }
                key if key.eq_ignore_ascii_case(b"LOGIN") => {
                    XclientAttribute::Login(value.map(str::to_owned))
                }
                key if key.eq_ignore_ascii_case(b"DESTADDR") => {
                    XclientAttribute::DestAddr(value.map(xclient_addr).transpose()?)
                }
                key if key.eq_ignore_ascii_case(b"DESTPORT") => XclientAttribute::DestPort(
                    value
                        .map(|v| {
                            v.parse()
                                .map_err(|_e| ParseArgsError::BadParameterValue { key: "DESTPORT" })
                        })
                        .transpose()?,
                ),
                _ => return Err(ParseArgsError::InvalidArgs),
            });
        }

        if attributes.is_empty() {
            return Err(ParseArgsError::InvalidArgs);
        }
        Ok(Self { attributes })
    }
}

/// SMTP command verbs. The serialized form is the wire prefix that selects
/// the verb, so matching a variant also splits off its arguments.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::EnumVariantNames,
)]
#[non_exhaustive]
pub enum Verb {
    /// Identify the SMTP client to the SMTP server. (historical)
    #[strum(serialize = "HELO ")]
    Helo,
    /// Identify the SMTP client and request the extended reply.
    #[strum(serialize = "EHLO ")]
    Ehlo,
    /// Open a mail transaction.
    #[strum(serialize = "MAIL FROM:")]
    MailFrom,
    /// Add one recipient to the open transaction.
    #[strum(serialize = "RCPT TO:")]
    RcptTo,
    /// Start line-oriented message content, ended by `<CRLF>.<CRLF>`.
    #[strum(serialize = "DATA\r\n")]
    Data,
    /// Transfer one exactly-counted chunk of message content (RFC 3030).
    #[strum(serialize = "BDAT ")]
    Bdat,
    /// Close the transmission channel after a `221` reply.
    #[strum(serialize = "QUIT\r\n")]
    Quit,
    /// Abort the current mail transaction, clearing all its state.
    #[strum(serialize = "RSET\r\n")]
    Rset,
    /// Ask the server for helpful information.
    #[strum(serialize = "HELP")]
    Help,
    /// No-op, parameters ignored.
    #[strum(serialize = "NOOP")]
    Noop,
    /// Verify a mailbox (RFC 5321 §3.5).
    #[strum(serialize = "VRFY ")]
    Vrfy,
    /// Expand a mailing list (RFC 5321 §3.5).
    #[strum(serialize = "EXPN ")]
    Expn,
    /// Opportunistic TLS upgrade (RFC 3207).
    #[strum(serialize = "STARTTLS\r\n")]
    StartTls,
    /// SASL authentication (RFC 4954).
    #[strum(serialize = "AUTH ")]
    Auth,
    /// Postfix trust-delegation attribute override.
    #[strum(serialize = "XCLIENT ")]
    Xclient,
    /// Any other buffer received while expecting a command.
    Unknown,
}

impl Verb {
    /// May the reply to this verb be withheld until the end of the command
    /// window (RFC 2920 §3.1)?
    #[inline]
    #[must_use]
    pub const fn is_bufferable(self) -> bool {
        !matches!(
            self,
            Self::Ehlo | Self::Data | Self::Bdat | Self::Quit | Self::StartTls | Self::Auth
        )
    }

    /// Does this verb switch the connection out of command framing (so the
    /// bytes after its CRLF are not command lines)?
    #[inline]
    #[must_use]
    pub const fn ends_batch(self) -> bool {
        matches!(
            self,
            Self::Data | Self::Bdat | Self::StartTls | Self::Auth | Self::Quit
        )
    }
}
