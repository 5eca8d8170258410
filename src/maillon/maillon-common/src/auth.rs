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

/// SASL mechanisms named by RFC 4954 `AUTH` commands.
///
/// Every name parses; only the mechanisms with a complete server-side
/// verifier are [supported](Mechanism::is_supported), the rest are refused
/// with `504 5.5.4`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Mechanism {
    /// RFC 4616. Single response carrying `authzid \0 authcid \0 password`.
    #[strum(serialize = "PLAIN")]
    Plain,
    /// Non-standard but ubiquitous two-prompt exchange.
    #[strum(serialize = "LOGIN")]
    Login,
    /// RFC 2195 keyed-digest challenge-response.
    #[strum(serialize = "CRAM-MD5")]
    CramMd5,
    /// RFC 5802 / RFC 7677 salted challenge-response.
    #[strum(serialize = "SCRAM-SHA-256")]
    ScramSha256,
    /// RFC 4505.
    #[strum(serialize = "ANONYMOUS")]
    Anonymous,
    /// RFC 4422 appendix A (TLS client certificates).
    #[strum(serialize = "EXTERNAL")]
    External,
    /// RFC 2831, obsoleted.
    #[strum(serialize = "DIGEST-MD5")]
    DigestMd5,
    /// OAuth 2.0 bearer token exchanges.
    #[strum(serialize = "XOAUTH2")]
    XOAuth2,
}

impl Mechanism {
    /// Mechanisms transmitting reusable secrets must not run on a cleartext
    /// channel (RFC 4954 §4); they are neither advertised nor accepted
    /// before TLS.
    #[inline]
    #[must_use]
    pub const fn must_be_under_tls(self) -> bool {
        matches!(self, Self::Plain | Self::Login | Self::XOAuth2)
    }

    /// Does the engine carry a complete verifier for this mechanism?
    #[inline]
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Plain | Self::Login | Self::CramMd5 | Self::ScramSha256
        )
    }

    /// Does the server emit the first challenge of the exchange?
    #[inline]
    #[must_use]
    pub const fn server_first(self) -> bool {
        matches!(self, Self::CramMd5)
    }
}

/// The outcome of a successful SASL exchange, kept for the lifetime of the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    /// The authorisation identity established by the mechanism.
    pub authid: String,
    /// The mechanism that produced it.
    pub mechanism: Mechanism,
}
