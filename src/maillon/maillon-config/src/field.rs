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

use maillon_common::Domain;

/// Error escalation thresholds, `-1` disables a threshold.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSmtpError {
    /// After this many erroneous commands the handler may decorate replies
    /// with a warning.
    #[serde(default = "FieldSmtpError::default_soft_count")]
    pub soft_count: i64,
    /// After this many erroneous commands the connection is dropped.
    #[serde(default = "FieldSmtpError::default_hard_count")]
    pub hard_count: i64,
}

impl FieldSmtpError {
    const fn default_soft_count() -> i64 {
        10
    }

    const fn default_hard_count() -> i64 {
        20
    }
}

impl Default for FieldSmtpError {
    fn default() -> Self {
        Self {
            soft_count: Self::default_soft_count(),
            hard_count: Self::default_hard_count(),
        }
    }
}

/// Timeouts applied by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTimeouts {
    /// Inactivity limit while waiting for a command or content.
    #[serde(default = "FieldTimeouts::default_command", with = "humantime_serde")]
    pub command: std::time::Duration,
    /// Limit on the TLS handshake after STARTTLS.
    #[serde(default = "FieldTimeouts::default_tls_handshake", with = "humantime_serde")]
    pub tls_handshake: std::time::Duration,
}

impl FieldTimeouts {
    const fn default_command() -> std::time::Duration {
        std::time::Duration::from_secs(30)
    }

    const fn default_tls_handshake() -> std::time::Duration {
        std::time::Duration::from_secs(2)
    }
}

impl Default for FieldTimeouts {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            tls_handshake: Self::default_tls_handshake(),
        }
    }
}

/// Values advertised for the ESMTP extensions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldEsmtp {
    /// Reply to pipelined command windows in one write (RFC 2920).
    #[serde(default = "FieldEsmtp::default_pipelining")]
    pub pipelining: bool,
    /// Maximum `HOLDFOR` interval, also advertised by FUTURERELEASE
    /// (RFC 4865).
    #[serde(
        default = "FieldEsmtp::default_future_release_interval_max",
        with = "humantime_serde"
    )]
    pub future_release_interval_max: std::time::Duration,
    /// Latest `HOLDUNTIL` instant advertised by FUTURERELEASE.
    #[serde(
        default = "FieldEsmtp::default_future_release_date_max",
        with = "time::serde::iso8601"
    )]
    pub future_release_date_max: time::OffsetDateTime,
    /// Maximum `BY` interval advertised by DELIVERBY (RFC 2852).
    #[serde(default = "FieldEsmtp::default_deliver_by_max", with = "humantime_serde")]
    pub deliver_by_max: std::time::Duration,
}

impl FieldEsmtp {
    const fn default_pipelining() -> bool {
        true
    }

    const fn default_future_release_interval_max() -> std::time::Duration {
        std::time::Duration::from_secs(604_800)
    }

    const fn default_future_release_date_max() -> time::OffsetDateTime {
        time::macros::datetime!(2012-01-01 00:00:00 UTC)
    }

    const fn default_deliver_by_max() -> std::time::Duration {
        std::time::Duration::from_secs(604_800)
    }
}

impl Default for FieldEsmtp {
    fn default() -> Self {
        Self {
            pipelining: Self::default_pipelining(),
            future_release_interval_max: Self::default_future_release_interval_max(),
            future_release_date_max: Self::default_future_release_date_max(),
            deliver_by_max: Self::default_deliver_by_max(),
        }
    }
}

/// Receiver configuration, read-only for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name presented in the banner and the EHLO reply.
    pub name: Domain,
    /// Upper bound on message content, advertised by SIZE (RFC 1870).
    #[serde(default = "Config::default_message_size_limit")]
    pub message_size_limit: u64,
    /// Upper bound on recipients per transaction, advertised by LIMITS
    /// `RCPTMAX` (RFC 9422).
    #[serde(default = "Config::default_recipient_count_max")]
    pub recipient_count_max: usize,
    /// Upper bound on MAIL transactions per session, advertised by LIMITS
    /// `MAILMAX`; `0` disables the limit.
    #[serde(default)]
    pub transaction_count_max: usize,
    /// Refuse MAIL FROM until the client has authenticated.
    #[serde(default)]
    pub require_auth: bool,
    /// Refuse (and do not advertise) secret-bearing SASL mechanisms on a
    /// cleartext channel (RFC 4954 §4).
    #[serde(default)]
    pub auth_require_tls: bool,
    /// Networks whose connections may issue XCLIENT.
    #[serde(default)]
    pub xclient_networks: Vec<ipnet::IpNet>,
    /// Error escalation thresholds.
    #[serde(default)]
    pub error: FieldSmtpError,
    /// Receiver timeouts.
    #[serde(default)]
    pub timeouts: FieldTimeouts,
    /// ESMTP extension advertisement values.
    #[serde(default)]
    pub esmtp: FieldEsmtp,
}

impl Config {
    const fn default_message_size_limit() -> u64 {
        20_000_000
    }

    const fn default_recipient_count_max() -> usize {
        1000
    }

    /// A configuration with every field defaulted around a server name.
    #[must_use]
    pub fn with_name(name: Domain) -> Self {
        Self {
            name,
            message_size_limit: Self::default_message_size_limit(),
            recipient_count_max: Self::default_recipient_count_max(),
            transaction_count_max: 0,
            require_auth: false,
            auth_require_tls: false,
            xclient_networks: vec![],
            error: FieldSmtpError::default(),
            timeouts: FieldTimeouts::default(),
            esmtp: FieldEsmtp::default(),
        }
    }

    /// Is the given peer allowed to issue XCLIENT?
    #[must_use]
    pub fn is_xclient_authorized(&self, peer: std::net::IpAddr) -> bool {
        self.xclient_networks.iter().any(|net| net.contains(&peer))
    }
}
