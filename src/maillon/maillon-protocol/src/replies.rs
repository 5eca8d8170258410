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

//! The one place numeric replies are minted: the fixed decision table of the
//! handler verbs plus the protocol error replies.

use crate::ParseArgsError;
use maillon_common::{auth::Mechanism, Address, ClientName, Code, Domain, Reply};
use maillon_config::Config;

pub(crate) fn greeting(text: &str) -> Reply {
    Reply::new(Code::new(220), text)
}

pub(crate) fn connection_rejected(message: &str) -> Reply {
    Reply::new(Code::enhanced(554, 5, 0, 0), message)
}

pub(crate) fn rejected_session() -> Reply {
    Reply::new(Code::enhanced(554, 5, 0, 0), "Connection rejected")
}

pub(crate) fn shutting_down() -> Reply {
    Reply::new(Code::enhanced(421, 4, 3, 0), "Server shutting down")
}

pub(crate) fn helo_ok(local: &Domain, client: &ClientName) -> Reply {
    Reply::new(Code::new(250), format!("{local} Hello {client}"))
}

pub(crate) fn reject_hello(message: &str) -> Reply {
    Reply::new(Code::enhanced(550, 5, 0, 0), message)
}

pub(crate) fn reject_hello_temporary(message: &str) -> Reply {
    Reply::new(Code::enhanced(421, 4, 3, 0), message)
}

/// The full multi-line EHLO capability listing of this server.
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CapabilityView {
    pub secured: bool,
    pub starttls_offered: bool,
    pub xclient_authorized: bool,
    pub mechanisms: Vec<Mechanism>,
}

#[allow(clippy::expect_used)]
pub(crate) fn capabilities(config: &Config, view: &CapabilityView) -> Reply {
    let mut lines = vec![
        config.name.to_string(),
        format!("SIZE {}", config.message_size_limit),
    ];
    if config.esmtp.pipelining {
        lines.push("PIPELINING".to_owned());
    }
    lines.push("8BITMIME".to_owned());
    lines.push("SMTPUTF8".to_owned());
    lines.push("ENHANCEDSTATUSCODES".to_owned());
    lines.push("CHUNKING".to_owned());
    lines.push("BINARYMIME".to_owned());
    lines.push("DSN".to_owned());
    lines.push(if config.transaction_count_max > 0 {
        format!(
            "LIMITS RCPTMAX={} MAILMAX={}",
            config.recipient_count_max, config.transaction_count_max
        )
    } else {
        format!("LIMITS RCPTMAX={}", config.recipient_count_max)
    });
    if view.secured {
        lines.push("REQUIRETLS".to_owned());
    }
    lines.push("MT-PRIORITY MIXER STANAG4406 NSEP".to_owned());
    lines.push(format!(
        "FUTURERELEASE {} {}",
        config.esmtp.future_release_interval_max.as_secs(),
        config
            .esmtp
            .future_release_date_max
            .format(&time::format_description::well_known::Rfc3339)
            .expect("well-known format never fails"),
    ));
    lines.push(format!(
        "DELIVERBY {}",
        config.esmtp.deliver_by_max.as_secs()
    ));
    if view.xclient_authorized {
        lines.push("XCLIENT NAME ADDR PORT PROTO HELO LOGIN DESTADDR DESTPORT".to_owned());
    }
    if view.starttls_offered {
        lines.push("STARTTLS".to_owned());
    }
    let mechanisms = view
        .mechanisms
        .iter()
        .filter(|m| {
            m.is_supported()
                && (view.secured || !config.auth_require_tls || !m.must_be_under_tls())
        })
        .map(Mechanism::to_string)
        .collect::<Vec<_>>();
    if !mechanisms.is_empty() {
        lines.push(format!("AUTH {}", mechanisms.join(" ")));
    }
    lines.push("HELP".to_owned());

    Reply::multiline(Code::new(250), lines)
}

pub(crate) fn sender_ok() -> Reply {
    Reply::new(Code::enhanced(250, 2, 1, 0), "Sender ok")
}

pub(crate) fn sender_greylist() -> Reply {
    Reply::new(
        Code::enhanced(450, 4, 7, 1),
        "Greylisting in effect, please try again later",
    )
}

pub(crate) fn sender_rate_limit() -> Reply {
    Reply::new(
        Code::enhanced(450, 4, 7, 1),
        "Rate limit exceeded, please try again later",
    )
}

pub(crate) fn sender_storage_full() -> Reply {
    Reply::new(Code::enhanced(452, 4, 3, 1), "Insufficient system storage")
}

pub(crate) fn sender_blocked_domain() -> Reply {
    Reply::new(Code::enhanced(550, 5, 1, 1), "Sender domain blocked")
}

pub(crate) fn sender_invalid_domain() -> Reply {
    Reply::new(Code::enhanced(550, 5, 1, 1), "Sender domain does not exist")
}

pub(crate) fn sender_policy(message: &str) -> Reply {
    Reply::new(Code::enhanced(553, 5, 7, 1), message)
}

pub(crate) fn sender_spam() -> Reply {
    Reply::new(Code::enhanced(554, 5, 7, 1), "Sender has poor reputation")
}

pub(crate) fn sender_syntax() -> Reply {
    Reply::new(Code::enhanced(501, 5, 1, 3), "Invalid sender address format")
}

pub(crate) fn sender_not_authorized() -> Reply {
    Reply::new(
        Code::enhanced(550, 5, 7, 1),
        "Sender not authorized for the authenticated principal",
    )
}

pub(crate) fn auth_required() -> Reply {
    Reply::new(Code::enhanced(530, 5, 7, 0), "Authentication required")
}

pub(crate) fn requiretls_needs_tls() -> Reply {
    Reply::new(
        Code::enhanced(530, 5, 7, 10),
        "REQUIRETLS requires a secured connection",
    )
}

pub(crate) fn recipient_ok(address: &Address) -> Reply {
    Reply::new(
        Code::enhanced(250, 2, 1, 5),
        format!("{address}... Recipient ok"),
    )
}

pub(crate) fn recipient_forward(path: &Address) -> Reply {
    Reply::new(
        Code::enhanced(251, 2, 1, 5),
        format!("User not local; will forward to <{path}>"),
    )
}

pub(crate) fn recipient_greylist() -> Reply {
    Reply::new(
        Code::enhanced(450, 4, 7, 1),
        "Greylisting in effect, please try again later",
    )
}

pub(crate) fn recipient_temporary(message: &str) -> Reply {
    Reply::new(Code::enhanced(451, 4, 3, 0), message)
}

pub(crate) fn recipient_storage_full() -> Reply {
    Reply::new(Code::enhanced(452, 4, 3, 1), "Insufficient system storage")
}

pub(crate) fn too_many_recipients() -> Reply {
    Reply::new(Code::enhanced(452, 5, 5, 3), "Too many recipients")
}

pub(crate) fn recipient_unknown() -> Reply {
    Reply::new(Code::enhanced(550, 5, 1, 1), "Mailbox unknown")
}

pub(crate) fn recipient_not_local() -> Reply {
    Reply::new(Code::enhanced(551, 5, 1, 6), "User not local")
}

pub(crate) fn recipient_mailbox_full() -> Reply {
    Reply::new(Code::enhanced(552, 5, 2, 2), "Mailbox full")
}

pub(crate) fn recipient_policy(message: &str) -> Reply {
    Reply::new(Code::enhanced(553, 5, 7, 1), message)
}

pub(crate) fn smtputf8_required_for_sender() -> Reply {
    Reply::new(
        Code::enhanced(553, 5, 6, 7),
        "SMTPUTF8 required for internationalized sender address",
    )
}

pub(crate) fn smtputf8_required_for_recipient() -> Reply {
    Reply::new(
        Code::enhanced(553, 5, 6, 7),
        "SMTPUTF8 required for internationalized recipient address",
    )
}

pub(crate) fn start_mail_input() -> Reply {
    Reply::new(
        Code::new(354),
        "Start mail input; end with <CRLF>.<CRLF>",
    )
}

pub(crate) fn binarymime_requires_bdat() -> Reply {
    Reply::new(Code::enhanced(503, 5, 6, 1), "BINARYMIME requires BDAT")
}

pub(crate) fn chunk_received(size: u64) -> Reply {
    Reply::new(Code::enhanced(250, 2, 0, 0), format!("{size} bytes received"))
}

pub(crate) fn message_delivered(queue_id: Option<&str>, chunked_bytes: Option<u64>) -> Reply {
    let mut text = "Message accepted for delivery".to_owned();
    if let Some(total) = chunked_bytes {
        text.push_str(&format!(" ({total} bytes)"));
    }
    if let Some(queue_id) = queue_id {
        text.push_str(&format!(" ({queue_id})"));
    }
    Reply::new(Code::enhanced(250, 2, 0, 0), text)
}

pub(crate) fn message_temporary(message: &str) -> Reply {
    Reply::new(Code::enhanced(450, 4, 0, 0), message)
}

pub(crate) fn message_permanent(message: &str) -> Reply {
    Reply::new(Code::enhanced(550, 5, 0, 0), message)
}

pub(crate) fn message_policy(message: &str) -> Reply {
    Reply::new(Code::enhanced(553, 5, 7, 1), message)
}

pub(crate) fn message_too_big() -> Reply {
    Reply::new(
        Code::enhanced(552, 5, 3, 4),
        "Message size exceeds fixed maximum message size",
    )
}

pub(crate) fn reset_ok() -> Reply {
    Reply::new(Code::enhanced(250, 2, 0, 0), "Reset OK")
}

pub(crate) fn noop() -> Reply {
    Reply::new(Code::enhanced(250, 2, 0, 0), "Ok")
}

pub(crate) fn help() -> Reply {
    Reply::new(
        Code::enhanced(214, 2, 0, 0),
        "Commands supported: EHLO HELO MAIL RCPT DATA BDAT RSET NOOP QUIT VRFY EXPN HELP AUTH STARTTLS",
    )
}

pub(crate) fn vrfy() -> Reply {
    Reply::new(
        Code::enhanced(252, 2, 0, 0),
        "Cannot VRFY user, but will accept message and attempt delivery",
    )
}

pub(crate) fn expn() -> Reply {
    Reply::new(Code::enhanced(502, 5, 2, 4), "EXPN not supported")
}

pub(crate) fn quit() -> Reply {
    Reply::new(
        Code::enhanced(221, 2, 0, 0),
        "Service closing transmission channel",
    )
}

pub(crate) fn bad_sequence() -> Reply {
    Reply::new(Code::enhanced(503, 5, 0, 0), "Bad sequence of commands")
}

pub(crate) fn chunking_requires_ehlo() -> Reply {
    Reply::new(Code::enhanced(503, 5, 5, 1), "CHUNKING requires EHLO")
}

pub(crate) fn esmtp_parameters_require_ehlo() -> Reply {
    Reply::new(
        Code::enhanced(503, 5, 5, 1),
        "Extension parameters require EHLO",
    )
}

pub(crate) fn unknown_command() -> Reply {
    Reply::new(
        Code::enhanced(500, 5, 5, 2),
        "Syntax error, command unrecognized",
    )
}

pub(crate) fn line_too_long() -> Reply {
    Reply::new(Code::enhanced(500, 5, 5, 2), "Line too long")
}

pub(crate) fn timeout() -> Reply {
    Reply::new(
        Code::enhanced(451, 4, 4, 2),
        "Timeout - closing connection",
    )
}

pub(crate) fn local_error() -> Reply {
    Reply::new(Code::enhanced(451, 4, 3, 0), "Local processing error")
}

pub(crate) fn transaction_limit_reached() -> Reply {
    Reply::new(
        Code::enhanced(421, 4, 5, 3),
        "Too many transactions on this connection, closing",
    )
}

pub(crate) fn starttls_ready() -> Reply {
    Reply::new(Code::enhanced(220, 2, 0, 0), "Ready to start TLS")
}

pub(crate) fn starttls_unavailable() -> Reply {
    Reply::new(Code::enhanced(454, 4, 3, 0), "TLS not available")
}

pub(crate) fn starttls_already_active() -> Reply {
    Reply::new(Code::enhanced(503, 5, 5, 1), "TLS session already established")
}

pub(crate) fn auth_requires_ehlo() -> Reply {
    Reply::new(Code::enhanced(503, 5, 5, 1), "AUTH requires EHLO")
}

pub(crate) fn auth_not_available() -> Reply {
    Reply::new(Code::enhanced(502, 5, 5, 1), "Authentication not available")
}

pub(crate) fn already_authenticated() -> Reply {
    Reply::new(Code::enhanced(503, 5, 5, 1), "Already authenticated")
}

pub(crate) fn auth_mechanism_not_supported() -> Reply {
    Reply::new(
        Code::enhanced(504, 5, 5, 4),
        "Unrecognized authentication type",
    )
}

pub(crate) fn auth_mechanism_requires_tls() -> Reply {
    Reply::new(
        Code::enhanced(538, 5, 7, 11),
        "Encryption required for requested authentication mechanism",
    )
}

pub(crate) fn auth_succeeded() -> Reply {
    Reply::new(Code::enhanced(235, 2, 7, 0), "Authentication successful")
}

pub(crate) fn auth_failed() -> Reply {
    Reply::new(
        Code::enhanced(535, 5, 7, 8),
        "Authentication credentials invalid",
    )
}

pub(crate) fn auth_cancelled() -> Reply {
    Reply::new(Code::enhanced(501, 5, 7, 0), "Authentication cancelled")
}

pub(crate) fn auth_malformed() -> Reply {
    Reply::new(
        Code::enhanced(501, 5, 5, 2),
        "Malformed authentication response",
    )
}

pub(crate) fn auth_client_must_not_start() -> Reply {
    Reply::new(
        Code::enhanced(501, 5, 7, 0),
        "Initial response not allowed for this mechanism",
    )
}

pub(crate) fn xclient_denied() -> Reply {
    Reply::new(Code::enhanced(550, 5, 7, 0), "XCLIENT not allowed")
}

pub(crate) fn xclient_in_transaction() -> Reply {
    Reply::new(
        Code::enhanced(503, 5, 5, 1),
        "XCLIENT not permitted during a mail transaction",
    )
}

/// Map a decode failure onto its protocol reply (spec §7, kind 1).
pub(crate) fn from_parse_error(error: &ParseArgsError) -> Reply {
    match error {
        ParseArgsError::SmtpUtf8Required => smtputf8_required_for_sender(),
        ParseArgsError::InvalidMailAddress { mail } => Reply::new(
            Code::enhanced(501, 5, 1, 3),
            format!("The address <{mail}> is not a valid RFC 5321 address"),
        ),
        ParseArgsError::LineTooLong { .. } => line_too_long(),
        ParseArgsError::MessageTooBig { .. } => message_too_big(),
        ParseArgsError::NotAscii
        | ParseArgsError::InvalidUtf8(_)
        | ParseArgsError::InvalidUtf8Ref(_) => Reply::new(
            Code::enhanced(501, 5, 5, 2),
            "Syntax error in parameters or arguments",
        ),
        ParseArgsError::BadParameterValue { key } => Reply::new(
            Code::enhanced(501, 5, 5, 4),
            format!("Invalid value for the {key} parameter"),
        ),
        ParseArgsError::DuplicatedParameter { key } => Reply::new(
            Code::enhanced(501, 5, 5, 4),
            format!("Duplicated {key} parameter"),
        ),
        ParseArgsError::BadXtext => {
            Reply::new(Code::enhanced(501, 5, 5, 4), "Invalid xtext encoding")
        }
        _ => Reply::new(
            Code::enhanced(501, 5, 5, 4),
            "Syntax error in parameters or arguments",
        ),
    }
}
