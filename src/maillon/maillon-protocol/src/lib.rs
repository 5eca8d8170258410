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

//! The maillon receiver: a per-connection server-side ESMTP engine.
//!
//! One [`Receiver`] is created per accepted connection. It frames the byte
//! stream into commands, message content (DATA with dot-unstuffing, BDAT
//! with exact counts) and SASL exchanges, enforces RFC 5321 command
//! ordering and every advertised extension, and calls back into a
//! [`ReceiverHandler`] at each policy decision point. The handler answers
//! with stage-specific decision values; the engine owns the mapping from
//! decisions to numeric replies.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod auth;
mod command;
mod error;
mod handler;
mod mechanism;
mod reader;
mod receiver;
mod replies;
mod session;
mod writer;
mod xclient;

pub use auth::{AuthError, Realm};
pub use command::{
    AcceptArgs, AuthArgs, Batch, BdatArgs, Command, EhloArgs, HeloArgs, MailFromArgs, RcptToArgs,
    UnparsedArgs, Verb, XclientArgs, XclientAttribute, XclientProto,
};
pub use error::{Error, ParseArgsError};
pub use handler::{
    ConnectDecision, HelloDecision, MessageDecision, Pipeline, ReceiverHandler, RecipientDecision,
    SenderDecision,
};
pub use reader::Reader;
pub use receiver::{ErrorCounter, Receiver, ReceiverContext};
pub use writer::WindowWriter;

/// How the connection reached this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionKind {
    /// Classic SMTP connection; TLS is opportunistic via STARTTLS.
    Relay,
    /// SMTPS: the TLS handshake runs before the greeting.
    Tunneled,
}
