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
    auth::Realm,
    command::{EhloArgs, HeloArgs, MailFromArgs, RcptToArgs},
    ReceiverContext,
};
use maillon_common::{Address, ContextFinished, Reply};
use tokio_rustls::rustls;

/// Decision on a freshly accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDecision {
    /// Greet the client: `220 <greeting>`.
    Accept {
        /// Banner text after the code.
        greeting: String,
    },
    /// `554 5.0.0 <message>`; the session stays open but refuses everything
    /// except QUIT.
    Reject {
        /// Refusal text.
        message: String,
    },
    /// `421 4.3.0 Server shutting down`, then close.
    ShuttingDown,
}

/// Decision on a HELO/EHLO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloDecision {
    /// `250` (HELO) or the full capability listing (EHLO).
    Accept,
    /// `550 5.0.0 <message>`.
    Reject {
        /// Refusal text.
        message: String,
    },
    /// `421 4.3.0 <message>`.
    RejectTemporary {
        /// Refusal text.
        message: String,
    },
}

/// Decision on a MAIL FROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderDecision {
    /// `250 2.1.0 Sender ok`.
    Accept,
    /// `450 4.7.1` greylisting.
    Greylist,
    /// `450 4.7.1` rate limit.
    RateLimit,
    /// `452 4.3.1 Insufficient system storage`.
    StorageFull,
    /// `550 5.1.1 Sender domain blocked`.
    BlockedDomain,
    /// `550 5.1.1 Sender domain does not exist`.
    InvalidDomain,
    /// `553 5.7.1 <message>`.
    Policy {
        /// Refusal text.
        message: String,
    },
    /// `554 5.7.1 Sender has poor reputation`.
    Spam,
    /// `501 5.1.3 Invalid sender address format`.
    Syntax,
}

/// Decision on a RCPT TO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientDecision {
    /// `250 2.1.5 <addr>... Recipient ok`.
    Accept,
    /// `251 2.1.5 User not local; will forward to <path>`.
    Forward {
        /// Where the message will be forwarded.
        path: Address,
    },
    /// `450 4.7.1` greylisting.
    Greylist,
    /// `451 4.3.0 <message>`.
    Temporary {
        /// Refusal text.
        message: String,
    },
    /// `452 4.3.1 Insufficient system storage`.
    StorageFull,
    /// `550 5.1.1 Mailbox unknown`.
    UnknownMailbox,
    /// `551 5.1.6 User not local`.
    NotLocal,
    /// `552 5.2.2 Mailbox full`.
    MailboxFull,
    /// `553 5.7.1 <message>`.
    Policy {
        /// Refusal text.
        message: String,
    },
}

/// Decision once the message content has been fully received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDecision {
    /// `250 2.0.0 Message accepted for delivery`, optionally naming the
    /// queue entry.
    Accept {
        /// Identifier the host assigned to the queued message.
        queue_id: Option<String>,
    },
    /// `450 4.0.0 <message>`.
    Temporary {
        /// Refusal text.
        message: String,
    },
    /// `550 5.0.0 <message>`.
    Permanent {
        /// Refusal text.
        message: String,
    },
    /// `553 5.7.1 <message>`.
    Policy {
        /// Refusal text.
        message: String,
    },
}

/// An optional streaming sink for message content, fed in parallel with the
/// staged handler callbacks so hosts can spool to disk while deciding.
#[async_trait::async_trait]
pub trait Pipeline: Send {
    /// A transaction opened.
    async fn mail_from(&mut self, reverse_path: &Option<Address>);
    /// A recipient was accepted.
    async fn rcpt_to(&mut self, forward_path: &Address);
    /// One verbatim chunk of message content.
    async fn content(&mut self, chunk: &bytes::Bytes);
    /// The message content is complete.
    async fn end_data(&mut self);
    /// The transaction was abandoned.
    async fn reset(&mut self);
}

/// The staged application callbacks driven by the receiver. Each stage
/// returns a decision; the receiver owns the mapping from decisions to
/// numeric replies, so a handler cannot produce an off-protocol answer.
#[async_trait::async_trait]
pub trait ReceiverHandler {
    /// The authentication realm, when this server offers AUTH.
    fn realm(&self) -> Option<std::sync::Arc<dyn Realm>> {
        None
    }

    /// The TLS configuration offered for STARTTLS and tunneled connections.
    fn tls_config(&self) -> Option<std::sync::Arc<rustls::ServerConfig>> {
        None
    }

    /// An optional streaming sink for message content.
    fn pipeline(&mut self) -> Option<&mut dyn Pipeline> {
        None
    }

    /// A HELO was received (stage preconditions already enforced).
    async fn on_helo(&mut self, ctx: &mut ReceiverContext, args: &HeloArgs) -> HelloDecision;

    /// An EHLO was received.
    async fn on_ehlo(&mut self, ctx: &mut ReceiverContext, args: &EhloArgs) -> HelloDecision;

    /// A SASL exchange completed; `principal` is the authorisation identity.
    async fn on_authenticated(&mut self, _ctx: &mut ReceiverContext, _principal: &str) {}

    /// A MAIL FROM passed every engine precondition.
    async fn on_mail_from(&mut self, ctx: &mut ReceiverContext, args: &MailFromArgs)
        -> SenderDecision;

    /// A RCPT TO passed every engine precondition.
    async fn on_rcpt_to(&mut self, ctx: &mut ReceiverContext, args: &RcptToArgs)
        -> RecipientDecision;

    /// DATA was accepted; message content follows.
    async fn on_data_start(&mut self, _ctx: &mut ReceiverContext) {}

    /// One chunk of message content, dot-unstuffed, bytes verbatim.
    async fn on_message_content(&mut self, ctx: &mut ReceiverContext, chunk: &bytes::Bytes);

    /// The message terminator (or last BDAT chunk) was received.
    async fn on_message_complete(
        &mut self,
        ctx: &mut ReceiverContext,
        envelope: &ContextFinished,
    ) -> MessageDecision;

    /// The transaction was reset (RSET).
    async fn on_reset(&mut self) {}

    /// The soft error threshold was passed; the returned reply is sent
    /// instead.
    async fn on_soft_error(&mut self, _ctx: &mut ReceiverContext, reply: Reply) -> Reply {
        reply
    }

    /// The hard error threshold was passed; the returned reply is sent, and
    /// the default drops the connection.
    async fn on_hard_error(&mut self, ctx: &mut ReceiverContext, reply: Reply) -> Reply {
        ctx.deny();
        reply
    }
}
