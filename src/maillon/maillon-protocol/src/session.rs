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

use crate::command::AcceptArgs;
use maillon_common::{Context, Stage, TlsProperties};
use maillon_config::Config;

/// Per-connection protocol state owned by the receiver: the staged envelope
/// plus the flags the state machine dispatches on. Never shared across
/// connections.
pub(crate) struct Session {
    pub(crate) context: Context,
    /// The true peer address; XCLIENT overrides the context's copy but
    /// authorisation keeps consulting this one.
    pub(crate) peer_addr: std::net::SocketAddr,
    /// The connection was refused at accept time; only QUIT is honored.
    pub(crate) rejected: bool,
    /// EHLO (or XCLIENT `PROTO=ESMTP`) enabled the extended mode.
    pub(crate) extended: bool,
    /// STARTTLS has run once; re-negotiation is refused.
    pub(crate) starttls_used: bool,
    /// Completed transactions (messages finished) on this session.
    pub(crate) transaction_count: usize,
    /// The open transaction transfers its content with BDAT.
    pub(crate) bdat_started: bool,
    /// Content bytes received by previous BDAT chunks of this transaction.
    pub(crate) bdat_total: u64,
    /// Hello name asserted by a trusted proxy (XCLIENT `HELO`).
    pub(crate) xclient_helo: Option<String>,
}

impl Session {
    pub(crate) fn new(config: &Config, args: &AcceptArgs) -> Self {
        Self {
            context: Context::new(
                args.client_addr,
                args.server_addr,
                config.name.clone(),
                args.timestamp,
                args.uuid,
            ),
            peer_addr: args.client_addr,
            rejected: false,
            extended: false,
            starttls_used: false,
            transaction_count: 0,
            bdat_started: false,
            bdat_total: 0,
            xclient_helo: None,
        }
    }

    /// The state the dispatch table keys on.
    pub(crate) fn stage(&self) -> Stage {
        if self.rejected {
            Stage::Rejected
        } else {
            self.context.stage()
        }
    }

    /// Transactional reset: RSET, message accepted, or message permanently
    /// rejected. Hello, TLS and authentication state survive.
    pub(crate) fn reset_transaction(&mut self) {
        self.context.reset();
        self.bdat_started = false;
        self.bdat_total = 0;
    }

    /// Record a completed TLS handshake: hello state is discarded and the
    /// extended flag drops until the client re-EHLOs.
    pub(crate) fn secure(&mut self, tls: TlsProperties) -> Result<(), maillon_common::ContextError> {
        self.context.to_secured(tls)?;
        self.extended = false;
        self.bdat_started = false;
        self.bdat_total = 0;
        Ok(())
    }
}
