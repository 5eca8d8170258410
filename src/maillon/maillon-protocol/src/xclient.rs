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

//! The Postfix XCLIENT trust-delegation command: an authorised proxy hands
//! the receiver the attributes of the client it fronts for.

use crate::command::{XclientArgs, XclientAttribute, XclientProto};
use crate::session::Session;
use maillon_common::{auth::Credentials, auth::Mechanism, Context, Reply};
use maillon_config::Config;

/// Apply an authorised XCLIENT to the session: override the connection
/// attributes, reset the state machine to the connect stage and re-greet.
/// Sequencing and authorisation are the caller's checks.
pub(crate) fn apply(session: &mut Session, config: &Config, args: XclientArgs) -> Reply {
    let mut connect = session.context.connect_properties().clone();
    let mut extended = None;
    let mut helo = None;
    let mut login: Option<Option<String>> = None;

    for attribute in args.attributes {
        match attribute {
            XclientAttribute::Name(name) => connect.client_host = name,
            XclientAttribute::Addr(addr) => {
                if let Some(addr) = addr {
                    connect.client_addr.set_ip(addr);
                }
            }
            XclientAttribute::Port(port) => {
                if let Some(port) = port {
                    connect.client_addr.set_port(port);
                }
            }
            XclientAttribute::DestAddr(addr) => {
                if let Some(addr) = addr {
                    connect.server_addr.set_ip(addr);
                }
            }
            XclientAttribute::DestPort(port) => {
                if let Some(port) = port {
                    connect.server_addr.set_port(port);
                }
            }
            XclientAttribute::Proto(proto) => {
                extended = proto.map(|proto| proto == XclientProto::Esmtp);
            }
            XclientAttribute::Helo(name) => helo = name,
            XclientAttribute::Login(name) => login = Some(name),
        }
    }

    session.context = Context::with_connect(connect);
    session.reset_transaction();
    if let Some(extended) = extended {
        session.extended = extended;
    } else {
        // Without PROTO the mandated re-EHLO re-establishes the mode.
        session.extended = false;
    }
    session.xclient_helo = helo;
    match login {
        // LOGIN=[UNAVAILABLE] drops the principal.
        Some(None) => session.context.clear_credentials(),
        Some(Some(authid)) => session.context.set_credentials(Credentials {
            authid,
            mechanism: Mechanism::External,
        }),
        None => (),
    }

    tracing::debug!(
        client_addr = %session.context.client_addr(),
        "session attributes overridden by xclient, re-greeting",
    );
    Reply::new(
        maillon_common::Code::new(220),
        format!("{} ESMTP", config.name),
    )
}
