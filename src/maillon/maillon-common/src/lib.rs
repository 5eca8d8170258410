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

//! Shared value types of the maillon SMTP receiver: replies, envelope
//! addresses, the staged connection context and the SASL mechanism table.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod context;
mod reply;
mod stage;
mod types {
    pub mod address;
    pub mod client_name;
    pub mod domain;
}

/// SASL mechanisms and credentials.
pub mod auth;

pub use context::{
    AuthProperties, BodyType, ConnectProperties, Context, ContextFinished, DeliverBy,
    DeliverByMode, DeliveryRequirements, DsnReturn, Error as ContextError, FieldAccessError,
    FinishedProperties, HeloProperties, MailFromEnvelope, MailFromProperties, NotifyOn,
    OriginalRecipient, RcptToProperties, Recipient, TlsProperties,
};
pub use reply::{Code, Reply, ReplyParseError};
pub use stage::Stage;
pub use types::address::Address;
pub use types::client_name::ClientName;
pub use types::domain::Domain;
