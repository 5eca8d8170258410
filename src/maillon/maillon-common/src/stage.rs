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

/// Stage of the step-by-step SMTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// The client has just connected; no hello has been accepted yet.
    Connect,
    /// The connection was refused at accept time; only QUIT is honored.
    Rejected,
    /// HELO/EHLO has been accepted, no transaction is open.
    Helo,
    /// A MAIL FROM has been accepted.
    #[strum(serialize = "mail")]
    MailFrom,
    /// At least one RCPT TO has been accepted.
    #[strum(serialize = "rcpt")]
    RcptTo,
    /// Message content is being received through DATA.
    Data,
    /// Message content is being received through BDAT chunks.
    Bdat,
    /// QUIT has been received; the connection is closing.
    Quit,
}
