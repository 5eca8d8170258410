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

//! Loopback test harness for the maillon receiver: a real TCP server on a
//! random port, a scripted client, and exact assertions on every reply
//! byte. See [`run_test!`] and [`run_pipelined_test!`].

#![allow(clippy::unwrap_used, clippy::panic)]

/// Configurations used by the test suites.
pub mod config;
/// The accept-everything recording handler and the in-memory realm.
pub mod handler;
/// Self-signed TLS material for STARTTLS suites.
pub mod tls;

mod receiver;

#[cfg(test)]
mod tests;

/// The capability lines the default test configuration advertises on EHLO,
/// one per reply line.
#[must_use]
pub fn default_ehlo_lines() -> Vec<String> {
    [
        "250-testserver.com\r\n",
        "250-SIZE 20000000\r\n",
        "250-PIPELINING\r\n",
        "250-8BITMIME\r\n",
        "250-SMTPUTF8\r\n",
        "250-ENHANCEDSTATUSCODES\r\n",
        "250-CHUNKING\r\n",
        "250-BINARYMIME\r\n",
        "250-DSN\r\n",
        "250-LIMITS RCPTMAX=1000\r\n",
        "250-MT-PRIORITY MIXER STANAG4406 NSEP\r\n",
        "250-FUTURERELEASE 604800 2012-01-01T00:00:00Z\r\n",
        "250-DELIVERBY 604800\r\n",
        "250 HELP\r\n",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// [`default_ehlo_lines`] with extra capability lines (STARTTLS, AUTH, …)
/// spliced in before the final `250 HELP`.
#[must_use]
pub fn ehlo_lines_with(extra: &[&str]) -> Vec<String> {
    let mut lines = default_ehlo_lines();
    let help = lines.pop().unwrap();
    lines.extend(extra.iter().map(|line| format!("250-{line}\r\n")));
    lines.push(help);
    lines
}
