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

use maillon_config::Config;

/// The configuration every suite starts from: `testserver.com`, default
/// limits, pipelining on.
#[must_use]
pub fn local_test() -> Config {
    Config::with_name("testserver.com".parse().unwrap())
}

/// [`local_test`] allowing XCLIENT from loopback.
#[must_use]
pub fn with_xclient_from_loopback() -> Config {
    let mut config = local_test();
    config.xclient_networks = vec!["127.0.0.0/8".parse().unwrap(), "::1/128".parse().unwrap()];
    config
}
