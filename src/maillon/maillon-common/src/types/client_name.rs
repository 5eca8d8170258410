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

use crate::Domain;

/// The identity a client presents with HELO/EHLO: a domain or an address
/// literal.
#[derive(Clone, Debug, PartialEq, Eq, serde_with::SerializeDisplay, serde_with::DeserializeFromStr)]
pub enum ClientName {
    /// A fully qualified domain name.
    Domain(Domain),
    /// An IPv4 address literal, e.g. `[127.0.0.1]`.
    Ip4(std::net::Ipv4Addr),
    /// An IPv6 address literal, e.g. `[IPv6:::1]`.
    Ip6(std::net::Ipv6Addr),
}

impl std::str::FromStr for ClientName {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ipv6 if ipv6.to_lowercase().starts_with("[ipv6:") && ipv6.ends_with(']') => {
                match ipv6.get("[IPv6:".len()..ipv6.len() - 1) {
                    Some(ipv6) => Ok(Self::Ip6(ipv6.parse()?)),
                    None => anyhow::bail!("'{ipv6}' is not a valid IPv6 literal"),
                }
            }
            ipv4 if ipv4.starts_with('[') && ipv4.ends_with(']') => {
                match ipv4.get(1..ipv4.len() - 1) {
                    Some(ipv4) => Ok(Self::Ip4(ipv4.parse()?)),
                    None => anyhow::bail!("'{ipv4}' is not a valid IPv4 literal"),
                }
            }
            domain => Ok(Self::Domain(domain.parse()?)),
        }
    }
}

impl std::fmt::Display for ClientName {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain(domain) => write!(f, "{domain}"),
            Self::Ip4(ip) => write!(f, "[{ip}]"),
            Self::Ip6(ip) => write!(f, "[IPv6:{ip}]"),
        }
    }
}
