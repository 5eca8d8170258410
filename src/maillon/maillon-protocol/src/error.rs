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

/// A transport-level failure of the receiver, backed by
/// [`std::io::ErrorKind`].
#[derive(Debug)]
pub struct Error {
    kind: std::io::ErrorKind,
    inner: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "smtp protocol error: {:?}", self.kind)?;
        if let Some(inner) = &self.inner {
            write!(f, ": {inner}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(value: std::io::Error) -> Self {
        Self {
            kind: value.kind(),
            inner: value.into_inner(),
        }
    }
}

impl Error {
    pub(crate) fn line_too_long(limit: usize, got: usize) -> Self {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            ParseArgsError::LineTooLong {
                expected: limit,
                got,
            },
        )
        .into()
    }

    pub(crate) fn message_too_big(limit: u64) -> Self {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            ParseArgsError::MessageTooBig { limit },
        )
        .into()
    }

    pub(crate) fn no_crlf() -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "No CRLF found".to_owned()).into()
    }

    pub(crate) fn parse(error: ParseArgsError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, error).into()
    }

    /// Produce an error with a timeout message.
    #[must_use]
    #[inline]
    pub fn timeout(duration: std::time::Duration, message: &str) -> Self {
        std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("after {duration:?}: {message}"),
        )
        .into()
    }

    /// Get the kind of error.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> std::io::ErrorKind {
        self.kind
    }

    /// Return the underlying error, if any.
    #[inline]
    #[must_use]
    pub fn get_ref(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.inner.as_deref()
    }

    /// The underlying [`ParseArgsError`], if this error carries one.
    #[inline]
    #[must_use]
    pub fn as_parse_error(&self) -> Option<&ParseArgsError> {
        self.get_ref().and_then(|e| e.downcast_ref())
    }
}

/// Error while decoding a command line or its arguments. Every variant maps
/// to one protocol reply in the receiver.
#[allow(clippy::module_name_repetitions)]
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ParseArgsError {
    /// Non-UTF8 buffer.
    #[error("{0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Non-UTF8 buffer.
    #[error("{0}")]
    InvalidUtf8Ref(#[from] std::str::Utf8Error),
    /// A byte above 0x7F in a line that must be US-ASCII.
    #[error("non US-ASCII byte in command")]
    NotAscii,
    /// A non-ASCII address without the SMTPUTF8 parameter.
    #[error("SMTPUTF8 required for internationalized address")]
    SmtpUtf8Required,
    /// Invalid IP literal.
    #[error("{0}")]
    BadTypeAddr(#[from] std::net::AddrParseError),
    /// A command line longer than the RFC 5321 limit.
    #[error("line is not supposed to be longer than {expected} bytes but got {got}")]
    LineTooLong {
        /// line length limit
        expected: usize,
        /// actual length received
        got: usize,
    },
    /// Message content above the configured size limit.
    #[error("message exceeds the size limit of {limit} bytes")]
    MessageTooBig {
        /// size limit in bytes
        limit: u64,
    },
    /// Ill-formatted mail address (for RCPT, MAIL FROM, ORCPT, …).
    #[error("the address {mail:?} is not a valid RFC 5321 address")]
    InvalidMailAddress {
        /// ill-formatted mail address
        mail: String,
    },
    /// A `KEY=VALUE` extension parameter with an invalid value.
    #[error("invalid value for the {key} parameter")]
    BadParameterValue {
        /// parameter name
        key: &'static str,
    },
    /// The same extension parameter given twice.
    #[error("duplicated {key} parameter")]
    DuplicatedParameter {
        /// parameter name
        key: &'static str,
    },
    /// An xtext escape that is not `+HH`.
    #[error("invalid xtext encoding")]
    BadXtext,
    /// Catch-all for malformed arguments.
    #[error("invalid command arguments")]
    InvalidArgs,
}
