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

/// Numeric SMTP reply code, optionally qualified by an RFC 2034 enhanced
/// status triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    value: u16,
    enhanced: Option<(u16, u16, u16)>,
}

impl Code {
    /// A bare numeric code.
    #[inline]
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self {
            value,
            enhanced: None,
        }
    }

    /// A numeric code with its enhanced status triplet.
    #[inline]
    #[must_use]
    pub const fn enhanced(value: u16, class: u16, subject: u16, detail: u16) -> Self {
        Self {
            value,
            enhanced: Some((class, subject, detail)),
        }
    }

    /// The numeric value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.value
    }

    /// Is this a 4xx or 5xx reply?
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.value >= 400
    }

    /// Is this a 5xx reply?
    #[inline]
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.value >= 500
    }
}

impl std::fmt::Display for Code {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.enhanced {
            Some((class, subject, detail)) => {
                write!(f, "{} {class}.{subject}.{detail}", self.value)
            }
            None => write!(f, "{}", self.value),
        }
    }
}

/// A complete reply: one code and one or more text lines, rendered with the
/// RFC 5321 continuation syntax (`250-…` / `250 …`) and a CRLF after each
/// line. The enhanced status, when present, prefixes every line.
#[derive(Debug, Clone, PartialEq, Eq, serde_with::SerializeDisplay, serde_with::DeserializeFromStr)]
pub struct Reply {
    code: Code,
    text: Vec<String>,
    folded: String,
}

impl Reply {
    /// A single-line reply.
    #[inline]
    #[must_use]
    pub fn new(code: Code, text: impl Into<String>) -> Self {
        Self::multiline(code, vec![text.into()])
    }

    /// A multi-line reply. At least one line is required; an empty `lines`
    /// produces a reply with one empty text line.
    #[inline]
    #[must_use]
    pub fn multiline(code: Code, mut lines: Vec<String>) -> Self {
        if lines.is_empty() {
            lines.push(String::new());
        }
        let folded = fold(code, &lines);
        Self {
            code,
            text: lines,
            folded,
        }
    }

    /// The reply code.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> Code {
        self.code
    }

    /// The text lines, without code prefixes or CRLF.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.text
    }
}

fn fold(code: Code, lines: &[String]) -> String {
    let mut out = String::new();
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        let sep = if i == last { ' ' } else { '-' };
        out.push_str(&code.value().to_string());
        out.push(sep);
        if let Some((class, subject, detail)) = code.enhanced {
            out.push_str(&format!("{class}.{subject}.{detail} "));
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

impl AsRef<str> for Reply {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.folded
    }
}

impl std::fmt::Display for Reply {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.folded)
    }
}

/// Error produced when parsing a wire-form reply.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReplyParseError {
    /// The input is empty.
    #[error("empty reply")]
    Empty,
    /// A line is shorter than `NNN` or its code is not numeric.
    #[error("malformed reply line: {0:?}")]
    BadLine(String),
    /// Continuation lines carry a different code than the first line.
    #[error("inconsistent codes in multiline reply")]
    CodeMismatch,
}

fn parse_enhanced(text: &str) -> Option<((u16, u16, u16), &str)> {
    let (esc, rest) = text.split_once(' ')?;
    let mut it = esc.splitn(3, '.');
    let class = it.next()?.parse().ok()?;
    let subject = it.next()?.parse().ok()?;
    let detail = it.next()?.parse().ok()?;
    Some(((class, subject, detail), rest))
}

impl std::str::FromStr for Reply {
    type Err = ReplyParseError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut code: Option<u16> = None;
        let mut enhanced = None;
        let mut lines = vec![];

        for line in s.split("\r\n").filter(|l| !l.is_empty()) {
            if line.len() < 3 || !line.is_char_boundary(3) {
                return Err(ReplyParseError::BadLine(line.to_owned()));
            }
            let (value, rest) = line.split_at(3);
            let value: u16 = value
                .parse()
                .map_err(|_e| ReplyParseError::BadLine(line.to_owned()))?;
            match code {
                Some(previous) if previous != value => return Err(ReplyParseError::CodeMismatch),
                _ => code = Some(value),
            }
            let text = rest.strip_prefix(['-', ' ']).unwrap_or(rest);
            match parse_enhanced(text) {
                Some((esc, stripped)) => {
                    enhanced = Some(esc);
                    lines.push(stripped.to_owned());
                }
                None => lines.push(text.to_owned()),
            }
        }

        let value = code.ok_or(ReplyParseError::Empty)?;
        let code = match enhanced {
            Some((class, subject, detail)) => Code::enhanced(value, class, subject, detail),
            None => Code::new(value),
        };
        Ok(Self::multiline(code, lines))
    }
}
