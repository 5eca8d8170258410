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
    command::{Batch, Command, UnparsedArgs, Verb},
    Error,
};
use bytes::Buf;
use tokio::io::AsyncReadExt;

/// Maximum octets of a command line, terminating CRLF excluded
/// (RFC 5321 §4.5.3.1.6).
const MAX_LINE_LENGTH: usize = 998;

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    memchr::memmem::find(bytes, b"\r\n")
}

#[allow(clippy::expect_used, clippy::indexing_slicing)]
fn parse_command_line(line: &[u8]) -> Command<Verb, UnparsedArgs> {
    <Verb as strum::VariantNames>::VARIANTS
        .iter()
        .find(|i| line.len() >= i.len() && line[..i.len()].eq_ignore_ascii_case(i.as_bytes()))
        .map_or_else(
            || (Verb::Unknown, UnparsedArgs(line.to_vec())),
            |verb| {
                (
                    verb.parse().expect("verb found above"),
                    UnparsedArgs(line[verb.len()..].to_vec()),
                )
            },
        )
}

/// Sub-state of the DATA automaton: what control prefix the last consumed
/// bytes form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataState {
    /// Mid-line content.
    Normal,
    /// The last byte was a CR.
    SawCr,
    /// The last bytes were CRLF: the next byte may open a control sequence.
    SawCrlf,
    /// CRLF then a dot: stuffing prefix or start of the terminator.
    SawDot,
    /// CRLF, dot, CR: one LF short of the terminator.
    SawDotCr,
}

/// What one scan of the automaton produced, as positions into the scanned
/// input so the caller can split its buffer without copying.
#[derive(Debug, PartialEq, Eq)]
enum DataEvent {
    /// `input[start..end]` is message content.
    Slice {
        /// first content byte
        start: usize,
        /// one past the last content byte
        end: usize,
    },
    /// A withheld control byte from a previous segment turned out to be
    /// content (the CR of a stuffed `CRLF.CR`).
    ControlByte(u8),
}

#[derive(Debug, PartialEq, Eq)]
struct DataScan {
    events: Vec<DataEvent>,
    /// Bytes of the input consumed by this scan.
    consumed: usize,
    /// The `<CRLF>.<CRLF>` terminator was reached; unconsumed input is
    /// pipelined command data.
    terminated: bool,
}

/// The DATA dot-unstuffing automaton (RFC 5321 §4.5.2).
///
/// Message bytes pass through untouched, in runs split only where a stuffed
/// dot is excised. A dot right after CRLF is withheld until the next byte
/// decides between stuffing (dot dropped) and the message terminator. An
/// in-flight control sequence straddling a TCP segment boundary survives as
/// [`DataState`] alone: the withheld bytes are fixed by the state (a dot,
/// or a dot and a CR), so the next scan re-emits the CR as a
/// [`DataEvent::ControlByte`] if stuffing is confirmed, and nothing has to
/// be copied between reads.
#[derive(Debug)]
struct DataUnstuffer {
    state: DataState,
}

impl DataUnstuffer {
    /// The start of the message behaves as if a CRLF was just seen: a
    /// leading dot is a control character.
    const fn new() -> Self {
        Self {
            state: DataState::SawCrlf,
        }
    }

    #[allow(clippy::too_many_lines, clippy::indexing_slicing)]
    fn feed(&mut self, input: &[u8]) -> DataScan {
        let mut events = Vec::new();
        // Start of the current content run within `input`.
        let mut run_start: Option<usize> = None;
        // Position of the withheld dot, when it is in `input` rather than in
        // the control buffer.
        let mut dot_pos: Option<usize> = None;
        // Position of the CR after the withheld dot, same convention.
        let mut pending_cr_pos: Option<usize> = None;

        macro_rules! flush_run {
            ($end:expr) => {
                if let Some(start) = run_start.take() {
                    if start < $end {
                        events.push(DataEvent::Slice { start, end: $end });
                    }
                }
            };
        }

        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            match self.state {
                DataState::Normal => {
                    run_start.get_or_insert(i);
                    self.state = if byte == b'\r' {
                        DataState::SawCr
                    } else {
                        DataState::Normal
                    };
                }
                DataState::SawCr => {
                    run_start.get_or_insert(i);
                    self.state = match byte {
                        b'\n' => DataState::SawCrlf,
                        b'\r' => DataState::SawCr,
                        _ => DataState::Normal,
                    };
                }
                DataState::SawCrlf => match byte {
                    b'.' => {
                        // The run up to the dot is content, the dot is not.
                        flush_run!(i);
                        dot_pos = Some(i);
                        self.state = DataState::SawDot;
                    }
                    b'\r' => {
                        run_start.get_or_insert(i);
                        self.state = DataState::SawCr;
                    }
                    _ => {
                        run_start.get_or_insert(i);
                        self.state = DataState::Normal;
                    }
                },
                DataState::SawDot => match byte {
                    b'\r' => {
                        pending_cr_pos = Some(i);
                        self.state = DataState::SawDotCr;
                    }
                    _ => {
                        // Stuffing confirmed: the dot is dropped, this byte
                        // is content.
                        dot_pos = None;
                        run_start.get_or_insert(i);
                        self.state = DataState::Normal;
                    }
                },
                DataState::SawDotCr => {
                    if byte == b'\n' {
                        // Terminator. The dot and its CRLF are dropped.
                        self.state = DataState::SawCrlf;
                        return DataScan {
                            events,
                            consumed: i + 1,
                            terminated: true,
                        };
                    }
                    // Stuffing: the dot is dropped, the CR is content.
                    dot_pos = None;
                    match pending_cr_pos.take() {
                        Some(cr) => {
                            run_start.get_or_insert(cr);
                        }
                        None => {
                            // The CR was withheld from a previous segment.
                            events.push(DataEvent::ControlByte(b'\r'));
                            run_start.get_or_insert(i);
                        }
                    }
                    self.state = if byte == b'\r' {
                        DataState::SawCr
                    } else {
                        DataState::Normal
                    };
                }
            }
            i += 1;
        }

        // End of the segment: trailing CR/CRLF is unambiguous content, only
        // a withheld dot (and its CR) crosses over, encoded in the state.
        match self.state {
            DataState::Normal | DataState::SawCr | DataState::SawCrlf => flush_run!(i),
            DataState::SawDot | DataState::SawDotCr => flush_run!(dot_pos.unwrap_or(i)),
        }

        DataScan {
            events,
            consumed: i,
            terminated: false,
        }
    }
}

/// Stream of bytes received from the client, framed on demand as command
/// lines, message content or exact-count chunks. All framers share one
/// rolling buffer, which is how bytes pipelined across a phase switch reach
/// the right framer.
pub struct Reader<R: tokio::io::AsyncRead + Unpin + Send> {
    inner: R,
    additional_reserve: usize,
    buffer: bytes::BytesMut,
    pipelining_enabled: bool,
}

impl<R: tokio::io::AsyncRead + Unpin + Send> Reader<R> {
    /// Create a new stream.
    #[must_use]
    #[inline]
    pub fn new(tcp_stream: R, enable_pipelining: bool) -> Self {
        Self {
            inner: tcp_stream,
            additional_reserve: 1024,
            buffer: bytes::BytesMut::with_capacity(1024),
            pipelining_enabled: enable_pipelining,
        }
    }

    /// Consume the instance and return the underlying reader, discarding
    /// buffered plaintext (RFC 3207 §4.2 requires it after STARTTLS).
    #[must_use]
    #[inline]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        self.buffer.reserve(self.additional_reserve);
        self.inner.read_buf(&mut self.buffer).await
    }

    /// Consume and drop buffered bytes through the next CRLF, reading as
    /// needed. Returns the number of octets dropped (CRLF excluded) or
    /// `None` on end of stream.
    async fn discard_line(&mut self) -> std::io::Result<Option<usize>> {
        let mut dropped = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buffer) {
                self.buffer.advance(pos + 2);
                return Ok(Some(dropped + pos));
            }
            // Keep one byte in case the CR of the CRLF is already buffered.
            let keep = usize::from(self.buffer.last() == Some(&b'\r'));
            dropped += self.buffer.len() - keep;
            self.buffer.advance(self.buffer.len() - keep);
            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Frame the buffered TCP window as a batch of commands. A batch ends at
    /// the end of the window, or right after a verb that switches the
    /// connection out of command framing (DATA, BDAT, STARTTLS, AUTH, QUIT),
    /// so the bytes that follow stay buffered for the next framer.
    #[inline]
    pub fn as_window_stream(
        &mut self,
    ) -> impl tokio_stream::Stream<Item = std::io::Result<Batch>> + '_ {
        let pipelined = self.pipelining_enabled;
        async_stream::stream! {
            loop {
                let mut batch: Batch = vec![];
                loop {
                    match find_crlf(&self.buffer) {
                        Some(pos) if pos > MAX_LINE_LENGTH => {
                            self.buffer.advance(pos + 2);
                            batch.push(Err(Error::line_too_long(MAX_LINE_LENGTH, pos)));
                        }
                        Some(pos) => {
                            let line = self.buffer.split_to(pos + 2);
                            let command = parse_command_line(&line);
                            let stop = !pipelined || command.0.ends_batch();
                            batch.push(Ok(command));
                            if stop {
                                break;
                            }
                        }
                        None if self.buffer.len() > MAX_LINE_LENGTH + 1 => {
                            let dropped = match self.discard_line().await {
                                Ok(Some(dropped)) => dropped,
                                Ok(None) => {
                                    yield Ok(batch);
                                    return;
                                }
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            };
                            batch.push(Err(Error::line_too_long(MAX_LINE_LENGTH, dropped)));
                        }
                        None => {
                            if !batch.is_empty() {
                                break;
                            }
                            match self.fill().await {
                                Ok(0) => {
                                    yield Ok(batch);
                                    return;
                                }
                                Ok(_) => (),
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    }
                    if self.buffer.is_empty() {
                        break;
                    }
                }
                yield Ok(batch);
            }
        }
    }

    /// Produce a stream of CRLF-terminated lines (terminator included), used
    /// by the SASL dialog. Oversized lines are discarded through their CRLF
    /// and surfaced as an error item.
    #[inline]
    pub fn as_line_stream(
        &mut self,
    ) -> impl tokio_stream::Stream<Item = Result<Vec<u8>, Error>> + '_ {
        async_stream::stream! {
            loop {
                match find_crlf(&self.buffer) {
                    Some(pos) if pos > MAX_LINE_LENGTH => {
                        self.buffer.advance(pos + 2);
                        yield Err(Error::line_too_long(MAX_LINE_LENGTH, pos));
                    }
                    Some(pos) => {
                        yield Ok(Vec::<u8>::from(self.buffer.split_to(pos + 2)));
                    }
                    None if self.buffer.len() > MAX_LINE_LENGTH + 1 => {
                        match self.discard_line().await {
                            Ok(Some(dropped)) => {
                                yield Err(Error::line_too_long(MAX_LINE_LENGTH, dropped));
                            }
                            Ok(None) => return,
                            Err(e) => {
                                yield Err(e.into());
                                return;
                            }
                        }
                    }
                    None => match self.fill().await {
                        Ok(0) => return,
                        Ok(_) => (),
                        Err(e) => {
                            yield Err(e.into());
                            return;
                        }
                    },
                }
            }
        }
    }

    /// Frame DATA message content: unstuff dots, stop at `<CRLF>.<CRLF>`,
    /// and deliver everything between as verbatim chunks. Chunks count
    /// against `size_limit`; once it is passed, delivery stops but
    /// consumption continues to the terminator, then one
    /// [`Error::message_too_big`] item ends the stream.
    #[inline]
    pub fn as_data_stream(
        &mut self,
        size_limit: u64,
    ) -> impl tokio_stream::Stream<Item = Result<bytes::Bytes, Error>> + '_ {
        async_stream::stream! {
            let mut unstuffer = DataUnstuffer::new();
            let mut delivered: u64 = 0;
            let mut exceeded = false;

            loop {
                if self.buffer.is_empty() {
                    match self.fill().await {
                        Ok(0) => {
                            yield Err(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "connection closed during message content",
                            )
                            .into());
                            return;
                        }
                        Ok(_) => (),
                        Err(e) => {
                            yield Err(e.into());
                            return;
                        }
                    }
                }

                let scan = unstuffer.feed(&self.buffer);
                let mut cursor = 0;
                for event in scan.events {
                    let chunk = match event {
                        DataEvent::ControlByte(byte) => bytes::Bytes::copy_from_slice(&[byte]),
                        DataEvent::Slice { start, end } => {
                            self.buffer.advance(start - cursor);
                            cursor = end;
                            self.buffer.split_to(end - start).freeze()
                        }
                    };
                    delivered += chunk.len() as u64;
                    if delivered > size_limit {
                        exceeded = true;
                    }
                    if !exceeded {
                        yield Ok(chunk);
                    }
                }
                self.buffer.advance(scan.consumed - cursor);

                if scan.terminated {
                    if exceeded {
                        yield Err(Error::message_too_big(size_limit));
                    }
                    return;
                }
            }
        }
    }

    /// Frame BDAT message content: exactly `count` bytes, verbatim, in one
    /// or more chunks (RFC 3030 §2). Anything already buffered beyond the
    /// count stays for the command framer.
    #[inline]
    pub fn as_bdat_stream(
        &mut self,
        count: u64,
    ) -> impl tokio_stream::Stream<Item = Result<bytes::Bytes, Error>> + '_ {
        async_stream::stream! {
            let mut remaining = count;
            while remaining > 0 {
                if self.buffer.is_empty() {
                    match self.fill().await {
                        Ok(0) => {
                            yield Err(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "connection closed during a BDAT chunk",
                            )
                            .into());
                            return;
                        }
                        Ok(_) => (),
                        Err(e) => {
                            yield Err(e.into());
                            return;
                        }
                    }
                }
                let take = usize::try_from(remaining)
                    .map_or(self.buffer.len(), |r| r.min(self.buffer.len()));
                remaining -= take as u64;
                yield Ok(self.buffer.split_to(take).freeze());
            }
        }
    }
}
