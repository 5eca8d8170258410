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

use crate::{receiver::ErrorCounter, ReceiverContext, ReceiverHandler, Verb};
use maillon_common::Reply;
use tokio::io::AsyncWriteExt;

/// Reply sink with a pipelining window: replies to bufferable verbs are
/// withheld and sent in one write at the end of the command window
/// (RFC 2920 §3.2).
#[allow(clippy::module_name_repetitions)]
pub struct WindowWriter<W: tokio::io::AsyncWrite + Unpin + Send> {
    inner: W,
    buffer: Vec<Reply>,
}

impl<W: tokio::io::AsyncWrite + Unpin + Send> AsMut<W> for WindowWriter<W> {
    #[inline]
    fn as_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: tokio::io::AsyncWrite + Unpin + Send> WindowWriter<W> {
    /// Create a new instance.
    #[inline]
    #[must_use]
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::<Reply>::new(),
        }
    }

    /// Consume the instance and return the underlying writer.
    #[inline]
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Are there withheld replies?
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Send the buffer to the client.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying writer
    #[inline]
    pub async fn write_all(&mut self, buffer: &str) -> std::io::Result<()> {
        tracing::trace!(">> {:?}", buffer);
        self.write_all_bytes(buffer.as_bytes()).await
    }

    /// Send the buffer to the client.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying writer
    #[inline]
    pub async fn write_all_bytes(&mut self, buffer: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buffer).await
    }

    /// Feed an erroneous reply into the counter; once a threshold is
    /// crossed, the handler substitutes the escalated reply.
    async fn escalate<T: ReceiverHandler + Send>(
        &mut self,
        ctx: &mut ReceiverContext,
        counter: &mut ErrorCounter,
        handler: &mut T,
        reply: Reply,
    ) -> Reply {
        if !reply.code().is_error() {
            return reply;
        }
        counter.error_count += 1;
        let crossed =
            |threshold: i64| threshold != -1 && counter.error_count >= threshold;

        if crossed(counter.threshold_hard_error) {
            handler.on_hard_error(ctx, reply).await
        } else if crossed(counter.threshold_soft_error) {
            handler.on_soft_error(ctx, reply).await
        } else {
            reply
        }
    }

    /// Send a reply immediately, flushing any withheld replies first so
    /// ordering is preserved.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying writer
    pub async fn direct_send_reply<T: ReceiverHandler + Send>(
        &mut self,
        ctx: &mut ReceiverContext,
        error_counter: &mut ErrorCounter,
        handler: &mut T,
        reply: Reply,
    ) -> std::io::Result<()> {
        let final_reply = self.escalate(ctx, error_counter, handler, reply).await;
        if !self.buffer.is_empty() {
            self.flush().await?;
        }
        self.write_all(final_reply.as_ref()).await
    }

    /// Withhold the reply when its verb allows it, otherwise send it (and
    /// everything withheld before it) right away.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying writer
    pub async fn send_reply<T: ReceiverHandler + Send>(
        &mut self,
        ctx: &mut ReceiverContext,
        error_counter: &mut ErrorCounter,
        handler: &mut T,
        reply: Reply,
        verb: Verb,
    ) -> std::io::Result<()> {
        let final_reply = self.escalate(ctx, error_counter, handler, reply).await;
        if verb.is_bufferable() {
            self.buffer.push(final_reply);
            return Ok(());
        }
        if !self.buffer.is_empty() {
            self.flush().await?;
        }
        self.write_all(final_reply.as_ref()).await
    }

    /// Send every withheld reply in one write.
    ///
    /// # Errors
    ///
    /// * [`std::io::Error`] produced by the underlying writer
    pub async fn flush(&mut self) -> std::io::Result<()> {
        let full_response = self
            .buffer
            .drain(..)
            .map(|reply| reply.as_ref().to_owned())
            .collect::<Vec<_>>();
        self.write_all(full_response.concat().as_str()).await
    }
}
