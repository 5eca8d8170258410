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
    auth::{self, AuthError},
    command::{
        AcceptArgs, AuthArgs, BdatArgs, EhloArgs, HeloArgs, MailFromArgs, RcptToArgs, XclientArgs,
    },
    handler::{
        ConnectDecision, HelloDecision, MessageDecision, RecipientDecision, SenderDecision,
    },
    reader::Reader,
    replies,
    session::Session,
    writer::WindowWriter,
    xclient, ConnectionKind, Error, ParseArgsError, ReceiverHandler, Verb,
};
use maillon_common::{
    auth::{Credentials, Mechanism},
    BodyType, ClientName, DeliveryRequirements, MailFromEnvelope, Recipient, Reply, Stage,
    TlsProperties,
};
use maillon_config::Config;
use tokio_rustls::rustls;
use tokio_stream::StreamExt;

pub(crate) enum HandshakeOutcome {
    /// DATA was accepted: run the dot-unstuffing framer.
    Message,
    /// BDAT was accepted: consume exactly `size` bytes.
    Chunk {
        size: u64,
        last: bool,
        /// The chunk passes the size limit; consume it, then refuse.
        oversize: bool,
    },
    UpgradeTls {
        config: std::sync::Arc<rustls::ServerConfig>,
        handshake_timeout: std::time::Duration,
    },
    Authenticate {
        mechanism: Mechanism,
        initial_response: Option<Vec<u8>>,
    },
    Quit,
}

/// Erroneous-command bookkeeping for the soft/hard escalation thresholds.
pub struct ErrorCounter {
    /// Erroneous commands seen so far.
    pub error_count: i64,
    /// Threshold for [`ReceiverHandler::on_soft_error`], `-1` disables.
    pub threshold_soft_error: i64,
    /// Threshold for [`ReceiverHandler::on_hard_error`], `-1` disables.
    pub threshold_hard_error: i64,
}

/// A handle the [`ReceiverHandler`] uses to influence the [`Receiver`].
#[allow(clippy::module_name_repetitions)]
#[derive(Default)]
pub struct ReceiverContext {
    pub(crate) outcome: Option<HandshakeOutcome>,
}

impl ReceiverContext {
    /// Make the [`Receiver`] quit the connection early, and close cleanly.
    #[inline]
    pub fn deny(&mut self) {
        self.outcome = Some(HandshakeOutcome::Quit);
    }
}

/// An SMTP receiver: the per-connection protocol engine.
pub struct Receiver<
    H: ReceiverHandler + Send,
    W: tokio::io::AsyncWrite + Unpin + Send,
    R: tokio::io::AsyncRead + Unpin + Send,
> {
    pub(crate) sink: WindowWriter<W>,
    pub(crate) stream: Reader<R>,
    error_counter: ErrorCounter,
    context: ReceiverContext,
    kind: ConnectionKind,
    config: std::sync::Arc<Config>,
    h: std::marker::PhantomData<H>,
}

impl<H: ReceiverHandler + Send>
    Receiver<H, tokio::net::tcp::OwnedWriteHalf, tokio::net::tcp::OwnedReadHalf>
{
    /// Create a new [`Receiver`] from a TCP/IP stream.
    #[inline]
    #[must_use]
    pub fn new(
        tcp_stream: tokio::net::TcpStream,
        kind: ConnectionKind,
        config: std::sync::Arc<Config>,
    ) -> Self {
        let (read, write) = tcp_stream.into_split();
        let (stream, sink) = (
            Reader::new(read, config.esmtp.pipelining),
            WindowWriter::new(write),
        );
        Self {
            sink,
            stream,
            error_counter: ErrorCounter {
                error_count: 0,
                threshold_soft_error: config.error.soft_count,
                threshold_hard_error: config.error.hard_count,
            },
            context: ReceiverContext::default(),
            kind,
            config,
            h: std::marker::PhantomData,
        }
    }

    /// Handle the connection to produce a [`tokio_stream::Stream`], each
    /// item being a successfully completed SMTP transaction.
    #[inline]
    pub fn into_stream<Fun, Future>(
        self,
        on_accept: Fun,
        client_addr: std::net::SocketAddr,
        server_addr: std::net::SocketAddr,
        timestamp: time::OffsetDateTime,
        uuid: uuid::Uuid,
    ) -> impl tokio_stream::Stream<Item = Result<(), ()>>
    where
        Fun: FnOnce(&AcceptArgs) -> Future,
        Future: std::future::Future<Output = (H, ConnectDecision)>,
    {
        self.into_stream_with_error(on_accept, client_addr, server_addr, timestamp, uuid)
            .map(|item| match item {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::error!(?e);
                    Err(())
                }
            })
    }

    fn into_stream_with_error<Fun, Future>(
        mut self,
        on_accept: Fun,
        client_addr: std::net::SocketAddr,
        server_addr: std::net::SocketAddr,
        timestamp: time::OffsetDateTime,
        uuid: uuid::Uuid,
    ) -> impl tokio_stream::Stream<Item = Result<(), Error>>
    where
        Fun: FnOnce(&AcceptArgs) -> Future,
        Future: std::future::Future<Output = (H, ConnectDecision)>,
    {
        async_stream::try_stream! {
            let args = AcceptArgs::new(client_addr, server_addr, timestamp, uuid, self.kind);
            let mut session = Session::new(&self.config, &args);
            let (mut handler, decision) = on_accept(&args).await;

            if self.kind == ConnectionKind::Tunneled {
                let Some(tls_config) = handler.tls_config() else {
                    Err::<(), Error>(Error::from(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "tunneled connection without a TLS configuration",
                    )))?;
                    return;
                };
                let handshake_timeout = self.config.timeouts.tls_handshake;
                for await item in
                    self.upgrade_tls(handler, session, tls_config, handshake_timeout, Some(decision))
                {
                    yield item?;
                }
                return;
            }

            match decision {
                ConnectDecision::Accept { greeting } => {
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            &mut handler,
                            replies::greeting(&greeting),
                        )
                        .await?;
                }
                ConnectDecision::Reject { message } => {
                    session.rejected = true;
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            &mut handler,
                            replies::connection_rejected(&message),
                        )
                        .await?;
                }
                ConnectDecision::ShuttingDown => {
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            &mut handler,
                            replies::shutting_down(),
                        )
                        .await?;
                    return;
                }
            }

            loop {
                match self.smtp_handshake(&mut handler, &mut session).await? {
                    HandshakeOutcome::Message => {
                        self.handle_message(&mut handler, &mut session).await?;
                        yield ();
                    }
                    HandshakeOutcome::Chunk { size, last, oversize } => {
                        if self
                            .handle_chunk(&mut handler, &mut session, size, last, oversize)
                            .await?
                        {
                            yield ();
                        }
                    }
                    HandshakeOutcome::Authenticate { mechanism, initial_response } => {
                        if !self
                            .handle_authenticate(&mut handler, &mut session, mechanism, initial_response)
                            .await?
                        {
                            return;
                        }
                    }
                    HandshakeOutcome::UpgradeTls { config, handshake_timeout } => {
                        for await item in
                            self.upgrade_tls(handler, session, config, handshake_timeout, None)
                        {
                            yield item?;
                        }
                        return;
                    }
                    HandshakeOutcome::Quit => break,
                }
            }
        }
    }

    fn upgrade_tls(
        self,
        handler: H,
        mut session: Session,
        tls_config: std::sync::Arc<rustls::ServerConfig>,
        handshake_timeout: std::time::Duration,
        accept_decision: Option<ConnectDecision>,
    ) -> impl tokio_stream::Stream<Item = Result<(), Error>> {
        async_stream::stream! {
            let Self { sink, stream, error_counter, context, kind, config, h } = self;
            #[allow(clippy::expect_used)]
            let tcp_stream = sink
                .into_inner()
                .reunite(stream.into_inner())
                .expect("valid stream/sink pair");

            let acceptor = tokio_rustls::TlsAcceptor::from(tls_config);
            let tls_tcp_stream = match tokio::time::timeout(
                handshake_timeout,
                acceptor.accept(tcp_stream),
            )
            .await
            {
                Ok(Ok(tls_tcp_stream)) => tls_tcp_stream,
                Ok(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                Err(_elapsed) => {
                    yield Err(Error::timeout(handshake_timeout, "tls handshake timed out"));
                    return;
                }
            };

            let tls_state = tls_tcp_stream.get_ref().1;
            #[allow(clippy::expect_used)]
            let protocol_version = tls_state
                .protocol_version()
                .expect("tls handshake completed");
            #[allow(clippy::expect_used)]
            let negotiated_cipher_suite = tls_state
                .negotiated_cipher_suite()
                .expect("tls handshake completed");
            let properties = TlsProperties {
                protocol_version,
                cipher_suite: negotiated_cipher_suite.suite(),
                sni: tls_state.sni_hostname().map(str::to_string),
                peer_certificates: tls_state
                    .peer_certificates()
                    .map(<[rustls::Certificate]>::to_vec),
                alpn_protocol: tls_state.alpn_protocol().map(<[u8]>::to_vec),
            };
            if let Err(e) = session.secure(properties) {
                yield Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    e.to_string(),
                )
                .into());
                return;
            }
            session.starttls_used = true;

            // FIXME: see https://github.com/tokio-rs/tls/issues/40
            let (read, write) = tokio::io::split(tls_tcp_stream);

            let secured_receiver = Receiver {
                sink: WindowWriter::new(write),
                stream: Reader::new(read, config.esmtp.pipelining),
                error_counter,
                context,
                kind,
                config,
                h,
            }
            .into_secured_stream(handler, session, accept_decision);

            for await item in secured_receiver {
                yield item;
            }
        }
    }
}

impl<
        H: ReceiverHandler + Send,
        W: tokio::io::AsyncWrite + Unpin + Send,
        R: tokio::io::AsyncRead + Unpin + Send,
    > Receiver<H, W, R>
{
    #[allow(clippy::panic)]
    fn into_secured_stream(
        mut self,
        mut handler: H,
        mut session: Session,
        accept_decision: Option<ConnectDecision>,
    ) -> impl tokio_stream::Stream<Item = Result<(), Error>> {
        async_stream::try_stream! {
            match accept_decision {
                None => (),
                Some(ConnectDecision::Accept { greeting }) => {
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            &mut handler,
                            replies::greeting(&greeting),
                        )
                        .await?;
                }
                Some(ConnectDecision::Reject { message }) => {
                    session.rejected = true;
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            &mut handler,
                            replies::connection_rejected(&message),
                        )
                        .await?;
                }
                Some(ConnectDecision::ShuttingDown) => {
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            &mut handler,
                            replies::shutting_down(),
                        )
                        .await?;
                    return;
                }
            }

            loop {
                match self.smtp_handshake(&mut handler, &mut session).await? {
                    HandshakeOutcome::Message => {
                        self.handle_message(&mut handler, &mut session).await?;
                        yield ();
                    }
                    HandshakeOutcome::Chunk { size, last, oversize } => {
                        if self
                            .handle_chunk(&mut handler, &mut session, size, last, oversize)
                            .await?
                        {
                            yield ();
                        }
                    }
                    HandshakeOutcome::Authenticate { mechanism, initial_response } => {
                        if !self
                            .handle_authenticate(&mut handler, &mut session, mechanism, initial_response)
                            .await?
                        {
                            return;
                        }
                    }
                    HandshakeOutcome::UpgradeTls { .. } => {
                        panic!("smtp_handshake does not upgrade a secured connection")
                    }
                    HandshakeOutcome::Quit => break,
                }
            }
        }
    }

    /// Read and dispatch command windows until the connection changes phase:
    /// message content, a SASL exchange, a TLS upgrade, or closing.
    #[allow(clippy::too_many_lines)]
    async fn smtp_handshake(
        &mut self,
        handler: &mut H,
        session: &mut Session,
    ) -> Result<HandshakeOutcome, Error> {
        let command_timeout = self.config.timeouts.command;
        let command_stream = self.stream.as_window_stream().timeout(command_timeout);
        tokio::pin!(command_stream);

        loop {
            let batch = match command_stream.try_next().await {
                Ok(Some(Ok(batch))) if !batch.is_empty() => batch,
                Ok(Some(Err(e))) => return Err(e.into()),
                Err(_elapsed) => {
                    tracing::warn!(
                        "closing after {:?} without receiving a command",
                        command_timeout
                    );
                    self.sink
                        .direct_send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            handler,
                            replies::timeout(),
                        )
                        .await?;
                    return Ok(HandshakeOutcome::Quit);
                }
                _ => return Ok(HandshakeOutcome::Quit),
            };

            for command in batch {
                let (verb, args) = match command {
                    Ok(command) => command,
                    Err(e) => {
                        let reply = match e.as_parse_error() {
                            Some(parse_error) => replies::from_parse_error(parse_error),
                            None => return Err(e),
                        };
                        self.sink
                            .send_reply(
                                &mut self.context,
                                &mut self.error_counter,
                                handler,
                                reply,
                                Verb::Unknown,
                            )
                            .await?;
                        continue;
                    }
                };
                tracing::trace!("<< {:?} ; {:?}", verb, std::str::from_utf8(&args.0));

                let stage = session.stage();
                let reply = match (verb, stage) {
                    (Verb::Quit, _) => {
                        self.context.outcome = Some(HandshakeOutcome::Quit);
                        Some(replies::quit())
                    }
                    (_, Stage::Rejected) => Some(replies::rejected_session()),

                    (Verb::Helo, Stage::Connect | Stage::Helo) => {
                        Some(match HeloArgs::try_from(args) {
                            Err(e) => replies::from_parse_error(&e),
                            Ok(helo) => match handler.on_helo(&mut self.context, &helo).await {
                                HelloDecision::Accept => {
                                    let client_name = ClientName::Domain(helo.client_name);
                                    let reply = replies::helo_ok(&self.config.name, &client_name);
                                    #[allow(clippy::expect_used)]
                                    session
                                        .context
                                        .to_helo(client_name, true)
                                        .expect("hello stage was checked");
                                    session.extended = false;
                                    reply
                                }
                                HelloDecision::Reject { message } => replies::reject_hello(&message),
                                HelloDecision::RejectTemporary { message } => {
                                    replies::reject_hello_temporary(&message)
                                }
                            },
                        })
                    }
                    (Verb::Ehlo, Stage::Connect | Stage::Helo) => {
                        Some(match EhloArgs::try_from(args) {
                            Err(e) => replies::from_parse_error(&e),
                            Ok(ehlo) => match handler.on_ehlo(&mut self.context, &ehlo).await {
                                HelloDecision::Accept => {
                                    let secured = session.context.is_secured();
                                    let view = replies::CapabilityView {
                                        secured,
                                        starttls_offered: !secured
                                            && !session.starttls_used
                                            && handler.tls_config().is_some(),
                                        xclient_authorized: self
                                            .config
                                            .is_xclient_authorized(session.peer_addr.ip()),
                                        mechanisms: handler
                                            .realm()
                                            .map(|realm| realm.mechanisms())
                                            .unwrap_or_default(),
                                    };
                                    #[allow(clippy::expect_used)]
                                    session
                                        .context
                                        .to_helo(ehlo.client_name, false)
                                        .expect("hello stage was checked");
                                    session.extended = true;
                                    replies::capabilities(&self.config, &view)
                                }
                                HelloDecision::Reject { message } => replies::reject_hello(&message),
                                HelloDecision::RejectTemporary { message } => {
                                    replies::reject_hello_temporary(&message)
                                }
                            },
                        })
                    }

                    (Verb::MailFrom, Stage::Helo) => {
                        // Precondition order: quota, authentication, then
                        // the address and its parameters.
                        if self.config.transaction_count_max > 0
                            && session.transaction_count >= self.config.transaction_count_max
                        {
                            self.context.outcome = Some(HandshakeOutcome::Quit);
                            Some(replies::transaction_limit_reached())
                        } else if self.config.require_auth
                            && !session.context.is_authenticated()
                        {
                            Some(replies::auth_required())
                        } else {
                            match MailFromArgs::try_from(args) {
                                Err(e) => Some(replies::from_parse_error(&e)),
                                Ok(mail) => Some(
                                    Self::dispatch_mail_from(
                                        &mut self.context,
                                        &self.config,
                                        handler,
                                        session,
                                        mail,
                                    )
                                    .await,
                                ),
                            }
                        }
                    }
                    (Verb::RcptTo, Stage::MailFrom | Stage::RcptTo) => {
                        if session.context.recipient_count() >= self.config.recipient_count_max {
                            Some(replies::too_many_recipients())
                        } else {
                            match RcptToArgs::try_from(args) {
                                Err(e) => Some(replies::from_parse_error(&e)),
                                Ok(rcpt) => Some(
                                    Self::dispatch_rcpt_to(
                                        &mut self.context,
                                        handler,
                                        session,
                                        rcpt,
                                    )
                                    .await,
                                ),
                            }
                        }
                    }

                    (Verb::Data, Stage::RcptTo) => {
                        if session.bdat_started {
                            Some(replies::bad_sequence())
                        } else if session.context.body_type() == BodyType::BinaryMime {
                            Some(replies::binarymime_requires_bdat())
                        } else {
                            handler.on_data_start(&mut self.context).await;
                            self.context.outcome = Some(HandshakeOutcome::Message);
                            Some(replies::start_mail_input())
                        }
                    }
                    (Verb::Bdat, Stage::RcptTo) => {
                        if session.extended {
                            match BdatArgs::try_from(args) {
                                Err(e) => Some(replies::from_parse_error(&e)),
                                Ok(chunk) => {
                                    let oversize = session.bdat_total.saturating_add(chunk.size)
                                        > self.config.message_size_limit;
                                    if !oversize {
                                        session.bdat_started = true;
                                    }
                                    self.context.outcome = Some(HandshakeOutcome::Chunk {
                                        size: chunk.size,
                                        last: chunk.last,
                                        oversize,
                                    });
                                    None
                                }
                            }
                        } else {
                            Some(replies::chunking_requires_ehlo())
                        }
                    }

                    (Verb::Rset, Stage::Helo | Stage::MailFrom | Stage::RcptTo) => {
                        session.reset_transaction();
                        if let Some(pipeline) = handler.pipeline() {
                            pipeline.reset().await;
                        }
                        handler.on_reset().await;
                        Some(replies::reset_ok())
                    }
                    (Verb::Noop, Stage::Helo | Stage::MailFrom | Stage::RcptTo) => {
                        Some(replies::noop())
                    }
                    (Verb::Help, Stage::Helo | Stage::MailFrom | Stage::RcptTo) => {
                        Some(replies::help())
                    }
                    (Verb::Vrfy, Stage::Helo) => Some(replies::vrfy()),
                    (Verb::Expn, Stage::Helo) => Some(replies::expn()),

                    (Verb::StartTls, Stage::Connect | Stage::Helo) => {
                        if session.context.is_secured() || session.starttls_used {
                            Some(replies::starttls_already_active())
                        } else if let Some(tls_config) = handler.tls_config() {
                            self.sink
                                .direct_send_reply(
                                    &mut self.context,
                                    &mut self.error_counter,
                                    handler,
                                    replies::starttls_ready(),
                                )
                                .await?;
                            self.context.outcome = Some(HandshakeOutcome::UpgradeTls {
                                config: tls_config,
                                handshake_timeout: self.config.timeouts.tls_handshake,
                            });
                            None
                        } else {
                            Some(replies::starttls_unavailable())
                        }
                    }

                    (Verb::Auth, Stage::Connect) => Some(replies::auth_requires_ehlo()),
                    (Verb::Auth, Stage::Helo) => {
                        if session.context.is_authenticated() {
                            Some(replies::already_authenticated())
                        } else if !session.extended {
                            Some(replies::auth_requires_ehlo())
                        } else if let Some(realm) = handler.realm() {
                            match AuthArgs::try_from(args) {
                                Err(
                                    e @ (ParseArgsError::NotAscii
                                    | ParseArgsError::InvalidUtf8(_)
                                    | ParseArgsError::InvalidUtf8Ref(_)),
                                ) => Some(replies::from_parse_error(&e)),
                                Err(_e) => Some(replies::auth_mechanism_not_supported()),
                                Ok(auth) => {
                                    if !auth.mechanism.is_supported()
                                        || !realm.mechanisms().contains(&auth.mechanism)
                                    {
                                        Some(replies::auth_mechanism_not_supported())
                                    } else if self.config.auth_require_tls
                                        && auth.mechanism.must_be_under_tls()
                                        && !session.context.is_secured()
                                    {
                                        Some(replies::auth_mechanism_requires_tls())
                                    } else {
                                        self.context.outcome =
                                            Some(HandshakeOutcome::Authenticate {
                                                mechanism: auth.mechanism,
                                                initial_response: auth.initial_response,
                                            });
                                        None
                                    }
                                }
                            }
                        } else {
                            Some(replies::auth_not_available())
                        }
                    }

                    (Verb::Xclient, Stage::Connect | Stage::Helo) => {
                        if self.config.is_xclient_authorized(session.peer_addr.ip()) {
                            match XclientArgs::try_from(args) {
                                Err(e) => Some(replies::from_parse_error(&e)),
                                Ok(overrides) => {
                                    Some(xclient::apply(session, &self.config, overrides))
                                }
                            }
                        } else {
                            tracing::warn!(
                                peer = %session.peer_addr,
                                "unauthorized xclient attempt",
                            );
                            Some(replies::xclient_denied())
                        }
                    }
                    (Verb::Xclient, Stage::MailFrom | Stage::RcptTo) => {
                        Some(replies::xclient_in_transaction())
                    }

                    (Verb::Unknown, _) => Some(replies::unknown_command()),
                    otherwise => {
                        tracing::debug!(?otherwise, "command out of sequence");
                        Some(replies::bad_sequence())
                    }
                };

                if let Some(reply) = reply {
                    self.sink
                        .send_reply(
                            &mut self.context,
                            &mut self.error_counter,
                            handler,
                            reply,
                            verb,
                        )
                        .await?;
                }
                if self.context.outcome.is_some() {
                    break;
                }
            }

            if !self.sink.is_empty() {
                self.sink.flush().await?;
            }
            if let Some(done) = std::mem::take(&mut self.context).outcome {
                return Ok(done);
            }
        }
    }

    /// MAIL FROM parameter preconditions (gating, TLS, size) and sender
    /// authorisation, then the sender decision. The quota and
    /// authentication gates run in the dispatch arm, before parsing.
    async fn dispatch_mail_from(
        context: &mut ReceiverContext,
        config: &Config,
        handler: &mut H,
        session: &mut Session,
        mail: MailFromArgs,
    ) -> Reply {
        if mail.has_extension_parameters && !session.extended {
            return replies::esmtp_parameters_require_ehlo();
        }
        if mail.require_tls && !session.context.is_secured() {
            return replies::requiretls_needs_tls();
        }
        if mail
            .size
            .map_or(false, |size| size > config.message_size_limit)
        {
            return replies::message_too_big();
        }
        if session.context.is_authenticated() {
            if let (Some(principal), Some(sender)) =
                (session.context.principal(), mail.reverse_path.as_ref())
            {
                let realm = handler.realm();
                match auth::sender_authorized(realm.as_deref(), principal, sender).await {
                    Ok(true) => (),
                    Ok(false) => return replies::sender_not_authorized(),
                    Err(error) => {
                        tracing::error!(%error, "realm failure during sender authorisation");
                        return replies::local_error();
                    }
                }
            }
        }

        match handler.on_mail_from(context, &mail).await {
            SenderDecision::Accept => {
                let release_at = match (mail.hold_until, mail.hold_for) {
                    (Some(until), _) => Some(until),
                    (None, Some(seconds)) => Some(
                        time::OffsetDateTime::now_utc()
                            + std::time::Duration::from_secs(seconds),
                    ),
                    (None, None) => None,
                };
                let envelope = MailFromEnvelope {
                    reverse_path: mail.reverse_path.clone(),
                    utf8: mail.use_smtputf8,
                    body_type: mail.body_type.unwrap_or_default(),
                    size_hint: mail.size,
                    envelope_id: mail.envelope_id.clone(),
                    dsn_return: mail.ret,
                    requirements: DeliveryRequirements {
                        require_tls: mail.require_tls,
                        priority: mail.priority,
                        release_at,
                        deliver_by: mail.deliver_by,
                    },
                };
                #[allow(clippy::expect_used)]
                session
                    .context
                    .to_mail_from(envelope, time::OffsetDateTime::now_utc())
                    .expect("hello stage was checked");
                if let Some(pipeline) = handler.pipeline() {
                    pipeline.mail_from(&mail.reverse_path).await;
                }
                replies::sender_ok()
            }
            SenderDecision::Greylist => replies::sender_greylist(),
            SenderDecision::RateLimit => replies::sender_rate_limit(),
            SenderDecision::StorageFull => replies::sender_storage_full(),
            SenderDecision::BlockedDomain => replies::sender_blocked_domain(),
            SenderDecision::InvalidDomain => replies::sender_invalid_domain(),
            SenderDecision::Policy { message } => replies::sender_policy(&message),
            SenderDecision::Spam => replies::sender_spam(),
            SenderDecision::Syntax => replies::sender_syntax(),
        }
    }

    async fn dispatch_rcpt_to(
        context: &mut ReceiverContext,
        handler: &mut H,
        session: &mut Session,
        rcpt: RcptToArgs,
    ) -> Reply {
        if rcpt.has_extension_parameters && !session.extended {
            return replies::esmtp_parameters_require_ehlo();
        }
        if rcpt.forward_path.needs_smtputf8() && !session.context.is_utf8_advertised() {
            return replies::smtputf8_required_for_recipient();
        }

        match handler.on_rcpt_to(context, &rcpt).await {
            decision @ (RecipientDecision::Accept | RecipientDecision::Forward { .. }) => {
                let reply = match &decision {
                    RecipientDecision::Forward { path } => replies::recipient_forward(path),
                    _ => replies::recipient_ok(&rcpt.forward_path),
                };
                #[allow(clippy::expect_used)]
                session
                    .context
                    .add_forward_path(Recipient {
                        forward_path: rcpt.forward_path.clone(),
                        notify_on: rcpt.notify_on.clone(),
                        original_forward_path: rcpt.original_forward_path.clone(),
                    })
                    .expect("transaction stage was checked");
                if let Some(pipeline) = handler.pipeline() {
                    pipeline.rcpt_to(&rcpt.forward_path).await;
                }
                reply
            }
            RecipientDecision::Greylist => replies::recipient_greylist(),
            RecipientDecision::Temporary { message } => replies::recipient_temporary(&message),
            RecipientDecision::StorageFull => replies::recipient_storage_full(),
            RecipientDecision::UnknownMailbox => replies::recipient_unknown(),
            RecipientDecision::NotLocal => replies::recipient_not_local(),
            RecipientDecision::MailboxFull => replies::recipient_mailbox_full(),
            RecipientDecision::Policy { message } => replies::recipient_policy(&message),
        }
    }

    /// Run the DATA framer, forwarding clean chunks to the application, and
    /// settle the transaction on the terminator.
    async fn handle_message(
        &mut self,
        handler: &mut H,
        session: &mut Session,
    ) -> Result<(), Error> {
        let mut delivered: u64 = 0;
        let mut oversize = false;
        {
            let message_stream = self.stream.as_data_stream(self.config.message_size_limit);
            tokio::pin!(message_stream);
            while let Some(item) = message_stream.next().await {
                match item {
                    Ok(chunk) => {
                        delivered += chunk.len() as u64;
                        handler.on_message_content(&mut self.context, &chunk).await;
                        if let Some(pipeline) = handler.pipeline() {
                            pipeline.content(&chunk).await;
                        }
                    }
                    Err(e)
                        if matches!(
                            e.as_parse_error(),
                            Some(ParseArgsError::MessageTooBig { .. })
                        ) =>
                    {
                        oversize = true;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if oversize {
            tracing::warn!(
                limit = self.config.message_size_limit,
                "message content exceeded the size limit",
            );
            session.reset_transaction();
            if let Some(pipeline) = handler.pipeline() {
                pipeline.reset().await;
            }
            self.sink
                .direct_send_reply(
                    &mut self.context,
                    &mut self.error_counter,
                    handler,
                    replies::message_too_big(),
                )
                .await?;
            return Ok(());
        }
        self.finish_message(handler, session, delivered, None).await
    }

    /// Consume one BDAT chunk. Returns whether a message was completed.
    async fn handle_chunk(
        &mut self,
        handler: &mut H,
        session: &mut Session,
        size: u64,
        last: bool,
        oversize: bool,
    ) -> Result<bool, Error> {
        {
            let chunk_stream = self.stream.as_bdat_stream(size);
            tokio::pin!(chunk_stream);
            while let Some(item) = chunk_stream.next().await {
                let chunk = item?;
                if oversize {
                    // RFC 3030 §4.2: the chunk must be consumed even when
                    // the message is being refused.
                    continue;
                }
                session.bdat_total += chunk.len() as u64;
                handler.on_message_content(&mut self.context, &chunk).await;
                if let Some(pipeline) = handler.pipeline() {
                    pipeline.content(&chunk).await;
                }
            }
        }

        if oversize {
            tracing::warn!(
                limit = self.config.message_size_limit,
                "chunked message exceeded the size limit",
            );
            session.reset_transaction();
            if let Some(pipeline) = handler.pipeline() {
                pipeline.reset().await;
            }
            self.sink
                .direct_send_reply(
                    &mut self.context,
                    &mut self.error_counter,
                    handler,
                    replies::message_too_big(),
                )
                .await?;
            return Ok(false);
        }

        if last {
            let total = session.bdat_total;
            self.finish_message(handler, session, total, Some(total))
                .await?;
            return Ok(true);
        }
        self.sink
            .direct_send_reply(
                &mut self.context,
                &mut self.error_counter,
                handler,
                replies::chunk_received(size),
            )
            .await?;
        Ok(false)
    }

    async fn finish_message(
        &mut self,
        handler: &mut H,
        session: &mut Session,
        delivered: u64,
        chunked: Option<u64>,
    ) -> Result<(), Error> {
        #[allow(clippy::expect_used)]
        session
            .context
            .to_finished(delivered)
            .expect("rcpt stage was checked");
        #[allow(clippy::expect_used)]
        let envelope = session
            .context
            .clone()
            .unwrap_finished()
            .expect("finished just above");

        let decision = handler.on_message_complete(&mut self.context, &envelope).await;
        if let Some(pipeline) = handler.pipeline() {
            pipeline.end_data().await;
        }
        let reply = match decision {
            MessageDecision::Accept { queue_id } => {
                tracing::debug!(
                    message_uuid = %envelope.mail_from.message_uuid,
                    delivered,
                    "message accepted",
                );
                replies::message_delivered(queue_id.as_deref(), chunked)
            }
            MessageDecision::Temporary { message } => replies::message_temporary(&message),
            MessageDecision::Permanent { message } => replies::message_permanent(&message),
            MessageDecision::Policy { message } => replies::message_policy(&message),
        };

        session.transaction_count += 1;
        session.reset_transaction();
        self.sink
            .direct_send_reply(&mut self.context, &mut self.error_counter, handler, reply)
            .await?;
        Ok(())
    }

    /// Run one SASL exchange. Returns whether the connection continues.
    async fn handle_authenticate(
        &mut self,
        handler: &mut H,
        session: &mut Session,
        mechanism: Mechanism,
        initial_response: Option<Vec<u8>>,
    ) -> Result<bool, Error> {
        if !self.sink.is_empty() {
            self.sink.flush().await?;
        }
        let Some(realm) = handler.realm() else {
            self.sink
                .direct_send_reply(
                    &mut self.context,
                    &mut self.error_counter,
                    handler,
                    replies::auth_not_available(),
                )
                .await?;
            return Ok(true);
        };

        let result = auth::authenticate(
            &mut self.stream,
            self.sink.as_mut(),
            realm.as_ref(),
            mechanism,
            initial_response,
            &self.config.name,
            self.config.timeouts.command,
        )
        .await;

        let reply = match result {
            Ok(authid) => {
                tracing::info!(%mechanism, %authid, "authentication succeeded");
                session.context.set_credentials(Credentials {
                    authid: authid.clone(),
                    mechanism,
                });
                handler.on_authenticated(&mut self.context, &authid).await;
                replies::auth_succeeded()
            }
            Err(AuthError::Io(e)) => return Err(e),
            Err(AuthError::Timeout) => {
                self.sink
                    .direct_send_reply(
                        &mut self.context,
                        &mut self.error_counter,
                        handler,
                        replies::timeout(),
                    )
                    .await?;
                return Ok(false);
            }
            Err(error) => {
                tracing::warn!(%mechanism, %error, "authentication failed");
                session.context.count_auth_failure();
                match error {
                    AuthError::Cancelled => replies::auth_cancelled(),
                    AuthError::Malformed => replies::auth_malformed(),
                    AuthError::UnsupportedMechanism => replies::auth_mechanism_not_supported(),
                    AuthError::ClientMustNotStart => replies::auth_client_must_not_start(),
                    AuthError::Unavailable => replies::local_error(),
                    _ => replies::auth_failed(),
                }
            }
        };
        self.sink
            .direct_send_reply(&mut self.context, &mut self.error_counter, handler, reply)
            .await?;
        Ok(true)
    }
}
