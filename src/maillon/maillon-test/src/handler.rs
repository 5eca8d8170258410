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

use maillon_common::ContextFinished;
use maillon_protocol::{
    ConnectDecision, EhloArgs, HeloArgs, HelloDecision, MailFromArgs, MessageDecision,
    RcptToArgs, Realm, ReceiverContext, ReceiverHandler, RecipientDecision, SenderDecision,
};
use tokio_rustls::rustls;

/// A message as the application saw it.
pub struct ReceivedMessage {
    /// The completed envelope.
    pub envelope: ContextFinished,
    /// The content bytes, exactly as delivered.
    pub content: Vec<u8>,
}

/// Shared record of everything the handler accepted.
pub type Received = std::sync::Arc<std::sync::Mutex<Vec<ReceivedMessage>>>;

/// In-memory credential store for AUTH suites.
pub struct TestRealm {
    users: std::collections::HashMap<String, String>,
    admins: Vec<String>,
}

impl TestRealm {
    /// A realm knowing the given user/password pairs.
    #[must_use]
    pub fn new<const N: usize>(users: [(&str, &str); N]) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|(user, password)| (user.to_owned(), password.to_owned()))
                .collect(),
            admins: vec![],
        }
    }

    /// Grant the `admin` role to a user.
    #[must_use]
    pub fn with_admin(mut self, user: &str) -> Self {
        self.admins.push(user.to_owned());
        self
    }
}

#[async_trait::async_trait]
impl Realm for TestRealm {
    async fn verify_password(&self, authcid: &str, password: &str) -> anyhow::Result<bool> {
        Ok(self.users.get(authcid).map(String::as_str) == Some(password))
    }

    async fn stored_password(&self, authcid: &str) -> anyhow::Result<Option<String>> {
        Ok(self.users.get(authcid).cloned())
    }

    async fn has_role(&self, principal: &str, role: &str) -> anyhow::Result<bool> {
        Ok(matches!(role, "admin" | "postmaster") && self.admins.iter().any(|a| a == principal))
    }
}

/// The canonical suite handler: accepts everything, records every completed
/// message, and can be bent towards specific decisions per test.
pub struct TestHandler {
    /// Banner text of the `220` greeting.
    pub greeting: String,
    /// Refuse the connection with this message (`554`, session stays open).
    pub reject_connection: Option<String>,
    /// Answer the greeting with `421` and close.
    pub shutting_down: bool,
    /// Realm offered for AUTH.
    pub realm: Option<std::sync::Arc<TestRealm>>,
    /// TLS offered for STARTTLS.
    pub tls: Option<std::sync::Arc<rustls::ServerConfig>>,
    /// Overrides the MAIL FROM decision (default accept).
    pub sender_decision: Option<SenderDecision>,
    /// Recipients in these domains are refused with a policy reply.
    pub blocked_recipient_domains: Vec<String>,
    /// Queue identifier returned on message acceptance.
    pub queue_id: Option<String>,
    /// Everything accepted so far.
    pub received: Received,
    content: Vec<u8>,
}

impl TestHandler {
    /// A handler accepting every stage.
    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            greeting: "testserver.com Service ready".to_owned(),
            reject_connection: None,
            shutting_down: false,
            realm: None,
            tls: None,
            sender_decision: None,
            blocked_recipient_domains: vec![],
            queue_id: None,
            received: Received::default(),
            content: vec![],
        }
    }

    /// Offer AUTH backed by the given realm.
    #[must_use]
    pub fn with_realm(mut self, realm: TestRealm) -> Self {
        self.realm = Some(std::sync::Arc::new(realm));
        self
    }

    /// Offer STARTTLS with a fresh self-signed certificate.
    #[must_use]
    pub fn with_tls(mut self) -> Self {
        self.tls = Some(crate::tls::server_config());
        self
    }

    /// The connection-established decision this handler scripts.
    #[must_use]
    pub fn connect_decision(&self) -> ConnectDecision {
        if self.shutting_down {
            return ConnectDecision::ShuttingDown;
        }
        match &self.reject_connection {
            Some(message) => ConnectDecision::Reject {
                message: message.clone(),
            },
            None => ConnectDecision::Accept {
                greeting: self.greeting.clone(),
            },
        }
    }
}

#[async_trait::async_trait]
impl ReceiverHandler for TestHandler {
    fn realm(&self) -> Option<std::sync::Arc<dyn Realm>> {
        self.realm
            .clone()
            .map(|realm| realm as std::sync::Arc<dyn Realm>)
    }

    fn tls_config(&self) -> Option<std::sync::Arc<rustls::ServerConfig>> {
        self.tls.clone()
    }

    async fn on_helo(&mut self, _ctx: &mut ReceiverContext, _args: &HeloArgs) -> HelloDecision {
        HelloDecision::Accept
    }

    async fn on_ehlo(&mut self, _ctx: &mut ReceiverContext, _args: &EhloArgs) -> HelloDecision {
        HelloDecision::Accept
    }

    async fn on_mail_from(
        &mut self,
        _ctx: &mut ReceiverContext,
        _args: &MailFromArgs,
    ) -> SenderDecision {
        self.sender_decision
            .clone()
            .unwrap_or(SenderDecision::Accept)
    }

    async fn on_rcpt_to(
        &mut self,
        _ctx: &mut ReceiverContext,
        args: &RcptToArgs,
    ) -> RecipientDecision {
        let domain = args.forward_path.domain().to_string();
        if self.blocked_recipient_domains.iter().any(|d| *d == domain) {
            return RecipientDecision::Policy {
                message: format!("{domain} is unauthorized"),
            };
        }
        RecipientDecision::Accept
    }

    async fn on_message_content(&mut self, _ctx: &mut ReceiverContext, chunk: &bytes::Bytes) {
        self.content.extend_from_slice(chunk);
    }

    async fn on_message_complete(
        &mut self,
        _ctx: &mut ReceiverContext,
        envelope: &ContextFinished,
    ) -> MessageDecision {
        self.received.lock().unwrap().push(ReceivedMessage {
            envelope: envelope.clone(),
            content: std::mem::take(&mut self.content),
        });
        MessageDecision::Accept {
            queue_id: self.queue_id.clone(),
        }
    }

    async fn on_reset(&mut self) {
        self.content.clear();
    }
}
