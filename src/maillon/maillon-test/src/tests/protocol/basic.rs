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

use crate::run_test;
use maillon_common::addr;

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn basic_send() {
    let received = run_test! {
        input = [
            "EHLO client.example\r\n",
            "MAIL FROM:<a@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "DATA\r\n",
            "hello\r\n.\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::default_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
    };

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content, b"hello\r\n");

    let envelope = &received[0].envelope;
    assert_eq!(envelope.helo.client_name.to_string(), "client.example");
    assert!(!envelope.helo.using_deprecated);
    assert_eq!(envelope.mail_from.reverse_path, Some(addr!("a@example.com")));
    assert_eq!(envelope.rcpt_to.forward_paths.len(), 1);
    assert_eq!(
        envelope.rcpt_to.forward_paths[0].forward_path,
        addr!("b@example.com")
    );
    assert_eq!(envelope.finished.delivered_bytes, 7);
}

run_test! {
    fn helo_basic,
    input = [
        "HELO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "DATA\r\n",
        "ok\r\n.\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "250 testserver.com Hello client.example\r\n",
        "250 2.1.0 Sender ok\r\n",
        "250 2.1.5 b@example.com... Recipient ok\r\n",
        "354 Start mail input; end with <CRLF>.<CRLF>\r\n",
        "250 2.0.0 Message accepted for delivery\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
}

run_test! {
    fn null_sender_is_accepted,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<>\r\n",
        "RCPT TO:<postmaster@example.com>\r\n",
        "DATA\r\n",
        "bounce\r\n.\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 postmaster@example.com... Recipient ok\r\n".to_owned(),
            "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
            "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn noop_help_vrfy_expn,
    input = [
        "EHLO client.example\r\n",
        "NOOP\r\n",
        "HELP\r\n",
        "VRFY postmaster\r\n",
        "EXPN staff\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.0.0 Ok\r\n".to_owned(),
            "214 2.0.0 Commands supported: EHLO HELO MAIL RCPT DATA BDAT RSET NOOP QUIT VRFY EXPN HELP AUTH STARTTLS\r\n".to_owned(),
            "252 2.0.0 Cannot VRFY user, but will accept message and attempt delivery\r\n".to_owned(),
            "502 5.2.4 EXPN not supported\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn queue_id_in_acceptance() {
    run_test! {
        input = [
            "EHLO client.example\r\n",
            "MAIL FROM:<a@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "DATA\r\n",
            ".\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::default_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery (4BA0A7E2B2)\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
        handler = {
            let mut handler = crate::handler::TestHandler::accept_all();
            handler.queue_id = Some("4BA0A7E2B2".to_owned());
            handler
        },
    };
}

run_test! {
    fn multiple_transactions_per_session,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "DATA\r\n",
        "first\r\n.\r\n",
        "MAIL FROM:<c@example.com>\r\n",
        "RCPT TO:<d@example.com>\r\n",
        "DATA\r\n",
        "second\r\n.\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
            "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
            "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 d@example.com... Recipient ok\r\n".to_owned(),
            "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
            "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}
