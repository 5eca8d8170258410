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

const XCLIENT_CAPABILITY: &str = "XCLIENT NAME ADDR PORT PROTO HELO LOGIN DESTADDR DESTPORT";

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn trusted_proxy_overrides_the_connection() {
    let received = run_test! {
        input = [
            "XCLIENT NAME=spike.porcupine.org ADDR=168.100.189.2 PORT=2525 PROTO=ESMTP\r\n",
            "EHLO spike.porcupine.org\r\n",
            "MAIL FROM:<a@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "DATA\r\n",
            ".\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec![
                "220 testserver.com Service ready\r\n".to_owned(),
                "220 testserver.com ESMTP\r\n".to_owned(),
            ],
            crate::ehlo_lines_with(&[XCLIENT_CAPABILITY]),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
        config = crate::config::with_xclient_from_loopback(),
    };

    let received = received.lock().unwrap();
    let connect = &received[0].envelope.connect;
    assert_eq!(connect.client_addr, "168.100.189.2:2525".parse().unwrap());
    assert_eq!(connect.client_host.as_deref(), Some("spike.porcupine.org"));
}

run_test! {
    fn unauthorized_peer_is_refused,
    input = [
        "XCLIENT ADDR=168.100.189.2\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "550 5.7.0 XCLIENT not allowed\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
}

run_test! {
    fn refused_during_a_transaction,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "XCLIENT ADDR=168.100.189.2\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::ehlo_lines_with(&[XCLIENT_CAPABILITY]),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "503 5.5.1 XCLIENT not permitted during a mail transaction\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
    config = crate::config::with_xclient_from_loopback(),
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn login_attribute_asserts_a_principal() {
    let received = run_test! {
        input = [
            "XCLIENT LOGIN=alice\r\n",
            "EHLO client.example\r\n",
            "MAIL FROM:<alice@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "DATA\r\n",
            ".\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec![
                "220 testserver.com Service ready\r\n".to_owned(),
                "220 testserver.com ESMTP\r\n".to_owned(),
            ],
            crate::ehlo_lines_with(&[XCLIENT_CAPABILITY]),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
        config = crate::config::with_xclient_from_loopback(),
    };

    let received = received.lock().unwrap();
    let auth = received[0].envelope.connect.auth.as_ref().unwrap();
    assert!(auth.authenticated);
    assert_eq!(auth.credentials.as_ref().unwrap().authid, "alice");
}

run_test! {
    fn login_unavailable_clears_authentication,
    input = [
        "EHLO client.example\r\n",
        "AUTH PLAIN AGFsaWNlAHNlY3JldA==\r\n",
        "XCLIENT LOGIN=[UNAVAILABLE]\r\n",
        "EHLO client.example\r\n",
        "MAIL FROM:<alice@example.com>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::ehlo_lines_with(&[XCLIENT_CAPABILITY, "AUTH PLAIN LOGIN CRAM-MD5 SCRAM-SHA-256"]),
        vec![
            "235 2.7.0 Authentication successful\r\n".to_owned(),
            "220 testserver.com ESMTP\r\n".to_owned(),
        ],
        crate::ehlo_lines_with(&[XCLIENT_CAPABILITY, "AUTH PLAIN LOGIN CRAM-MD5 SCRAM-SHA-256"]),
        vec![
            // the principal is gone, plain submission rules apply again
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
    config = crate::config::with_xclient_from_loopback(),
    handler = crate::handler::TestHandler::accept_all()
        .with_realm(crate::handler::TestRealm::new([("alice", "secret")])),
}
