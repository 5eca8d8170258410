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

fn secured_ehlo_lines() -> Vec<String> {
    // After the upgrade: REQUIRETLS appears, STARTTLS is gone.
    [
        "250-testserver.com\r\n",
        "250-SIZE 20000000\r\n",
        "250-PIPELINING\r\n",
        "250-8BITMIME\r\n",
        "250-SMTPUTF8\r\n",
        "250-ENHANCEDSTATUSCODES\r\n",
        "250-CHUNKING\r\n",
        "250-BINARYMIME\r\n",
        "250-DSN\r\n",
        "250-LIMITS RCPTMAX=1000\r\n",
        "250-REQUIRETLS\r\n",
        "250-MT-PRIORITY MIXER STANAG4406 NSEP\r\n",
        "250-FUTURERELEASE 604800 2012-01-01T00:00:00Z\r\n",
        "250-DELIVERBY 604800\r\n",
        "250 HELP\r\n",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn starttls_upgrade_resets_the_hello_state() {
    let received = run_test! {
        input = [
            "EHLO client.example\r\n",
            "STARTTLS\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::ehlo_lines_with(&["STARTTLS"]),
            vec!["220 2.0.0 Ready to start TLS\r\n".to_owned()],
        ]
        .concat(),
        starttls => [
            // hello state was discarded with the plaintext; a MAIL here is
            // out of sequence until the client re-EHLOs
            "MAIL FROM:<a@example.com>\r\n",
            "EHLO client.example\r\n",
            "MAIL FROM:<a@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "DATA\r\n",
            "over tls\r\n.\r\n",
            "QUIT\r\n",
        ],
        secured_expected = [
            vec!["503 5.0.0 Bad sequence of commands\r\n".to_owned()],
            secured_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
        handler = crate::handler::TestHandler::accept_all().with_tls(),
    };

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content, b"over tls\r\n");
    // The negotiated TLS properties are part of the envelope.
    assert!(received[0].envelope.connect.tls.is_some());
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn starttls_cannot_run_twice() {
    run_test! {
        input = [
            "EHLO client.example\r\n",
            "STARTTLS\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::ehlo_lines_with(&["STARTTLS"]),
            vec!["220 2.0.0 Ready to start TLS\r\n".to_owned()],
        ]
        .concat(),
        starttls => [
            "STARTTLS\r\n",
            "QUIT\r\n",
        ],
        secured_expected = [
            "503 5.5.1 TLS session already established\r\n",
            "221 2.0.0 Service closing transmission channel\r\n",
        ],
        handler = crate::handler::TestHandler::accept_all().with_tls(),
    };
}

run_test! {
    fn starttls_allowed_before_any_hello,
    input = [
        "STARTTLS\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "220 2.0.0 Ready to start TLS\r\n",
    ],
    starttls => [
        "EHLO client.example\r\n",
        "QUIT\r\n",
    ],
    secured_expected = [
        secured_ehlo_lines(),
        vec!["221 2.0.0 Service closing transmission channel\r\n".to_owned()],
    ]
    .concat(),
    handler = crate::handler::TestHandler::accept_all().with_tls(),
}
