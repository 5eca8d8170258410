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

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn bdat_round_trip() {
    let received = run_test! {
        input = [
            "EHLO client.example\r\n",
            "MAIL FROM:<a@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "BDAT 5\r\nhello",
            "BDAT 7 LAST\r\n world!",
            "QUIT\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::default_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "250 2.0.0 5 bytes received\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery (12 bytes)\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
    };

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    // Chunk payloads concatenate verbatim; no dot-unstuffing applies.
    assert_eq!(received[0].content, b"hello world!");
    assert_eq!(received[0].envelope.finished.delivered_bytes, 12);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn bdat_zero_last_finalizes_an_empty_message() {
    let received = run_test! {
        input = [
            "EHLO client.example\r\n",
            "MAIL FROM:<a@example.com>\r\n",
            "RCPT TO:<b@example.com>\r\n",
            "BDAT 0 LAST\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::default_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery (0 bytes)\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
    };

    assert!(received.lock().unwrap()[0].content.is_empty());
}

run_test! {
    fn bdat_chunk_with_dot_lines_is_verbatim,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "BDAT 9 LAST\r\n.\r\n..\r\n.",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
            "250 2.0.0 Message accepted for delivery (9 bytes)\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn bdat_requires_ehlo,
    input = [
        "HELO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "BDAT 0 LAST\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "250 testserver.com Hello client.example\r\n",
        "250 2.1.0 Sender ok\r\n",
        "250 2.1.5 b@example.com... Recipient ok\r\n",
        "503 5.5.1 CHUNKING requires EHLO\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
}

run_test! {
    fn bdat_before_rcpt_is_out_of_sequence,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "BDAT 0 LAST\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "503 5.0.0 Bad sequence of commands\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn binarymime_requires_bdat,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com> BODY=BINARYMIME\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "DATA\r\n",
        "BDAT 3 LAST\r\nabc",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
            "503 5.6.1 BINARYMIME requires BDAT\r\n".to_owned(),
            "250 2.0.0 Message accepted for delivery (3 bytes)\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn oversized_chunk_is_consumed_then_refused,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "BDAT 20 LAST\r\n01234567890123456789",
        "MAIL FROM:<a@example.com>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        {
            let mut lines = crate::default_ehlo_lines();
            lines[1] = "250-SIZE 10\r\n".to_owned();
            lines
        },
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
            "552 5.3.4 Message size exceeds fixed maximum message size\r\n".to_owned(),
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
    config = {
        let mut config = crate::config::local_test();
        config.message_size_limit = 10;
        config
    },
}
