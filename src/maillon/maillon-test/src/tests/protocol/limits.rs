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

run_test! {
    fn line_of_998_octets_is_accepted,
    input = [
        "EHLO client.example\r\n",
        &format!("NOOP {}\r\n", "x".repeat(993)),
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.0.0 Ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn line_of_999_octets_is_rejected,
    input = [
        "EHLO client.example\r\n",
        &format!("NOOP {}\r\n", "x".repeat(994)),
        "NOOP\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "500 5.5.2 Line too long\r\n".to_owned(),
            // framing recovers at the next CRLF
            "250 2.0.0 Ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn recipient_count_is_bounded,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<one@example.com>\r\n",
        "RCPT TO:<two@example.com>\r\n",
        "RCPT TO:<three@example.com>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        {
            let mut lines = crate::default_ehlo_lines();
            lines[9] = "250-LIMITS RCPTMAX=2\r\n".to_owned();
            lines
        },
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 one@example.com... Recipient ok\r\n".to_owned(),
            "250 2.1.5 two@example.com... Recipient ok\r\n".to_owned(),
            "452 5.5.3 Too many recipients\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
    config = {
        let mut config = crate::config::local_test();
        config.recipient_count_max = 2;
        config
    },
}

run_test! {
    fn transaction_quota_closes_the_session,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "DATA\r\n",
        "only one\r\n.\r\n",
        "MAIL FROM:<a@example.com>\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        {
            let mut lines = crate::default_ehlo_lines();
            lines[9] = "250-LIMITS RCPTMAX=1000 MAILMAX=1\r\n".to_owned();
            lines
        },
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 b@example.com... Recipient ok\r\n".to_owned(),
            "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
            "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
            "421 4.5.3 Too many transactions on this connection, closing\r\n".to_owned(),
        ],
    ]
    .concat(),
    config = {
        let mut config = crate::config::local_test();
        config.transaction_count_max = 1;
        config
    },
}
