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
    fn nothing_is_dispatched_before_hello,
    input = [
        "MAIL FROM:<a@example.com>\r\n",
        "RSET\r\n",
        "NOOP\r\n",
        "DATA\r\n",
        "VRFY a\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "503 5.0.0 Bad sequence of commands\r\n",
        "503 5.0.0 Bad sequence of commands\r\n",
        "503 5.0.0 Bad sequence of commands\r\n",
        "503 5.0.0 Bad sequence of commands\r\n",
        "503 5.0.0 Bad sequence of commands\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
}

run_test! {
    fn rcpt_requires_mail,
    input = [
        "EHLO client.example\r\n",
        "RCPT TO:<b@example.com>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "503 5.0.0 Bad sequence of commands\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn mail_twice_is_out_of_sequence,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "MAIL FROM:<b@example.com>\r\n",
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
    fn unknown_command_is_a_syntax_error,
    input = [
        "EHLO client.example\r\n",
        "FOO bar\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "500 5.5.2 Syntax error, command unrecognized\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn rejected_connection_only_honors_quit,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "554 5.0.0 not today\r\n",
        "554 5.0.0 Connection rejected\r\n",
        "554 5.0.0 Connection rejected\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
    handler = {
        let mut handler = crate::handler::TestHandler::accept_all();
        handler.reject_connection = Some("not today".to_owned());
        handler
    },
}

run_test! {
    fn shutting_down_closes_immediately,
    input = Vec::<&str>::new(),
    expected = [
        "421 4.3.0 Server shutting down\r\n",
    ],
    handler = {
        let mut handler = crate::handler::TestHandler::accept_all();
        handler.shutting_down = true;
        handler
    },
}

run_test! {
    fn starttls_without_tls_configuration,
    input = [
        "EHLO client.example\r\n",
        "STARTTLS\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "454 4.3.0 TLS not available\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn helo_after_mail_is_refused,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "EHLO client.example\r\n",
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
