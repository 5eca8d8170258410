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

use crate::run_pipelined_test;

run_pipelined_test! {
    fn basic_pipelining_scenario,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john@doe.example>\r\n\
        RCPT TO:<galvin@tis.example>\r\n\
        DATA\r\n",
        &("X".repeat(10) + "\r\n.\r\n"),
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n".to_owned(),
        crate::default_ehlo_lines().concat(),
        "250 2.1.0 Sender ok\r\n\
        250 2.1.5 galvin@tis.example... Recipient ok\r\n\
        354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
        "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
        "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
    ],
}

run_pipelined_test! {
    fn commands_pipelined_after_the_terminator,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john@doe.example>\r\n\
        RCPT TO:<henry@trusted.example>\r\n\
        DATA\r\n",
        "ok\r\n.\r\nRSET\r\n",
        "MAIL FROM:<john@doe.example>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n".to_owned(),
        crate::default_ehlo_lines().concat(),
        "250 2.1.0 Sender ok\r\n\
        250 2.1.5 henry@trusted.example... Recipient ok\r\n\
        354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
        // the RSET travelled in the same segment as the terminator
        "250 2.0.0 Message accepted for delivery\r\n\
        250 2.0.0 Reset OK\r\n".to_owned(),
        "250 2.1.0 Sender ok\r\n".to_owned(),
        "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
    ],
}

run_pipelined_test! {
    fn sneaky_unrecognized_command,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john@doe.example>\r\n\
        RCPT TO:<fitz@trusted.example>\r\n\
        NOTACOMMAND and its args\r\n\
        DATA\r\n",
        ".\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n".to_owned(),
        crate::default_ehlo_lines().concat(),
        "250 2.1.0 Sender ok\r\n\
        250 2.1.5 fitz@trusted.example... Recipient ok\r\n\
        500 5.5.2 Syntax error, command unrecognized\r\n\
        354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
        "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
        "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
    ],
}

run_pipelined_test! {
    fn no_rcpt,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john@doe.example>\r\n\
        DATA\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n".to_owned(),
        crate::default_ehlo_lines().concat(),
        "250 2.1.0 Sender ok\r\n\
        503 5.0.0 Bad sequence of commands\r\n".to_owned(),
        "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
    ],
}

run_pipelined_test! {
    fn wrong_rcpt,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john@doe.example>\r\n\
        RCPT TO:<galvin@>\r\n\
        DATA\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n".to_owned(),
        crate::default_ehlo_lines().concat(),
        "250 2.1.0 Sender ok\r\n\
        501 5.1.3 The address <galvin@> is not a valid RFC 5321 address\r\n\
        503 5.0.0 Bad sequence of commands\r\n".to_owned(),
        "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
    ],
}

run_pipelined_test! {
    fn rejected_recipient_does_not_join_the_envelope,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john@doe.example>\r\n\
        RCPT TO:<henry@trusted.example>\r\n\
        RCPT TO:<galvin@malicious.example>\r\n\
        DATA\r\n",
        &("X".repeat(10) + "\r\n.\r\n"),
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n".to_owned(),
        crate::default_ehlo_lines().concat(),
        "250 2.1.0 Sender ok\r\n\
        250 2.1.5 henry@trusted.example... Recipient ok\r\n\
        553 5.7.1 malicious.example is unauthorized\r\n\
        354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
        "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
        "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
    ],
    handler = {
        let mut handler = crate::handler::TestHandler::accept_all();
        handler.blocked_recipient_domains = vec!["malicious.example".to_owned()];
        handler
    },
}
