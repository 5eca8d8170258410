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
    fn utf8_in_ehlo_name,
    input = [
        "EHLO القيام\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "501 5.5.2 Syntax error in parameters or arguments\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
}

run_test! {
    fn mail_missing_smtputf8,
    input = [
        "EHLO c.example\r\n",
        "MAIL FROM:<u@t\u{00eb}st.example> SIZE=10\r\n",
        "MAIL FROM:<u@t\u{00eb}st.example> SMTPUTF8\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "553 5.6.7 SMTPUTF8 required for internationalized sender address\r\n".to_owned(),
            // the transaction never opened, so a correct MAIL may follow
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn utf8_transaction() {
    let received = run_test! {
        input = [
            "EHLO foobar\r\n",
            "MAIL FROM:<χρήστης@παράδειγμα.ελ> SMTPUTF8\r\n",
            "RCPT TO:<用户@例子.广告>\r\n",
            "DATA\r\n",
            "Subject: ಅಚ್ಚರಿಯ ವಿಷಯ\r\n\r\nhello\r\n.\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::default_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 用户@例子.广告... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
    };

    let received = received.lock().unwrap();
    assert!(received[0].envelope.mail_from.utf8);
    assert_eq!(
        received[0].envelope.mail_from.reverse_path.as_ref().unwrap().to_string(),
        "χρήστης@παράδειγμα.ελ"
    );
}

run_test! {
    fn rcpt_missing_smtputf8,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john.doe@mail.example>\r\n",
        "RCPT TO:<用户@例子.广告>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "553 5.6.7 SMTPUTF8 required for internationalized recipient address\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn ascii_rcpt_in_utf8_transaction,
    input = [
        "EHLO foobar\r\n",
        "MAIL FROM:<john.doe@mail.example> SMTPUTF8\r\n",
        "RCPT TO:<jenny.doe@mail.example>\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "250 2.1.5 jenny.doe@mail.example... Recipient ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}
