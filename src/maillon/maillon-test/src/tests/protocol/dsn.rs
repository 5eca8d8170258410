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
use maillon_common::{DsnReturn, NotifyOn};

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn submission_with_dsn_parameters() {
    let received = run_test! {
        input = [
            "EHLO Example.ORG\r\n",
            "MAIL FROM:<Alice@Example.ORG> RET=HDRS ENVID=QQ314159\r\n",
            "RCPT TO:<Bob@Example.COM> NOTIFY=SUCCESS ORCPT=rfc822;Bob@Example.COM\r\n",
            "RCPT TO:<Carol@Ivory.EDU> NOTIFY=FAILURE ORCPT=rfc822;Carol@Ivory.EDU\r\n",
            "RCPT TO:<Dana@Ivory.EDU> NOTIFY=SUCCESS,FAILURE ORCPT=rfc822;Dana@Ivory.EDU\r\n",
            "RCPT TO:<Fred@Bombs.AF.MIL> NOTIFY=NEVER\r\n",
            "DATA\r\n",
            ".\r\n",
            "QUIT\r\n",
        ],
        expected = [
            vec!["220 testserver.com Service ready\r\n".to_owned()],
            crate::default_ehlo_lines(),
            vec![
                "250 2.1.0 Sender ok\r\n".to_owned(),
                "250 2.1.5 Bob@Example.COM... Recipient ok\r\n".to_owned(),
                "250 2.1.5 Carol@Ivory.EDU... Recipient ok\r\n".to_owned(),
                "250 2.1.5 Dana@Ivory.EDU... Recipient ok\r\n".to_owned(),
                "250 2.1.5 Fred@Bombs.AF.MIL... Recipient ok\r\n".to_owned(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_owned(),
                "250 2.0.0 Message accepted for delivery\r\n".to_owned(),
                "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
            ],
        ]
        .concat(),
    };

    let received = received.lock().unwrap();
    let envelope = &received[0].envelope;

    assert_eq!(envelope.mail_from.envelope_id.as_deref(), Some("QQ314159"));
    assert_eq!(envelope.mail_from.dsn_return, Some(DsnReturn::Headers));

    let recipients = &envelope.rcpt_to.forward_paths;
    assert_eq!(recipients.len(), 4);
    assert_eq!(
        recipients[0].notify_on,
        NotifyOn::Some { success: true, failure: false, delay: false }
    );
    assert_eq!(
        recipients[0].original_forward_path.as_ref().unwrap().addr_type,
        "rfc822"
    );
    assert_eq!(
        recipients[0]
            .original_forward_path
            .as_ref()
            .unwrap()
            .mailbox
            .to_string(),
        "Bob@Example.COM"
    );
    assert_eq!(
        recipients[2].notify_on,
        NotifyOn::Some { success: true, failure: true, delay: false }
    );
    assert_eq!(recipients[3].notify_on, NotifyOn::Never);
    assert_eq!(recipients[3].original_forward_path, None);
}

run_test! {
    fn notify_never_is_exclusive,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com>\r\n",
        "RCPT TO:<b@example.com> NOTIFY=NEVER,FAILURE\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "501 5.5.4 Invalid value for the NOTIFY parameter\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn xtext_envid_is_decoded,
    input = [
        "EHLO client.example\r\n",
        "MAIL FROM:<a@example.com> ENVID=with+2Bplus\r\n",
        "QUIT\r\n",
    ],
    expected = [
        vec!["220 testserver.com Service ready\r\n".to_owned()],
        crate::default_ehlo_lines(),
        vec![
            "250 2.1.0 Sender ok\r\n".to_owned(),
            "221 2.0.0 Service closing transmission channel\r\n".to_owned(),
        ],
    ]
    .concat(),
}

run_test! {
    fn dsn_parameters_are_ehlo_gated,
    input = [
        "HELO client.example\r\n",
        "MAIL FROM:<a@example.com> RET=FULL\r\n",
        "QUIT\r\n",
    ],
    expected = [
        "220 testserver.com Service ready\r\n",
        "250 testserver.com Hello client.example\r\n",
        "503 5.5.1 Extension parameters require EHLO\r\n",
        "221 2.0.0 Service closing transmission channel\r\n",
    ],
}
