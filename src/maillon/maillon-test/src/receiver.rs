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

/// Run one connection against the receiver and assert every reply line.
///
/// The client writes the next `input` item after each final reply line
/// (continuation lines `NNN-…` only read). The optional `starttls =>` block
/// upgrades the channel after the `220` go-ahead and continues the dialog
/// over TLS. Returns the handler's [`crate::handler::Received`] record.
#[macro_export]
macro_rules! run_test {
    (
        input = $input:expr,
        expected = $expected:expr
        $(, starttls => $secured_input:expr, secured_expected = $secured_expected:expr)?
        $(, config = $config:expr)?
        $(, handler = $handler:expr)?
        $(,)?
    ) => {{
        let expected: Vec<String> = $expected.into_iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let input: Vec<String> = $input.into_iter().map(|s| s.to_string()).collect::<Vec<_>>();
        $(
            let secured_input: Vec<String> =
                $secured_input.into_iter().map(|s| s.to_string()).collect::<Vec<_>>();
            let secured_expected: Vec<String> =
                $secured_expected.into_iter().map(|s| s.to_string()).collect::<Vec<_>>();
        )?

        let (socket_server, server_addr) = loop {
            let port = rand::random::<u32>().rem_euclid(65535 - 1025) + 1025;
            let server_addr: std::net::SocketAddr =
                format!("127.0.0.1:{port}").parse().expect("valid address");
            match tokio::net::TcpListener::bind(server_addr).await {
                Ok(socket_server) => break (socket_server, server_addr),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => (),
                Err(e) => panic!("{}", e),
            };
        };

        let config: std::sync::Arc<maillon_config::Config> = {
            let _f = || std::sync::Arc::new($crate::config::local_test());      $(
            let _f = || std::sync::Arc::new($config);                           )?
            _f()
        };

        let handler = {
            let _f = || $crate::handler::TestHandler::accept_all();             $(
            let _f = || $handler;                                               )?
            _f()
        };
        let received = handler.received.clone();

        let server = tokio::spawn(async move {
            let (client_stream, client_addr) = socket_server.accept().await.unwrap();
            let receiver = maillon_protocol::Receiver::new(
                client_stream,
                maillon_protocol::ConnectionKind::Relay,
                config,
            );
            let decision = handler.connect_decision();
            let smtp_stream = receiver.into_stream(
                |_args| async move { (handler, decision) },
                client_addr,
                server_addr,
                time::OffsetDateTime::now_utc(),
                uuid::Uuid::new_v4(),
            );
            tokio::pin!(smtp_stream);
            while matches!(
                tokio_stream::StreamExt::next(&mut smtp_stream).await,
                Some(Ok(()))
            ) {}
        });

        let client = tokio::spawn(async move {
            use tokio::io::AsyncBufReadExt;
            use tokio::io::AsyncWriteExt;
            let stream = tokio::net::TcpStream::connect(server_addr).await.unwrap();
            let mut stream = tokio::io::BufReader::new(stream);

            let mut output = vec![];
            let mut line_to_send = input.iter().cloned();

            loop {
                let mut line_received = String::new();
                // read until '\n' or '\r\n'
                if stream
                    .read_line(&mut line_received)
                    .await
                    .map_or(true, |l| l == 0)
                {
                    break;
                }
                output.push(line_received);
                if output.last().unwrap().chars().nth(3) == Some('-') {
                    continue;
                }
                match line_to_send.next() {
                    Some(line) => stream.write_all(line.as_bytes()).await.unwrap(),
                    None => break,
                }
            }
            $(
                let _ = stringify!($secured_input, $secured_expected);
                assert!(
                    output.last().unwrap().starts_with("220 "),
                    "STARTTLS was not acknowledged: {:?}",
                    output.last()
                );
                let stream = $crate::tls::connect("testserver.com", stream.into_inner()).await;
                let mut stream = tokio::io::BufReader::new(stream);

                let mut line_to_send = secured_input.iter().cloned();
                stream
                    .write_all(line_to_send.next().unwrap().as_bytes())
                    .await
                    .unwrap();

                let mut secured_output = vec![];
                loop {
                    let mut line_received = String::new();
                    if stream
                        .read_line(&mut line_received)
                        .await
                        .map_or(true, |l| l == 0)
                    {
                        break;
                    }
                    secured_output.push(line_received);
                    if secured_output.last().unwrap().chars().nth(3) == Some('-') {
                        continue;
                    }
                    match line_to_send.next() {
                        Some(line) => stream.write_all(line.as_bytes()).await.unwrap(),
                        None => break,
                    }
                }
                pretty_assertions::assert_eq!(secured_expected, secured_output);
            )?

            output
        });

        let (client, server) = tokio::join!(client, server);
        let (client, _server) = (client.unwrap(), server.unwrap());

        pretty_assertions::assert_eq!(expected, client);

        received
    }};
    (
        fn $name:ident,
        input = $input:expr,
        expected = $expected:expr
        $(, starttls => $secured_input:expr, secured_expected = $secured_expected:expr)?
        $(, config = $config:expr)?
        $(, handler = $handler:expr)?
        $(,)?
    ) => {
        #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
        async fn $name() {
            run_test! {
                input = $input,
                expected = $expected
                $(, starttls => $secured_input, secured_expected = $secured_expected)?
                $(, config = $config)?
                $(, handler = $handler)?
            };
        }
    };
}

/// Like [`run_test!`], but the client sends whole pipelined windows and
/// reads whatever the server answers within a short grace period, so each
/// `expected` item is one TCP window of replies.
#[macro_export]
macro_rules! run_pipelined_test {
    (
        input = $input:expr,
        expected = $expected:expr
        $(, config = $config:expr)?
        $(, handler = $handler:expr)?
        $(,)?
    ) => {{
        let expected: Vec<String> = $expected.into_iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let input: Vec<String> = $input.into_iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let (socket_server, server_addr) = loop {
            let port = rand::random::<u32>().rem_euclid(65535 - 1025) + 1025;
            let server_addr: std::net::SocketAddr =
                format!("127.0.0.1:{port}").parse().expect("valid address");
            match tokio::net::TcpListener::bind(server_addr).await {
                Ok(socket_server) => break (socket_server, server_addr),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => (),
                Err(e) => panic!("{}", e),
            };
        };

        let config: std::sync::Arc<maillon_config::Config> = {
            let _f = || std::sync::Arc::new($crate::config::local_test());      $(
            let _f = || std::sync::Arc::new($config);                           )?
            _f()
        };

        let handler = {
            let _f = || $crate::handler::TestHandler::accept_all();             $(
            let _f = || $handler;                                               )?
            _f()
        };
        let received = handler.received.clone();

        let server = tokio::spawn(async move {
            let (client_stream, client_addr) = socket_server.accept().await.unwrap();
            let receiver = maillon_protocol::Receiver::new(
                client_stream,
                maillon_protocol::ConnectionKind::Relay,
                config,
            );
            let decision = handler.connect_decision();
            let smtp_stream = receiver.into_stream(
                |_args| async move { (handler, decision) },
                client_addr,
                server_addr,
                time::OffsetDateTime::now_utc(),
                uuid::Uuid::new_v4(),
            );
            tokio::pin!(smtp_stream);
            while matches!(
                tokio_stream::StreamExt::next(&mut smtp_stream).await,
                Some(Ok(()))
            ) {}
        });

        let client = tokio::spawn(async move {
            use tokio::io::AsyncBufReadExt;
            use tokio::io::AsyncWriteExt;
            let stream = tokio::net::TcpStream::connect(server_addr).await.unwrap();
            let mut stream = tokio::io::BufReader::new(stream);

            let mut output = vec![];
            let mut line_to_send = input.iter().cloned();

            loop {
                let mut window = String::new();
                // Wait for the first reply line of the window, then drain
                // whatever else the server sent with it.
                if stream.read_line(&mut window).await.map_or(true, |l| l == 0) {
                    break;
                }
                let read_timeout = tokio::time::Duration::from_millis(100);
                loop {
                    match tokio::time::timeout(read_timeout, stream.read_line(&mut window)).await {
                        Ok(Ok(0)) | Err(_) => break,
                        Ok(Ok(_)) => (),
                        Ok(Err(e)) => panic!("{}", e),
                    }
                }
                output.push(window);
                match line_to_send.next() {
                    Some(line) => stream.write_all(line.as_bytes()).await.unwrap(),
                    None => break,
                }
            }

            output
        });

        let (client, server) = tokio::join!(client, server);
        let (client, _server) = (client.unwrap(), server.unwrap());

        pretty_assertions::assert_eq!(expected, client);

        received
    }};
    (
        fn $name:ident,
        input = $input:expr,
        expected = $expected:expr
        $(, config = $config:expr)?
        $(, handler = $handler:expr)?
        $(,)?
    ) => {
        #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
        async fn $name() {
            run_pipelined_test! {
                input = $input,
                expected = $expected
                $(, config = $config)?
                $(, handler = $handler)?
            };
        }
    };
}
