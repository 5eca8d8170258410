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

use tokio_rustls::rustls;

/// A server configuration around a freshly generated self-signed
/// certificate for `testserver.com`.
#[must_use]
pub fn server_config() -> std::sync::Arc<rustls::ServerConfig> {
    let certified = rcgen::generate_simple_self_signed(vec!["testserver.com".to_owned()]).unwrap();
    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(
            vec![rustls::Certificate(certified.serialize_der().unwrap())],
            rustls::PrivateKey(certified.serialize_private_key_der()),
        )
        .unwrap();
    std::sync::Arc::new(config)
}

struct AcceptAnyCertificate;

impl rustls::client::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        // The suites pin nothing; the server certificate is generated per
        // test run.
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// Upgrade the client side of a test connection, trusting whatever
/// certificate the server presents.
pub async fn connect(
    server_name: &str,
    stream: tokio::net::TcpStream,
) -> tokio_rustls::client::TlsStream<tokio::net::TcpStream> {
    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(std::sync::Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    let connector = tokio_rustls::TlsConnector::from(std::sync::Arc::new(config));
    connector
        .connect(rustls::ServerName::try_from(server_name).unwrap(), stream)
        .await
        .unwrap()
}
