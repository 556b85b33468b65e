use std::time::{Duration, Instant};
use lnd_probe::{Bootstrapper, Diagnostics, ErrorKind};
use tokio::net::{TcpListener, TcpStream};

mod common;

use common::{generate_cert, valid_macaroon, write_cert, write_macaroon};

async fn assert_never_dialed(listener: &TcpListener) {
    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err(), "bootstrap dialed although credentials were broken");
}

#[tokio::test]
async fn credentials_load_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let cert = write_cert(dir.path(), &generate_cert());
    let macaroon = write_macaroon(dir.path(), &valid_macaroon());

    // nothing listens on this address, loading must not care
    let bootstrapper = Bootstrapper::new("localhost:1", cert, macaroon)
        .diagnostics(Diagnostics::new().with_transport(true));
    bootstrapper.load_credentials().await.unwrap();
}

#[tokio::test]
async fn missing_cert_never_dials() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let cert = dir.path().join("tls.cert");
    let macaroon = write_macaroon(dir.path(), &valid_macaroon());

    let error = Bootstrapper::new(address, &cert, macaroon).connect().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::CredentialLoad);
    assert_eq!(error.path(), Some(cert.as_path()));
    assert_never_dialed(&listener).await;
}

#[tokio::test]
async fn malformed_cert_never_dials() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let cert = dir.path().join("tls.cert");
    std::fs::write(&cert, "-----BEGIN CERTIFICATE-----\nZGVmaW5pdGVseSBub3QgZGVy\n-----END CERTIFICATE-----\n").unwrap();
    let macaroon = write_macaroon(dir.path(), &valid_macaroon());

    let error = Bootstrapper::new(address, &cert, macaroon).connect().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::CredentialLoad);
    assert_eq!(error.path(), Some(cert.as_path()));
    assert_never_dialed(&listener).await;
}

#[tokio::test]
async fn garbage_macaroon_never_dials() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let cert = write_cert(dir.path(), &generate_cert());
    let macaroon = write_macaroon(dir.path(), &[0x9c, 0x41, 0xe7]);

    let error = Bootstrapper::new(address, cert, &macaroon).connect().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::CredentialLoad);
    assert_eq!(error.path(), Some(macaroon.as_path()));
    assert!(error.to_string().contains(&*macaroon.to_string_lossy()));
    assert_never_dialed(&listener).await;
}

#[tokio::test]
async fn missing_macaroon_never_dials() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let cert = write_cert(dir.path(), &generate_cert());
    let macaroon = dir.path().join("admin.macaroon");

    let error = Bootstrapper::new(address, cert, &macaroon).connect().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::CredentialLoad);
    assert_eq!(error.path(), Some(macaroon.as_path()));
    assert_never_dialed(&listener).await;
}

#[tokio::test]
async fn closed_port_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let cert = write_cert(dir.path(), &generate_cert());
    let macaroon = write_macaroon(dir.path(), &valid_macaroon());
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };

    let start = Instant::now();
    let error = Bootstrapper::new(address, cert, macaroon)
        .timeout(Duration::from_secs(10))
        .connect()
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Connection);
    assert!(!error.is_deadline_exceeded());
    assert!(start.elapsed() < Duration::from_secs(5), "refused connection was retried for {:?}", start.elapsed());
}

#[tokio::test]
async fn silent_server_hits_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let cert = write_cert(dir.path(), &generate_cert());
    let macaroon = write_macaroon(dir.path(), &valid_macaroon());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    // accept the TCP connection but never answer the TLS handshake
    let server = tokio::spawn(async move {
        let mut held: Vec<TcpStream> = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let start = Instant::now();
    let error = Bootstrapper::new(address, cert, macaroon)
        .timeout(Duration::from_millis(300))
        .connect()
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Connection);
    assert!(error.is_deadline_exceeded());
    assert!(start.elapsed() < Duration::from_secs(5));
    server.abort();
}

#[tokio::test]
async fn plain_http_is_rejected_before_dialing() {
    let dir = tempfile::tempdir().unwrap();
    let cert = write_cert(dir.path(), &generate_cert());
    let macaroon = write_macaroon(dir.path(), &valid_macaroon());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let error = Bootstrapper::new(address, cert, macaroon).connect().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Connection);
    assert_never_dialed(&listener).await;
}
