#![allow(dead_code)]

use std::path::{Path, PathBuf};
use rcgen::CertifiedKey;

pub fn generate_cert() -> CertifiedKey {
    rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap()
}

pub fn write_cert(dir: &Path, generated: &CertifiedKey) -> PathBuf {
    let path = dir.join("tls.cert");
    std::fs::write(&path, generated.cert.pem()).unwrap();
    path
}

pub fn write_macaroon(dir: &Path, bytes: &[u8]) -> PathBuf {
    let path = dir.join("admin.macaroon");
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn valid_macaroon() -> Vec<u8> {
    let mut bytes = vec![2];
    bytes.extend_from_slice(&[1, 3]);
    bytes.extend_from_slice(b"lnd");
    bytes.extend_from_slice(&[2, 8]);
    bytes.extend_from_slice(b"\x03rootkey");
    bytes.push(0);
    bytes.extend_from_slice(&[2, 11]);
    bytes.extend_from_slice(b"ipaddr ::1 ");
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(&[6, 32]);
    bytes.extend_from_slice(&[0x5a; 32]);
    bytes
}
