use crate::error::{CryptoError, Result};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_parser::prelude::*;

const RSA_OID: &str = "1.2.840.113549.1.1.1";

/// Load an RSA public key from PEM.
///
/// Accepts SPKI (`PUBLIC KEY`), PKCS#1 (`RSA PUBLIC KEY`) and X.509
/// certificates (`CERTIFICATE`), in which case the subject key is used.
pub fn public_key_from_pem(pem_str: &str) -> Result<RsaPublicKey> {
    match pem_tag(pem_str)?.as_str() {
        "CERTIFICATE" => public_key_from_certificate(pem_str),
        "PUBLIC KEY" => RsaPublicKey::from_public_key_pem(pem_str)
            .map_err(|e| CryptoError::UnsupportedKey(format!("Not an RSA public key: {}", e))),
        "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_pem(pem_str)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid PKCS#1 public key: {}", e))),
        other => Err(CryptoError::UnsupportedKey(format!(
            "Expected a public key or certificate, found PEM block '{}'",
            other
        ))),
    }
}

/// Load an RSA private key from PEM.
///
/// `passphrase` is only consulted for encrypted PKCS#8 keys.
pub fn private_key_from_pem(pem_str: &str, passphrase: Option<&str>) -> Result<RsaPrivateKey> {
    match pem_tag(pem_str)?.as_str() {
        "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_pem(pem_str)
            .map_err(|e| CryptoError::UnsupportedKey(format!("Not an RSA private key: {}", e))),
        "ENCRYPTED PRIVATE KEY" => {
            let passphrase = passphrase.ok_or(CryptoError::PassphraseRequired)?;
            RsaPrivateKey::from_pkcs8_encrypted_pem(pem_str, passphrase).map_err(|e| {
                CryptoError::InvalidKey(format!("Wrong passphrase or corrupted key: {}", e))
            })
        }
        "RSA PRIVATE KEY" => {
            if pem_str.contains("Proc-Type: 4,ENCRYPTED") {
                return Err(CryptoError::UnsupportedKey(
                    "Legacy encrypted PKCS#1 key; convert it with `openssl pkcs8 -topk8`".into(),
                ));
            }
            RsaPrivateKey::from_pkcs1_pem(pem_str)
                .map_err(|e| CryptoError::InvalidKey(format!("Invalid PKCS#1 private key: {}", e)))
        }
        other => Err(CryptoError::UnsupportedKey(format!(
            "Expected an RSA private key, found PEM block '{}'",
            other
        ))),
    }
}

/// Whether the PEM holds a passphrase-protected private key.
pub fn is_encrypted_private_key(pem_str: &str) -> bool {
    matches!(pem_tag(pem_str).as_deref(), Ok("ENCRYPTED PRIVATE KEY"))
        || pem_str.contains("Proc-Type: 4,ENCRYPTED")
}

fn public_key_from_certificate(cert_pem: &str) -> Result<RsaPublicKey> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("PEM parse error: {}", e)))?;
    let (_, x509) = x509_parser::parse_x509_certificate(&pem.contents)
        .map_err(|e| CryptoError::InvalidKey(format!("X509 parse error: {}", e)))?;

    let spki = x509.tbs_certificate.subject_pki;
    let oid = spki.algorithm.algorithm.to_id_string();
    if oid != RSA_OID {
        return Err(CryptoError::UnsupportedKey(format!(
            "Certificate key algorithm {} is not RSA",
            oid
        )));
    }

    RsaPublicKey::from_pkcs1_der(&spki.subject_public_key.data)
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA public key: {}", e)))
}

fn pem_tag(pem_str: &str) -> Result<String> {
    let block = ::pem::parse(pem_str)
        .map_err(|e| CryptoError::InvalidKey(format!("PEM parse error: {}", e)))?;
    Ok(block.tag().to_string())
}
