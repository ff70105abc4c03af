use archive_crypto::{
    ArchiveCipher, ArchiveDecipher, ChunkedRsaCipher, ChunkedRsaDecipher, CryptoError,
    PassphraseCipher, chunk_len, private_key_from_pem, public_key_from_pem,
};
use base64::Engine;

const PRIVATE_KEY: &str = include_str!("fixtures/archive_key.pem");
const ENCRYPTED_PRIVATE_KEY: &str = include_str!("fixtures/archive_key_encrypted.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/archive_pub.pem");
const CERTIFICATE: &str = include_str!("fixtures/archive_cert.pem");

/// Chunked RSA-OAEP archive of `SAMPLE_DUMP`, encrypted independently of this
/// crate against `archive_pub.pem`.
const SAMPLE_RSA_ARCHIVE: &str = include_str!("fixtures/sample.jsonl.enc");
/// Produced by `openssl enc -aes-256-cbc -base64 -md sha256 -pass pass:correct-horse`.
const SAMPLE_AES_ARCHIVE: &str = include_str!("fixtures/sample.jsonl.aes-256-cbc");

const SAMPLE_DUMP: &str = "{\"created\":1500000000,\"id\":\"evt_1\"}\n\
{\"created\":1500000100,\"id\":\"evt_2\",\"type\":\"charge.succeeded\"}\n";

fn decipher() -> ChunkedRsaDecipher {
    ChunkedRsaDecipher::from_pem(PRIVATE_KEY, None).expect("Failed to load private key")
}

#[test]
fn test_chunked_rsa_round_trip() {
    let cipher = ChunkedRsaCipher::from_pem(PUBLIC_KEY).expect("Failed to load public key");
    assert_eq!(cipher.chunk_len(), 78);

    // Long enough to span several chunks, with bytes that are not valid UTF-8
    let mut payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    payload.extend_from_slice(SAMPLE_DUMP.as_bytes());

    let artifact = cipher.encrypt(&payload).expect("Encryption failed");
    let decrypted = decipher().decrypt(&artifact).expect("Decryption failed");
    assert_eq!(payload, decrypted);

    let encoded_len = base64::engine::general_purpose::STANDARD
        .encode(&payload)
        .len();
    let lines = String::from_utf8(artifact).unwrap().lines().count();
    assert_eq!(lines, encoded_len.div_ceil(cipher.chunk_len()));
}

#[test]
fn test_chunked_rsa_empty_payload() {
    let cipher = ChunkedRsaCipher::from_pem(PUBLIC_KEY).unwrap();
    let artifact = cipher.encrypt(b"").unwrap();
    assert!(artifact.is_empty());
    assert!(decipher().decrypt(&artifact).unwrap().is_empty());
}

#[test]
fn test_chunked_rsa_is_randomized() {
    let cipher = ChunkedRsaCipher::from_pem(PUBLIC_KEY).unwrap();
    let a = cipher.encrypt(SAMPLE_DUMP.as_bytes()).unwrap();
    let b = cipher.encrypt(SAMPLE_DUMP.as_bytes()).unwrap();
    assert_ne!(a, b, "OAEP must not be deterministic");
}

#[test]
fn test_decrypts_independently_encrypted_archive() {
    let plain = decipher()
        .decrypt(SAMPLE_RSA_ARCHIVE.as_bytes())
        .expect("Decryption failed");
    assert_eq!(plain, SAMPLE_DUMP.as_bytes());
}

#[test]
fn test_certificate_and_spki_yield_same_key() {
    let from_cert = public_key_from_pem(CERTIFICATE).expect("Failed to load certificate");
    let from_spki = public_key_from_pem(PUBLIC_KEY).expect("Failed to load public key");
    assert_eq!(from_cert, from_spki);

    let cipher = ChunkedRsaCipher::from_pem(CERTIFICATE).unwrap();
    let artifact = cipher.encrypt(b"via certificate").unwrap();
    assert_eq!(decipher().decrypt(&artifact).unwrap(), b"via certificate");
}

#[test]
fn test_encrypted_private_key() {
    let key = private_key_from_pem(ENCRYPTED_PRIVATE_KEY, Some("key-secret"))
        .expect("Failed to load encrypted key");
    let plain = ChunkedRsaDecipher::new(key)
        .decrypt(SAMPLE_RSA_ARCHIVE.as_bytes())
        .unwrap();
    assert_eq!(plain, SAMPLE_DUMP.as_bytes());

    let wrong = private_key_from_pem(ENCRYPTED_PRIVATE_KEY, Some("not-it"));
    assert!(matches!(wrong, Err(CryptoError::InvalidKey(_))));

    let missing = private_key_from_pem(ENCRYPTED_PRIVATE_KEY, None);
    assert!(matches!(missing, Err(CryptoError::PassphraseRequired)));
}

#[test]
fn test_wrong_key_fails_cleanly() {
    let mut rng = rand::thread_rng();
    let other = rsa::RsaPrivateKey::new(&mut rng, 1024).expect("Failed to generate key");
    let err = ChunkedRsaDecipher::new(other)
        .decrypt(SAMPLE_RSA_ARCHIVE.as_bytes())
        .unwrap_err();
    assert!(matches!(err, CryptoError::ChunkDecryption { index: 0, .. }));
}

#[test]
fn test_corrupted_chunk_is_reported_by_index() {
    let mut lines: Vec<String> = SAMPLE_RSA_ARCHIVE.lines().map(String::from).collect();
    lines[1] = lines[1].chars().rev().collect();
    let corrupted = lines.join("\n");

    let err = decipher().decrypt(corrupted.as_bytes()).unwrap_err();
    assert!(matches!(err, CryptoError::ChunkDecryption { index: 1, .. }));
}

#[test]
fn test_tiny_key_is_rejected() {
    let mut rng = rand::thread_rng();
    let key = rsa::RsaPrivateKey::new(&mut rng, 384).unwrap();
    let err = ChunkedRsaCipher::new(key.to_public_key()).unwrap_err();
    assert!(matches!(err, CryptoError::KeyTooSmall { bits: 384, .. }));
    assert_eq!(chunk_len(384), 0);
}

#[test]
fn test_passphrase_round_trip() {
    let cipher = PassphraseCipher::new("correct-horse");
    let artifact = ArchiveCipher::encrypt(&cipher, SAMPLE_DUMP.as_bytes()).unwrap();
    let plain = ArchiveDecipher::decrypt(&cipher, &artifact).unwrap();
    assert_eq!(plain, SAMPLE_DUMP.as_bytes());
    assert_eq!(ArchiveCipher::extension(&cipher), "aes-256-cbc");
}

#[test]
fn test_passphrase_decrypts_openssl_output() {
    let cipher = PassphraseCipher::new("correct-horse");
    let plain = cipher.decrypt(SAMPLE_AES_ARCHIVE.as_bytes()).expect("Decryption failed");
    assert_eq!(plain, b"{\"created\":1500000000,\"id\":\"evt_1\"}\n");
}

#[test]
fn test_wrong_passphrase_fails_cleanly() {
    let cipher = PassphraseCipher::new("battery-staple");
    assert!(cipher.decrypt(SAMPLE_AES_ARCHIVE.as_bytes()).is_err());
}
