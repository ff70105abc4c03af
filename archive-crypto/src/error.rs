use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),
    #[error("Key is encrypted and no passphrase was given")]
    PassphraseRequired,
    #[error("Key too small: a {bits}-bit modulus cannot carry chunks with a {margin}-byte OAEP margin")]
    KeyTooSmall { bits: usize, margin: usize },
    #[error("Encryption failed: {0}")]
    Encryption(String),
    #[error("Decryption failed: {0}")]
    Decryption(String),
    #[error("Chunk {index} cannot be decrypted: {reason}")]
    ChunkDecryption { index: usize, reason: String },
    #[error("Malformed archive: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
