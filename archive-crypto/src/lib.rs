//! Encryption of archive dumps at rest.
//!
//! Two interchangeable schemes, chosen by the caller at construction time:
//!
//! - [`PassphraseCipher`]: AES-256-CBC in the `openssl enc -base64` format,
//!   symmetric, so the archiver can also read its own output.
//! - [`ChunkedRsaCipher`]: base64 payload split into chunks that are each
//!   RSA-OAEP encrypted under a public key. Only the holder of the private
//!   key ([`ChunkedRsaDecipher`]) can read the archive back.

mod chunked;
mod error;
mod keys;
mod passphrase;

pub use chunked::{ChunkedRsaCipher, ChunkedRsaDecipher, OAEP_MARGIN, chunk_len};
pub use error::{CryptoError, Result};
pub use keys::{is_encrypted_private_key, private_key_from_pem, public_key_from_pem};
pub use passphrase::PassphraseCipher;

/// Encrypt side of an archive scheme.
pub trait ArchiveCipher: Send + Sync {
    /// File extension appended to the dump name, without the leading dot.
    fn extension(&self) -> &'static str;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
}

/// Decrypt side of an archive scheme.
pub trait ArchiveDecipher: Send + Sync {
    fn extension(&self) -> &'static str;

    fn decrypt(&self, artifact: &[u8]) -> Result<Vec<u8>>;
}
