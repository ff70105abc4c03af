//! Chunked RSA-OAEP archives
//!
//! Format: the plaintext is base64-encoded, the resulting text is cut into
//! chunks of `floor(modulus_bits / 8) - 50` characters, and every chunk is
//! OAEP-encrypted (SHA-1 digest, MGF1-SHA-1) and written as one base64 line.
//! Line order is the only framing; there is no header.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::error::{CryptoError, Result};
use crate::keys::{private_key_from_pem, public_key_from_pem};
use crate::{ArchiveCipher, ArchiveDecipher};

/// Bytes of the modulus reserved for OAEP padding
pub const OAEP_MARGIN: usize = 50;

/// SHA-1 output length, for the OAEP capacity bound `k - 2 * hLen - 2`
const SHA1_LEN: usize = 20;

const EXTENSION: &str = "enc";

/// Chunk length in base64 characters for a modulus of `modulus_bits`.
pub fn chunk_len(modulus_bits: usize) -> usize {
    (modulus_bits / 8).saturating_sub(OAEP_MARGIN)
}

fn oaep() -> Oaep {
    Oaep::new::<Sha1>()
}

/// Public-key half: encrypts archives it can never read back.
#[derive(Debug, Clone)]
pub struct ChunkedRsaCipher {
    key: RsaPublicKey,
    chunk_len: usize,
}

impl ChunkedRsaCipher {
    pub fn new(key: RsaPublicKey) -> Result<Self> {
        let bits = key.n().bits();
        let chunk_len = chunk_len(bits);
        let capacity = key.size().saturating_sub(2 * SHA1_LEN + 2);
        if chunk_len == 0 || chunk_len > capacity {
            return Err(CryptoError::KeyTooSmall {
                bits,
                margin: OAEP_MARGIN,
            });
        }
        Ok(Self { key, chunk_len })
    }

    pub fn from_pem(pem_str: &str) -> Result<Self> {
        Self::new(public_key_from_pem(pem_str)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem_str = std::fs::read_to_string(path.as_ref())?;
        let cipher = Self::from_pem(&pem_str)?;
        tracing::info!(
            path = %path.as_ref().display(),
            modulus_bits = cipher.key.n().bits(),
            chunk_len = cipher.chunk_len,
            "Loaded archive public key"
        );
        Ok(cipher)
    }

    /// Base64 characters carried per encrypted line
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }
}

impl ArchiveCipher for ChunkedRsaCipher {
    fn extension(&self) -> &'static str {
        EXTENSION
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let encoded = STANDARD.encode(plaintext);
        let mut rng = rand::thread_rng();

        let mut artifact = Vec::new();
        for chunk in encoded.as_bytes().chunks(self.chunk_len) {
            let ciphertext = self
                .key
                .encrypt(&mut rng, oaep(), chunk)
                .map_err(|e| CryptoError::Encryption(e.to_string()))?;
            artifact.extend_from_slice(STANDARD.encode(ciphertext).as_bytes());
            artifact.push(b'\n');
        }

        Ok(artifact)
    }
}

/// Private-key half, used by the offline decryption tool.
pub struct ChunkedRsaDecipher {
    key: RsaPrivateKey,
}

impl ChunkedRsaDecipher {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    pub fn from_pem(pem_str: &str, passphrase: Option<&str>) -> Result<Self> {
        Ok(Self::new(private_key_from_pem(pem_str, passphrase)?))
    }
}

impl ArchiveDecipher for ChunkedRsaDecipher {
    fn extension(&self) -> &'static str {
        EXTENSION
    }

    fn decrypt(&self, artifact: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(artifact)
            .map_err(|_| CryptoError::Malformed("archive is not text".into()))?;

        let mut encoded = Vec::with_capacity(text.len());
        let lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        for (index, line) in lines.enumerate() {
            let ciphertext = STANDARD.decode(line).map_err(|e| CryptoError::ChunkDecryption {
                index,
                reason: format!("invalid base64: {}", e),
            })?;
            let chunk = self
                .key
                .decrypt(oaep(), &ciphertext)
                .map_err(|e| CryptoError::ChunkDecryption {
                    index,
                    reason: e.to_string(),
                })?;
            encoded.extend_from_slice(&chunk);
        }

        STANDARD
            .decode(&encoded)
            .map_err(|e| CryptoError::Malformed(format!("decrypted payload is not base64: {}", e)))
    }
}
