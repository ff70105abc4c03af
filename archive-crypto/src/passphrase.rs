//! Passphrase archives, interchangeable with
//! `openssl enc -aes-256-cbc -base64 -md sha256`.
//!
//! Format: base64(`Salted__` || salt_8bytes || AES-256-CBC ciphertext), wrapped
//! at 64 columns. Key and IV come from EVP_BytesToKey over SHA-256 with a
//! single iteration, which is what `openssl enc` does without `-pbkdf2`.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};
use crate::{ArchiveCipher, ArchiveDecipher};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const LINE_WIDTH: usize = 64;
const EXTENSION: &str = "aes-256-cbc";

/// Symmetric archive cipher keyed by a shared passphrase
#[derive(Clone)]
pub struct PassphraseCipher {
    passphrase: Vec<u8>,
}

impl Drop for PassphraseCipher {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

impl PassphraseCipher {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into().into_bytes(),
        }
    }

    fn encrypt_with_salt(&self, plaintext: &[u8], salt: [u8; SALT_LEN]) -> Vec<u8> {
        let (mut key, mut iv) = derive_key_iv(&self.passphrase, &salt);
        let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        key.zeroize();
        iv.zeroize();

        let mut raw = Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
        raw.extend_from_slice(MAGIC);
        raw.extend_from_slice(&salt);
        raw.extend_from_slice(&ciphertext);

        wrap_lines(&STANDARD.encode(&raw))
    }
}

impl ArchiveCipher for PassphraseCipher {
    fn extension(&self) -> &'static str {
        EXTENSION
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut salt);
        Ok(self.encrypt_with_salt(plaintext, salt))
    }
}

impl ArchiveDecipher for PassphraseCipher {
    fn extension(&self) -> &'static str {
        EXTENSION
    }

    fn decrypt(&self, artifact: &[u8]) -> Result<Vec<u8>> {
        let compact: Vec<u8> = artifact
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let raw = STANDARD
            .decode(&compact)
            .map_err(|e| CryptoError::Malformed(format!("invalid base64: {}", e)))?;

        let header_len = MAGIC.len() + SALT_LEN;
        if raw.len() < header_len + BLOCK_LEN || &raw[..MAGIC.len()] != MAGIC {
            return Err(CryptoError::Malformed("missing 'Salted__' header".into()));
        }
        let salt = &raw[MAGIC.len()..header_len];
        let ciphertext = &raw[header_len..];
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::Malformed(
                "ciphertext is not a whole number of blocks".into(),
            ));
        }

        let (mut key, mut iv) = derive_key_iv(&self.passphrase, salt);
        let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::Decryption("wrong passphrase or corrupted data".into()));
        key.zeroize();
        iv.zeroize();
        plaintext
    }
}

/// OpenSSL EVP_BytesToKey with SHA-256 and one iteration
fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut derived = Vec::with_capacity(KEY_LEN + IV_LEN + 32);
    let mut block: Vec<u8> = Vec::new();
    while derived.len() < KEY_LEN + IV_LEN {
        let mut hasher = Sha256::new();
        hasher.update(&block);
        hasher.update(passphrase);
        hasher.update(salt);
        block = hasher.finalize().to_vec();
        derived.extend_from_slice(&block);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..KEY_LEN + IV_LEN]);
    derived.zeroize();
    block.zeroize();
    (key, iv)
}

fn wrap_lines(encoded: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 1);
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}
