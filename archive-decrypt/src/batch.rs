//! Batch decryption of archive files
//!
//! Each input ending in `.jsonl.<ext>` is decrypted next to itself with the
//! `.<ext>` stripped. Existing outputs are left alone. One bad file never
//! stops the batch.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use archive_crypto::{ArchiveDecipher, CryptoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum FileOutcome {
    Decrypted(PathBuf),
    /// Output already present, nothing written
    Exists(PathBuf),
    /// Not an archive for the active scheme
    Ignored,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub decrypted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Expand glob patterns in order, dropping duplicates and directories.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, glob::PatternError> {
    let mut files = Vec::new();
    for pattern in patterns {
        for path in glob::glob(pattern)?.flatten() {
            if path.is_file() && !files.contains(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// `x.jsonl.<ext>` → `x.jsonl`; `None` for any other name.
pub fn output_path(input: &Path, extension: &str) -> Option<PathBuf> {
    let name = input.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".jsonl.{extension}"))?;
    if stem.is_empty() {
        return None;
    }
    Some(input.with_file_name(format!("{stem}.jsonl")))
}

pub fn decrypt_file(
    decipher: &dyn ArchiveDecipher,
    input: &Path,
) -> Result<FileOutcome, DecryptError> {
    let Some(output) = output_path(input, decipher.extension()) else {
        return Ok(FileOutcome::Ignored);
    };
    if output.exists() {
        return Ok(FileOutcome::Exists(output));
    }

    let artifact = fs::read(input)?;
    let plaintext = decipher.decrypt(&artifact)?;
    tracing::debug!(input = %input.display(), bytes = plaintext.len(), "Decrypted");

    let file = match OpenOptions::new().write(true).create_new(true).open(&output) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Ok(FileOutcome::Exists(output));
        }
        Err(e) => return Err(e.into()),
    };
    write_or_discard(file, &output, &plaintext)?;
    Ok(FileOutcome::Decrypted(output))
}

/// Write `bytes` to the freshly created `output`; on failure the partial file
/// is removed so a later run can retry it.
fn write_or_discard<W: Write>(mut file: W, output: &Path, bytes: &[u8]) -> io::Result<()> {
    let result = file.write_all(bytes).and_then(|()| file.flush());
    if let Err(e) = result {
        drop(file);
        if let Err(cleanup) = fs::remove_file(output) {
            tracing::warn!(output = %output.display(), error = %cleanup, "Cannot remove partial output");
        }
        return Err(e);
    }
    Ok(())
}

/// Decrypt every file, reporting progress on stdout and problems on stderr.
pub fn run_batch(decipher: &dyn ArchiveDecipher, files: &[PathBuf]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for input in files {
        match decrypt_file(decipher, input) {
            Ok(FileOutcome::Decrypted(output)) => {
                println!("Decrypting {} to {}", input.display(), output.display());
                summary.decrypted += 1;
            }
            Ok(FileOutcome::Exists(output)) => {
                eprintln!(
                    "ERROR: File {} already exists. Not overwritten.",
                    output.display()
                );
                summary.skipped += 1;
            }
            Ok(FileOutcome::Ignored) => {
                tracing::debug!(input = %input.display(), "Ignoring file");
            }
            Err(e) => {
                eprintln!("ERROR: File {} cannot be decrypted.", input.display());
                eprintln!("Details: {e}.");
                summary.failed += 1;
            }
        }
    }
    summary
}
