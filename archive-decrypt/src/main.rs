//! Archive Decrypt
//!
//! Restores archives written by event-archiver.
//!
//! Usage:
//!   archive-decrypt -k archive_key.pem 'backups/2017/*/*.jsonl.enc'
//!   archive-decrypt --password secret '*.jsonl.aes-256-cbc'

mod batch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use archive_crypto::{
    ArchiveDecipher, ChunkedRsaDecipher, PassphraseCipher, is_encrypted_private_key,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Decrypt files created by event-archiver.
#[derive(Parser)]
#[command(name = "archive-decrypt", version)]
struct Cli {
    /// Path or glob pattern of the encrypted file(s)
    #[arg(value_name = "FILES", required = true)]
    patterns: Vec<String>,

    /// Private key (PEM) for `.jsonl.enc` archives
    #[arg(short, long, value_name = "PATH")]
    key: Option<PathBuf>,

    /// Passphrase for an encrypted key; prompted for when needed
    #[arg(short = 'p', long = "pass", env = "ARCHIVE_KEY_PASSPHRASE", hide_env_values = true)]
    key_passphrase: Option<String>,

    /// Password for `.jsonl.aes-256-cbc` archives (ignored with --key)
    #[arg(long, env = "FILE_ENCRYPTION_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let files = match batch::expand_patterns(&cli.patterns) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("ERROR: Invalid file pattern: {e}");
            return ExitCode::FAILURE;
        }
    };
    if files.is_empty() {
        eprintln!("ERROR: No input files found.");
        return ExitCode::from(2);
    }

    let decipher = match load_decipher(&cli) {
        Ok(decipher) => decipher,
        Err(message) => {
            eprintln!("ERROR: {message}");
            return ExitCode::FAILURE;
        }
    };

    let summary = batch::run_batch(decipher.as_ref(), &files);
    tracing::info!(
        decrypted = summary.decrypted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Batch finished"
    );

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn load_decipher(cli: &Cli) -> Result<Box<dyn ArchiveDecipher>, String> {
    match (&cli.key, &cli.password) {
        (Some(path), _) => {
            let decipher = load_private_key(path, cli.key_passphrase.as_deref())?;
            Ok(Box::new(decipher))
        }
        (None, Some(password)) => Ok(Box::new(PassphraseCipher::new(password.as_str()))),
        (None, None) => Err(
            "Please provide a key path using the -k/--key argument or a password using --password."
                .to_string(),
        ),
    }
}

fn load_private_key(path: &Path, passphrase: Option<&str>) -> Result<ChunkedRsaDecipher, String> {
    let pem = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read key {}: {e}", path.display()))?;

    let prompted;
    let passphrase = match passphrase {
        Some(p) => Some(p),
        None if is_encrypted_private_key(&pem) => {
            prompted = rpassword::prompt_password(format!("Passphrase for key {}: ", path.display()))
                .map_err(|e| format!("Cannot read passphrase: {e}"))?;
            Some(prompted.as_str())
        }
        None => None,
    };

    ChunkedRsaDecipher::from_pem(&pem, passphrase)
        .map_err(|e| format!("Cannot load key {}: {e}", path.display()))
}
