use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in kapsul.
#[derive(Debug, Error)]
pub enum KapsulError {
    // --- Unlock errors ---
    #[error("Failed to unlock repository")]
    CantUnlock,

    #[error("Passphrase command returned {0} lines, expected exactly one")]
    AmbiguousPassphrase(usize),

    #[error("Passphrase command failed: {0}")]
    PassphraseCommandFailed(String),

    #[error("Passphrase command timed out after {0}s")]
    PassphraseCommandTimeout(u64),

    #[error("Passphrase prompt failed: {0}")]
    PromptFailed(String),

    #[error("Key file error: {0}")]
    KeyFileError(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Store / configuration errors ---
    #[error("Cannot open capsule at {location}: {cause}")]
    StoreOpen { location: String, cause: String },

    #[error("Unsupported transport '{0}'")]
    UnsupportedTransport(String),

    #[error("Capsule not found at {0}")]
    CapsuleNotFound(String),

    #[error("Capsule already exists at {0}")]
    CapsuleAlreadyExists(PathBuf),

    #[error("Invalid capsule format: {0}")]
    InvalidCapsule(String),

    #[error("Invalid repository configuration: {0}")]
    InvalidConfig(String),

    #[error("Incompatible repository version: {actual} != {expected}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Integrity check failed: capsule may be tampered or the key is wrong")]
    IntegrityMismatch,

    #[error("Entry '{0}' not found")]
    EntryNotFound(String),

    // --- Settings errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- Dispatch errors ---
    #[error("No command given")]
    NoCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("No capsule location given (use -f <path>)")]
    NoLocation,

    #[error("{command}: {message}")]
    InvalidArguments { command: String, message: String },

    /// `--help` on a subcommand; carries the rendered help text.
    #[error("{0}")]
    HelpRequested(String),

    #[error("Invalid number of cores: {requested}. Must be between 0 and {available}.")]
    InvalidCores { requested: i64, available: usize },

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("{0} is not available in this build")]
    Unsupported(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience type alias for kapsul results.
pub type Result<T> = std::result::Result<T, KapsulError>;
