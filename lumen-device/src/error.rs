//! Error types for the dimmer engine
//!
//! None of these ever take the process down: the run loops log them and go
//! back to scanning.

use std::path::PathBuf;

/// Radio-level failure of one connection attempt
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("service {0} not found")]
    ServiceNotFound(&'static str),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(&'static str),
    #[error("write not acknowledged: {0}")]
    WriteFailed(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("radio error: {0}")]
    Radio(String),
}

/// Non-volatile storage failure
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read {slot}: {reason}")]
    Read { slot: &'static str, reason: String },
    #[error("failed to write {slot}: {reason}")]
    Write { slot: &'static str, reason: String },
}

/// Rejected input; nothing of it was applied
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("profile name must not be empty")]
    EmptyProfileName,
    #[error("profile '{0}' has no levels")]
    EmptyProfile(String),
    #[error("profile '{profile}' level {index} is not in [0, 1]: {level}")]
    LevelOutOfRange {
        profile: String,
        index: usize,
        level: f32,
    },
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Pairing state machine misuse or failed commit
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("pairing exchange already in progress")]
    Busy,
    #[error("no pairing exchange in progress")]
    NotAwaiting,
    #[error("failed to commit new key: {0}")]
    Commit(#[from] PersistenceError),
}

/// Any error a session can end with
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Pairing(#[from] PairingError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no home directory, set LUMEN_HOME")]
    NoHome,
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid config file {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}
