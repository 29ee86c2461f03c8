//! Error types for the signalling core

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SigError>;

/// Top-level signalling error
#[derive(Debug, Error)]
pub enum SigError {
    #[error("ASN.1 error: {0}")]
    Asn(#[from] AsnError),

    #[error("MIB error: {0}")]
    Mib(#[from] MibError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Label error: {0}")]
    Label(#[from] LabelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// ASN.1 BER codec errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AsnError {
    #[error("invalid length or tag")]
    InvalidLengthOrTag,

    #[error("invalid contents")]
    InvalidContents,

    #[error("parse error")]
    Parse,
}

/// MIB tree errors
#[derive(Debug, Error)]
pub enum MibError {
    #[error("unknown access level: {0}")]
    UnknownAccess(String),

    #[error("load failed: {0}")]
    Load(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("invalid point code: {0}")]
    PointCode(String),
}

/// Point code / label errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("unknown point code type: {0}")]
    UnknownType(String),

    #[error("invalid point code: {0}")]
    InvalidPointCode(String),

    #[error("buffer too short")]
    BufferTooShort,
}
