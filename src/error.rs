//! Error types for the consensus core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid difficulty target: {0}")]
    InvalidTarget(String),

    #[error("Malformed mining pool: {0}")]
    MalformedPool(String),

    #[error("Economic validation failed: {0}")]
    EconomicValidation(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Identity error: {0}")]
    Identity(#[from] secp256k1::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Miner is not running")]
    MinerStopped,

    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
