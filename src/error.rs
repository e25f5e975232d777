//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Market protocol crate error enum.
pub enum Error {
    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    #[error("Failed to parse packet bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    /// Id bytes are not exactly [crate::ID_SIZE] long.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Id string is not a valid hex encoding.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    /// Indicates that the message transaction_id is not two bytes.
    #[error("Invalid transaction_id: {0:?}")]
    InvalidTransactionId(Vec<u8>),

    /// Advertised public key is not 32 bytes.
    #[error("Invalid public key size, expected 32, got {0}")]
    InvalidPublicKeySize(usize),

    /// Encoded message does not fit in a single UDP datagram.
    #[error("Message of {0} bytes does not fit in a datagram")]
    DatagramTooLarge(usize),

    /// Command identifier is not one of [crate::Command::ALL].
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
