use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error object
    #[error("rpc error: {0}")]
    Rpc(String),

    /// HTTP-level failure reaching the node
    #[error("transport error: {0}")]
    Transport(String),

    /// The transaction was mined but reverted, or the node refused it
    #[error("transaction rejected: {0}")]
    TxRejected(String),

    #[error("confirmation timeout: {0}")]
    ConfirmationTimeout(String),

    #[error("invalid node response: {0}")]
    InvalidResponse(String),
}
