use thiserror::Error;

/// Errors talking to external collaborators (identity, payment)
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {service}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Payment queue closed")]
    QueueClosed,
}

impl ClientError {
    /// Connection refused, DNS failure or timeout
    pub fn is_unreachable(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_connect() || e.is_timeout(),
            ClientError::QueueClosed => true,
            ClientError::UnexpectedStatus { .. } => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
