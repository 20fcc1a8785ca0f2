//! Error types for smtp-messenger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown carrier: {0}")]
    UnknownCarrier(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Send failed: {} of {attempted} recipient(s) rejected: {}", .rejected.len(), describe(.rejected))]
    RecipientsRejected {
        attempted: usize,
        rejected: Vec<Rejection>,
    },

    #[error("Invalid provider settings: {0}")]
    InvalidPreset(String),

    #[error("{0}")]
    Validation(String),

    #[error("Message error: {0}")]
    Message(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures detected before any network activity
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_)
                | Error::UnknownCarrier(_)
                | Error::UnknownProvider(_)
                | Error::InvalidPreset(_)
                | Error::Validation(_)
                | Error::Message(_)
        )
    }
}

/// One recipient the server refused at RCPT TO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub recipient: String,
    pub reply: String,
}

fn describe(rejected: &[Rejection]) -> String {
    rejected
        .iter()
        .map(|r| format!("{} ({})", r.recipient, r.reply))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownCarrier("bogus".to_string());
        assert_eq!(err.to_string(), "Unknown carrier: bogus");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_validation_classification() {
        assert!(Error::InvalidAddress("x".into()).is_validation());
        assert!(Error::UnknownProvider("x".into()).is_validation());
        assert!(!Error::AuthenticationFailed("x".into()).is_validation());
        assert!(!Error::ConnectionFailed("x".into()).is_validation());
        assert!(!Error::SendFailed("x".into()).is_validation());
        assert!(!Error::RecipientsRejected {
            attempted: 1,
            rejected: Vec::new(),
        }
        .is_validation());
    }

    #[test]
    fn test_rejections_name_every_address() {
        let err = Error::RecipientsRejected {
            attempted: 3,
            rejected: vec![
                Rejection {
                    recipient: "bad@example.com".into(),
                    reply: "550 no such user".into(),
                },
                Rejection {
                    recipient: "gone@example.com".into(),
                    reply: "550 mailbox disabled".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Send failed: 2 of 3 recipient(s) rejected: bad@example.com (550 no such user), gone@example.com (550 mailbox disabled)"
        );
    }
}
