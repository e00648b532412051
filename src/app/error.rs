use thiserror::Error;

#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not signed in or session expired")]
    Unauthorized,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl MurmurError {
    /// Short message suitable for showing next to a retry affordance.
    pub fn user_message(&self) -> String {
        match self {
            MurmurError::Http(e) if e.is_timeout() => {
                "The server took too long to respond. Please try again.".into()
            }
            MurmurError::Http(_) => "Network error. Check your connection and retry.".into(),
            MurmurError::Unauthorized => "Please sign in again.".into(),
            MurmurError::Api { message, .. } if !message.is_empty() => message.clone(),
            MurmurError::Api { status, .. } => format!("Request failed ({})", status),
            MurmurError::Decode(_) => "Received an unexpected response from the server.".into(),
            MurmurError::PostNotFound(_) => "This post is no longer available.".into(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MurmurError>;
