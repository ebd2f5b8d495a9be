use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZtaskError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ZtaskError {
    fn from(err: reqwest::Error) -> Self {
        ZtaskError::Api(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZtaskError>;
