use thiserror::Error;

/// Everything that can go wrong while serving an update.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metadata document could not be (de)serialized: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// What dispatcher endpoints return. `BotError` and the library errors all
/// convert into it with `?`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;
