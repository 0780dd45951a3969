/// Core error type.
///
/// Adapter crates should map their specific errors into this type so the
/// poll cycle can handle failures consistently (contained per uid, logged,
/// never fatal to the process).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
