//! Error type shared by the engine, the Kokoro backend and the HTTP layer.

/// Everything that can go wrong between receiving text and returning audio.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// The model could not be made ready.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// The model was ready but synthesis failed. The message is passed
    /// through to HTTP clients unchanged.
    #[error("{0}")]
    Generation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("audio encoding failed: {0}")]
    Encode(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type TtsResult<T> = Result<T, TtsError>;

impl TtsError {
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }
}

impl From<hound::Error> for TtsError {
    fn from(err: hound::Error) -> Self {
        Self::Encode(err.to_string())
    }
}
