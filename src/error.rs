pub type SlowChangeResult<T> = Result<T, SlowChangeError>;

#[derive(thiserror::Error, Debug)]
pub enum SlowChangeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing still image: {0}")]
    MissingStill(String),

    #[error("blend error: {0}")]
    Blend(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlowChangeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_still(msg: impl Into<String>) -> Self {
        Self::MissingStill(msg.into())
    }

    pub fn blend(msg: impl Into<String>) -> Self {
        Self::Blend(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
