use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerateError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// A caller-supplied parameter is empty or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A required settings path is absent. Carries the dotted path.
    #[error("missing config key: {0}")]
    MissingConfigKey(String),
    #[error("config key '{path}' must be {expected}")]
    InvalidConfigValue { path: String, expected: &'static str },
}

impl GenerateError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GenerateError::InvalidArgument(msg.into())
    }
}
