use thiserror::Error;

/// A required credential or identity is absent from the process configuration.
///
/// Never fatal: the operation that needed the value is skipped and logged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("configuration missing: {what}")]
pub struct ConfigurationMissing {
    pub what: &'static str,
}

impl ConfigurationMissing {
    pub fn new(what: &'static str) -> Self {
        Self { what }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("catalog source unreachable: {0}")]
    Transport(String),
    #[error("catalog source answered with status {status}")]
    Status { status: u16 },
    #[error("catalog feed could not be parsed: {0}")]
    Parse(String),
    #[error("catalog file could not be read: {0}")]
    Io(String),
    #[error("embedding source failed: {0}")]
    Embedding(String),
    #[error("catalog feed contained no rows with a product name")]
    Empty,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation endpoint answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation response could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    ConfigurationMissing(#[from] ConfigurationMissing),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("outbound request failed: {0}")]
    Transport(String),
    #[error("messaging platform rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error(transparent)]
    ConfigurationMissing(#[from] ConfigurationMissing),
}

impl FetchError {
    /// Short stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Parse(_) => "parse",
            Self::Io(_) => "io",
            Self::Embedding(_) => "embedding",
            Self::Empty => "empty",
        }
    }
}
