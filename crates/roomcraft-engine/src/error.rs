use std::path::PathBuf;

use roomcraft_contracts::settings::PROMPT_REQUIRED_REASON;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{name} is not a supported image")]
    NotAnImage { name: String },

    #[error("{name} is {size} bytes; the limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("at most {limit} reference images allowed ({current} added, {requested} requested)")]
    AuxiliaryLimit {
        limit: usize,
        current: usize,
        requested: usize,
    },

    #[error("no reference image at position {index} (have {len})")]
    NoSuchAuxiliary { index: usize, len: usize },

    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    #[error("{}", PROMPT_REQUIRED_REASON)]
    EmptyPrompt,

    #[error("a generation is already in progress ({attempt})")]
    AlreadyPending { attempt: String },

    #[error("{reason}")]
    Incomplete { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{message}")]
    Rejected { message: String },

    #[error("generation service returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Status { status, .. } => Some(*status),
            GenerationError::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Status { message, .. } | GenerationError::Rejected { message } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresenterError {
    #[error("no generated design to present")]
    NoResult,

    #[error("artifact url '{0}' is not supported")]
    UnsupportedUrl(String),

    #[error("artifact data url could not be decoded")]
    InvalidDataUrl,

    #[error("artifact download failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("artifact download returned {0}")]
    FetchStatus(u16),

    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("navigator failed to open {url}: {message}")]
    Navigator { url: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{key} has invalid value '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("endpoint '{0}' is not a valid url")]
    InvalidEndpoint(String),

    #[error("budget thresholds must satisfy low_max < medium_max (got {low_max} / {medium_max})")]
    InvalidThresholds { low_max: u32, medium_max: u32 },

    #[error("failed building http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
