use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    #[error("Command build error: {0}")]
    Build(#[from] BuildError),

    #[error("Transcode process error: {0}")]
    Process(String),
}

/// Failures of the media probe. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("file is not readable: {0}")]
    Unreadable(String),

    #[error("unsupported mimetype for {path}: {mimetype}")]
    UnsupportedMimetype { path: String, mimetype: String },

    #[error("failed to parse probe output: {0}")]
    ParseFailure(String),

    #[error("probe tool not found: {0}")]
    ToolNotFound(String),
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("invalid resolution '{0}', expected one of 720, 1080, 1440, 2160")]
    InvalidResolution(String),

    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("input path is empty")]
    EmptyInputPath,

    #[error("no streams to build a command for")]
    NoStreams,
}

pub type Result<T> = std::result::Result<T, ResizeError>;
