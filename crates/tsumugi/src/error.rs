use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsumugiError {
    #[error("Invalid MPD manifest: {0}")]
    ManifestParse(String),

    #[error("Invalid presentation duration: {0}")]
    InvalidDuration(String),

    #[error("No AdaptationSet found in MPD")]
    NoAdaptationSet,

    #[error("No Representation found in AdaptationSet")]
    NoRepresentation,

    #[error("Invalid number of track segments: {0}")]
    InvalidSegmentCount(String),

    #[error("No initialization segment or BaseURL for representation {0}")]
    MissingInitialization(String),

    #[error("Invalid byte range: {0}")]
    InvalidByteRange(String),

    #[error("Invalid ISO-BMFF box: {0}")]
    BoxParse(String),

    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Range request to {url} failed: {reason}")]
    RangeFetch { url: String, reason: String },

    #[error("Failed to download {url} after {attempts} attempts: {reason}")]
    Download {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Downloaded file is empty: {0}")]
    Integrity(PathBuf),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error(transparent)]
    MissingExecutable(#[from] which::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
}

impl TsumugiError {
    /// Whether the error stops the whole run instead of a single track.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ManifestParse(_)
                | Self::InvalidDuration(_)
                | Self::NoAdaptationSet
                | Self::NoRepresentation
                | Self::InvalidSegmentCount(_)
                | Self::UrlParse(_)
        )
    }
}

pub type TsumugiResult<T> = Result<T, TsumugiError>;
