//! Error types for scenery-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("truncated record: {0}")]
    TruncatedRecord(String),

    #[error("corrupt BTG property: {0}")]
    CorruptProperty(String),

    #[error("corrupt BTG element: {0}")]
    CorruptElement(String),

    #[error("unknown subrecord id {id:#06x} in {context}")]
    UnknownSubrecordId { id: u16, context: String },

    #[error("texture not found: {0}")]
    TextureResolutionMiss(String),

    #[error("invalid transform: {0}")]
    TransformInvalid(String),

    #[error("failed to copy texture {src} -> {dst}: {source}")]
    IoCopyFailure {
        src: String,
        dst: String,
        #[source]
        source: std::io::Error,
    },

    #[error("input path does not exist: {0}")]
    InputPathMissing(String),

    #[error("tile index out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("terrain provider error: {0}")]
    TerrainProvider(String),
}

// Add conversion from toml::de::Error
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
