use crate::validator::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not parse {path}: {source}")]
    ShardParse {
        path: String,
        source: serde_json::Error,
    },
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not parse schema: {0}")]
    SchemaParse(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Import path {0} does not exist")]
    ImportPathMissing(String),
    #[error("Folder {0} does not contain any of these folders: 'nodes', 'lists', 'relations'")]
    NoShards(String),
    #[error("export failed: {0}")]
    ExportRejected(String),
    #[error("upload rejected by server:\n{0}")]
    UploadRejected(String),
    #[error("unexpected response from server: {0}")]
    MalformedResponse(String),
}

impl Error {
    pub fn shard_parse<P: AsRef<std::path::Path>>(path: P, source: serde_json::Error) -> Self {
        Error::ShardParse {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
