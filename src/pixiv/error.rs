use thiserror::Error;

/// Errors from the pixiv app API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error requesting {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body was not a listing (no `illusts` array) or an entry
    /// in it could not be decoded. Drives the engine's page-fetch retry.
    #[error("malformed listing response: {0}")]
    MalformedResponse(String),

    #[error("failed to write downloaded file {path}: {source}")]
    Disk {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
