use thiserror::Error;

/// Errors raised while talking to the text-generation server.
///
/// The `Display` text of every variant is what the client sees inside an
/// `{"error": ...}` frame, so messages are kept free of internal detail.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The server could not be reached (refused, DNS, connect timeout).
    #[error("Cannot connect to the model server at {url}. Is it running?")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("model server error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The connection failed after it was established (reset, truncated body).
    #[error("model server stream failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered 2xx but the body did not have the expected shape.
    #[error("invalid response from model server: {message}")]
    InvalidResponse { message: String },
}

impl UpstreamError {
    /// Classify a `reqwest` error raised while sending a request to `url`.
    pub(crate) fn from_send(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            UpstreamError::Connect {
                url: url.to_owned(),
                source: err,
            }
        } else {
            UpstreamError::Http(err)
        }
    }
}
