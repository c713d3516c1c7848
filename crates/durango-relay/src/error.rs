use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not connect to relay at `{url}`: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("failed to serialize client message: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("the relay link is closed")]
    LinkClosed,
    #[error("project registration request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },
    #[error("project registration returned status {status}")]
    RegisterRejected { status: u16 },
}
