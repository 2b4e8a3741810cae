use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable failure of a single ticker request.
///
/// None of these stop the collector; the poll attempt is dropped and the
/// window keeps going.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ticker endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ticker response is missing field '{0}'")]
    MissingField(&'static str),
}
