use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error,Debug)]
pub enum Error {
    #[error("CSV error: {0}")]
    CSV(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JSON(#[from] serde_json::Error),
    #[error("Request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),
    #[error("Date parse error: {0}")]
    ParseDate(#[from] chrono::format::ParseError),
    #[error("Invalid configuration {name}: {reason}")]
    Config { name: String, reason: String },
    #[error("Refresh task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("No data!")]
    MissingData,
}

impl Error {

    pub fn config(name: &str, reason: impl ToString) -> Self {
	Self::Config { name: name.to_string(), reason: reason.to_string() }
    }

}
