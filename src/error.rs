use thiserror::Error;

pub type Result<T> = std::result::Result<T, DigestError>;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },
    #[error("Store error: {0}")]
    Store(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Invalid repository name '{0}', expected org/name")]
    InvalidRepoName(String),
    #[error("Repository {repo} is not linked to {email}")]
    RepoNotLinked { email: String, repo: String },
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl From<figment::Error> for DigestError {
    fn from(err: figment::Error) -> Self {
        DigestError::Config(err.to_string())
    }
}

/// Failures that stop the weekly job before anything is delivered.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("account email must not be empty")]
    EmptyAccount,
    #[error("query failed: {0}")]
    Query(#[source] DigestError),
}

impl From<DigestError> for JobError {
    fn from(err: DigestError) -> Self {
        JobError::Query(err)
    }
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("webhook unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
