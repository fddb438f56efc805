use std::path::PathBuf;

use thiserror::Error;

/// A required value or a malformed value in the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Please set the {name} environment variable.")]
    Missing { name: &'static str },

    #[error("{name} must be a date in YYYY-MM-DD form, got '{value}'")]
    InvalidDate { name: &'static str, value: String },

    #[error("FROM_DATE ({from}) is after TO_DATE ({to})")]
    InvertedRange { from: String, to: String },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Failure to produce a team roster from its members file.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse roster file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("roster file {} has no 'members' key", path.display())]
    MissingMembers { path: PathBuf },
}

/// A single GraphQL call that did not yield a usable body.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    #[error("Query failed with status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error sending GraphQL request: {0}")]
    Network(#[source] reqwest::Error),

    #[error("failed to parse JSON from GitHub: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("GraphQL reported errors: {}", messages.join("; "))]
    Graphql { messages: Vec<String> },
}

impl RemoteCallError {
    /// HTTP status of a failed exchange. `None` when the server never
    /// answered, or answered 200 with a rejected GraphQL body.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteCallError::Status { status, .. } => Some(*status),
            RemoteCallError::Network(e) | RemoteCallError::Decode(e) => {
                e.status().map(|s| s.as_u16())
            }
            RemoteCallError::Graphql { .. } => None,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteCallError::Status { status, .. } => *status >= 500,
            RemoteCallError::Network(_) => true,
            RemoteCallError::Decode(e) => e.is_timeout(),
            RemoteCallError::Graphql { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("fetching stats for '{login}' failed: {source}")]
    Member {
        login: String,
        #[source]
        source: RemoteCallError,
    },

    #[error("member task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to serialize team result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write team result to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write team result to stdout: {0}")]
    Stdout(#[source] std::io::Error),
}

/// Top-level error of a run; each category maps to its own exit code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Remote(#[from] AggregateError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_ROSTER: u8 = 3;
pub const EXIT_REMOTE: u8 = 4;
pub const EXIT_OUTPUT: u8 = 5;
pub const EXIT_PARTIAL: u8 = 6;

impl AppError {
    pub fn exit_status(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Client(_) => EXIT_CONFIG,
            AppError::Roster(_) => EXIT_ROSTER,
            AppError::Remote(_) => EXIT_REMOTE,
            AppError::Output(_) => EXIT_OUTPUT,
        }
    }
}
