use std::time::Duration;
use thiserror::Error;

/// Failure reported by a fleet gateway call. Always converted into an
/// outcome or a failure event, never propagated out of a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("{code}: {message}")]
    Remote { code: String, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failure to establish a session with the remote system. Fatal: nothing is
/// attempted after one of these.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("no region configured; pass --region or set AWS_REGION")]
    MissingRegion,
    #[error("no credentials found for profile '{profile}'")]
    MissingCredentials { profile: String },
    #[error("failed to load credentials for profile '{profile}': {reason}")]
    Credentials { profile: String, reason: String },
    #[error("failed to read AWS profile data from {path}: {reason}")]
    Profile { path: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Non-fatal problems found while resolving identifiers. Printed as warnings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no tasks matched pattern '{0}'")]
    PatternMatchedNothing(String),
    #[error("task '{0}' not found")]
    NameNotFound(String),
    #[error("task name '{name}' is ambiguous ({count} tasks share it)")]
    AmbiguousName { name: String, count: usize },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no valid tasks found")]
pub struct EmptyTargetSet;

/// Why a single fan-out unit failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to stop task during restart: {0}")]
    RestartStop(GatewayError),
    #[error("failed to poll task status during restart: {0}")]
    RestartPoll(GatewayError),
    #[error("task did not stop within {}s; start not attempted", .0.as_secs())]
    RestartTimeout(Duration),
    #[error("failed to start task during restart: {0}")]
    RestartStart(GatewayError),
    #[error("worker aborted: {0}")]
    Aborted(String),
}
