use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Coarse classification used for coloring and for restart polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Active,
    Inactive,
    Other,
}

/// Lifecycle status of a replication task, parsed once when a snapshot is
/// ingested. Unrecognized values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Starting,
    Replicating,
    Stopped,
    Stopping,
    Failed,
    Other(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => TaskStatus::Running,
            "starting" => TaskStatus::Starting,
            "replicating" => TaskStatus::Replicating,
            "stopped" => TaskStatus::Stopped,
            "stopping" => TaskStatus::Stopping,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Starting => "starting",
            TaskStatus::Replicating => "replicating",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Stopping => "stopping",
            TaskStatus::Failed => "failed",
            TaskStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            TaskStatus::Running | TaskStatus::Starting | TaskStatus::Replicating => {
                StatusClass::Active
            }
            TaskStatus::Stopped | TaskStatus::Stopping | TaskStatus::Failed => {
                StatusClass::Inactive
            }
            TaskStatus::Other(_) => StatusClass::Other,
        }
    }

    /// True once the task has come to rest after a stop request.
    pub fn is_at_rest(&self) -> bool {
        matches!(self, TaskStatus::Stopped | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Validated,
    Failed,
    Pending,
    Other,
}

/// Table validation state. Keeps the remote wording for display and the
/// classification for styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationState {
    text: String,
    kind: ValidationKind,
}

impl ValidationState {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim().to_string();
        let kind = match text.to_ascii_lowercase().as_str() {
            "validated" | "table validated" => ValidationKind::Validated,
            "error" | "failed" | "validation failed" => ValidationKind::Failed,
            "pending" | "not enabled" => ValidationKind::Pending,
            _ => ValidationKind::Other,
        };
        Self { text, kind }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> ValidationKind {
        self.kind
    }
}

impl Default for ValidationState {
    fn default() -> Self {
        Self::parse("")
    }
}

impl Serialize for ValidationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    pub full_load_progress_percent: i32,
    pub elapsed_time_millis: i64,
    pub tables_loaded: i32,
    pub tables_loading: i32,
    pub tables_queued: i32,
    pub tables_errored: i32,
    pub stop_reason: Option<String>,
}

/// One replication task as seen in a single fleet snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub arn: String,
    pub name: String,
    pub status: TaskStatus,
    pub migration_type: String,
    pub replication_instance_arn: String,
    pub source_endpoint_arn: String,
    pub target_endpoint_arn: String,
    pub table_mappings: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_failure_message: Option<String>,
    pub stats: Option<ProgressStats>,
}

impl TaskRecord {
    /// Minimal record, mostly useful for stubs and tests.
    pub fn new(arn: impl Into<String>, name: impl Into<String>, status: &str) -> Self {
        Self {
            arn: arn.into(),
            name: name.into(),
            status: TaskStatus::parse(status),
            migration_type: String::new(),
            replication_instance_arn: String::new(),
            source_endpoint_arn: String::new(),
            target_endpoint_arn: String::new(),
            table_mappings: None,
            created_at: None,
            started_at: None,
            last_failure_message: None,
            stats: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatRecord {
    pub schema_name: String,
    pub table_name: String,
    pub inserts: i64,
    pub deletes: i64,
    pub updates: i64,
    pub ddls: i64,
    pub full_load_rows: i64,
    pub last_update_time: Option<DateTime<Utc>>,
    pub validation_state: ValidationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    #[default]
    StartReplication,
    ResumeProcessing,
    ReloadTarget,
}

impl StartMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StartMode::StartReplication => "start-replication",
            StartMode::ResumeProcessing => "resume-processing",
            StartMode::ReloadTarget => "reload-target",
        }
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartMode {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "start-replication" => Ok(StartMode::StartReplication),
            "resume-processing" => Ok(StartMode::ResumeProcessing),
            "reload-target" => Ok(StartMode::ReloadTarget),
            other => Err(format!(
                "invalid start type: {other} (use start-replication, resume-processing, or reload-target)"
            )),
        }
    }
}

/// A fleet operation applied to each target independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start(StartMode),
    Stop,
    /// Stop then start against the same target.
    Restart(StartMode),
}

impl Operation {
    pub fn resume() -> Self {
        Operation::Start(StartMode::ResumeProcessing)
    }

    pub fn reload() -> Self {
        Operation::Restart(StartMode::ReloadTarget)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Start(StartMode::ResumeProcessing) => "resume",
            Operation::Start(_) => "start",
            Operation::Stop => "stop",
            Operation::Restart(StartMode::ReloadTarget) => "reload",
            Operation::Restart(_) => "restart",
        }
    }

    pub fn progressive(self) -> &'static str {
        match self {
            Operation::Start(StartMode::ResumeProcessing) => "Resuming",
            Operation::Start(_) => "Starting",
            Operation::Stop => "Stopping",
            Operation::Restart(StartMode::ReloadTarget) => "Reloading",
            Operation::Restart(_) => "Restarting",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Operation::Start(StartMode::ResumeProcessing) => "resumed",
            Operation::Start(_) => "started",
            Operation::Stop => "stopped",
            Operation::Restart(StartMode::ReloadTarget) => "reloaded",
            Operation::Restart(_) => "restarted",
        }
    }
}

/// Result of one operation against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub target: String,
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn succeeded(target: impl Into<String>, op: Operation) -> Self {
        Self {
            target: target.into(),
            success: true,
            message: format!("Successfully issued {} command", op.name()),
            error: None,
        }
    }

    pub fn failed(target: impl Into<String>, op: Operation, error: impl fmt::Display) -> Self {
        let detail = error.to_string();
        Self {
            target: target.into(),
            success: false,
            message: format!("Failed to {} task: {detail}", op.name()),
            error: Some(detail),
        }
    }
}

pub fn count_succeeded(outcomes: &[OperationOutcome]) -> usize {
    outcomes.iter().filter(|outcome| outcome.success).count()
}
