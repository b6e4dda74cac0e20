//! In-process stand-in for the replication control plane.
//!
//! Speaks the same JSON-1.1 protocol as the real service: every call is a
//! `POST /` whose action is named by the `X-Amz-Target` header. State lives in
//! a [`Fleet`] behind a shared lock so tests can seed it, inject failures and
//! inspect the requests that reached it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const TARGET_PREFIX: &str = "AmazonDMSv20160101.";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
pub const MOCK_ACCOUNT_PREFIX: &str = "arn:aws:dms:us-east-1:123456789012";

const DEFAULT_MAX_RECORDS: usize = 100;

pub type SharedFleet = Arc<Mutex<Fleet>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MockTaskStats {
    pub full_load_progress_percent: i32,
    pub elapsed_time_millis: i64,
    pub tables_loaded: i32,
    pub tables_loading: i32,
    pub tables_queued: i32,
    pub tables_errored: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MockTask {
    pub replication_task_arn: String,
    pub replication_task_identifier: String,
    pub status: String,
    pub replication_instance_arn: String,
    pub source_endpoint_arn: String,
    pub target_endpoint_arn: String,
    pub migration_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_mappings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_task_creation_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_task_start_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_task_stats: Option<MockTaskStats>,
}

impl MockTask {
    /// A task under the mock account with shared instance and endpoints.
    pub fn new(identifier: &str, status: &str) -> Self {
        Self {
            replication_task_arn: format!("{MOCK_ACCOUNT_PREFIX}:task:{identifier}"),
            replication_task_identifier: identifier.to_string(),
            status: status.to_string(),
            replication_instance_arn: format!("{MOCK_ACCOUNT_PREFIX}:rep:mock-instance"),
            source_endpoint_arn: format!("{MOCK_ACCOUNT_PREFIX}:endpoint:mock-source"),
            target_endpoint_arn: format!("{MOCK_ACCOUNT_PREFIX}:endpoint:mock-target"),
            migration_type: "full-load".to_string(),
            table_mappings: None,
            replication_task_creation_date: None,
            replication_task_start_date: None,
            last_failure_message: None,
            stop_reason: None,
            replication_task_stats: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MockTableStat {
    pub schema_name: String,
    pub table_name: String,
    pub inserts: i64,
    pub deletes: i64,
    pub updates: i64,
    pub ddls: i64,
    pub full_load_rows: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<i64>,
    pub validation_state: String,
}

impl MockTableStat {
    pub fn new(schema: &str, table: &str, validation_state: &str) -> Self {
        Self {
            schema_name: schema.to_string(),
            table_name: table.to_string(),
            inserts: 0,
            deletes: 0,
            updates: 0,
            ddls: 0,
            full_load_rows: 0,
            last_update_time: None,
            validation_state: validation_state.to_string(),
        }
    }
}

/// Error shape returned to clients: `{"__type": code, "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl Fault {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "ResourceNotFoundFault", message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidResourceStateFault", message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "AccessDeniedException", message)
    }

    fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "__type": self.code, "message": self.message });
        amz_json(self.status, &body)
    }
}

/// One request as it reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub action: String,
    pub arn: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
pub struct Fleet {
    tasks: Vec<MockTask>,
    table_stats: HashMap<String, Vec<MockTableStat>>,
    failures: HashMap<(String, String), Fault>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Filter {
    name: String,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTasksRequest {
    #[serde(default)]
    filters: Vec<Filter>,
    marker: Option<String>,
    max_records: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TableStatsRequest {
    replication_task_arn: String,
    marker: Option<String>,
    max_records: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskActionRequest {
    replication_task_arn: String,
    start_replication_task_type: Option<String>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Three tasks (`running`, `stopped`, `failed`) with table statistics for
    /// the first two.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let epoch = |hours_ago: i64| (now - Duration::hours(hours_ago)).timestamp();
        let mappings = |schema: &str| {
            format!(
                r#"{{"rules":[{{"rule-type":"selection","rule-id":"1","rule-name":"1","object-locator":{{"schema-name":"{schema}","table-name":"%"}},"rule-action":"include"}}]}}"#
            )
        };

        let mut running = MockTask::new("mock-task-1", "running");
        running.table_mappings = Some(mappings("%"));
        running.replication_task_creation_date = Some(epoch(24));
        running.replication_task_start_date = Some(epoch(2));
        running.replication_task_stats = Some(MockTaskStats {
            full_load_progress_percent: 75,
            elapsed_time_millis: 7_200_000,
            tables_loaded: 15,
            tables_loading: 3,
            tables_queued: 2,
            ..MockTaskStats::default()
        });

        let mut stopped = MockTask::new("mock-task-2", "stopped");
        stopped.migration_type = "full-load-and-cdc".to_string();
        stopped.table_mappings = Some(mappings("public"));
        stopped.replication_task_creation_date = Some(epoch(48));
        stopped.replication_task_stats = Some(MockTaskStats {
            full_load_progress_percent: 100,
            tables_loaded: 25,
            ..MockTaskStats::default()
        });
        stopped.stop_reason = Some("Stop Reason FULL_LOAD_ONLY_FINISHED".to_string());

        let mut failed = MockTask::new("mock-task-3", "failed");
        failed.migration_type = "cdc".to_string();
        failed.table_mappings = Some(mappings("app"));
        failed.replication_task_creation_date = Some(epoch(72));
        failed.last_failure_message = Some("Connection timeout to source database".to_string());
        failed.replication_task_stats = Some(MockTaskStats {
            full_load_progress_percent: 45,
            tables_loaded: 10,
            tables_queued: 5,
            tables_errored: 1,
            ..MockTaskStats::default()
        });

        let updated = Some(now.timestamp());
        let stat = |table: &str, inserts: i64, deletes: i64, updates: i64, rows: i64, state: &str| {
            MockTableStat {
                inserts,
                deletes,
                updates,
                full_load_rows: rows,
                last_update_time: updated,
                ..MockTableStat::new("public", table, state)
            }
        };

        let mut fleet = Self::new();
        fleet.set_table_stats(
            &running.replication_task_arn,
            vec![
                stat("users", 100, 5, 20, 1000, "Validated"),
                stat("orders", 500, 10, 50, 5000, "Validated"),
                stat("products", 50, 0, 10, 500, "Validated"),
            ],
        );
        fleet.set_table_stats(
            &stopped.replication_task_arn,
            vec![stat("inventory", 10, 0, 5, 100, "Pending")],
        );
        fleet.insert_task(running);
        fleet.insert_task(stopped);
        fleet.insert_task(failed);
        fleet
    }

    pub fn insert_task(&mut self, task: MockTask) {
        self.tasks.push(task);
    }

    pub fn set_table_stats(&mut self, arn: &str, stats: Vec<MockTableStat>) {
        self.table_stats.insert(arn.to_string(), stats);
    }

    /// Every later `action` call against `arn` fails with `fault`.
    pub fn inject_failure(&mut self, action: &str, arn: &str, fault: Fault) {
        self.failures
            .insert((action.to_string(), arn.to_string()), fault);
    }

    pub fn task(&self, arn: &str) -> Option<&MockTask> {
        self.tasks.iter().find(|task| task.replication_task_arn == arn)
    }

    pub fn tasks(&self) -> &[MockTask] {
        &self.tasks
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn record(&mut self, request: RecordedRequest) {
        self.requests.push(request);
    }

    /// Applies one action. The returned value is the JSON response body.
    pub fn handle(&mut self, action: &str, body: &[u8]) -> Result<Value, Fault> {
        match action {
            "DescribeReplicationTasks" => self.describe_tasks(parse(body)?),
            "DescribeTableStatistics" => self.table_statistics(parse(body)?),
            "StartReplicationTask" => {
                let request: TaskActionRequest = parse(body)?;
                self.check_injected(action, &request.replication_task_arn)?;
                self.start(request)
            }
            "StopReplicationTask" => {
                let request: TaskActionRequest = parse(body)?;
                self.check_injected(action, &request.replication_task_arn)?;
                self.stop(&request.replication_task_arn)
            }
            other => Err(Fault::bad_request(
                "UnknownOperationException",
                format!("unknown action: {other}"),
            )),
        }
    }

    fn check_injected(&self, action: &str, arn: &str) -> Result<(), Fault> {
        match self.failures.get(&(action.to_string(), arn.to_string())) {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn describe_tasks(&self, request: DescribeTasksRequest) -> Result<Value, Fault> {
        let arn_filter = request
            .filters
            .iter()
            .find(|filter| filter.name == "replication-task-arn");

        let matching: Vec<&MockTask> = match arn_filter {
            Some(filter) => {
                for arn in &filter.values {
                    self.check_injected("DescribeReplicationTasks", arn)?;
                }
                let found: Vec<&MockTask> = self
                    .tasks
                    .iter()
                    .filter(|task| filter.values.contains(&task.replication_task_arn))
                    .collect();
                if found.is_empty() {
                    return Err(Fault::not_found("No Tasks found matching provided filters"));
                }
                found
            }
            None => self.tasks.iter().collect(),
        };

        let (page, marker) = paginate(&matching, request.marker.as_deref(), request.max_records)?;
        Ok(page_body("ReplicationTasks", page, marker))
    }

    fn table_statistics(&self, request: TableStatsRequest) -> Result<Value, Fault> {
        let arn = &request.replication_task_arn;
        self.check_injected("DescribeTableStatistics", arn)?;
        if self.task(arn).is_none() {
            return Err(Fault::not_found(format!("task {arn} not found")));
        }
        let stats = self.table_stats.get(arn).map(Vec::as_slice).unwrap_or(&[]);
        let (page, marker) = paginate(stats, request.marker.as_deref(), request.max_records)?;
        Ok(page_body("TableStatistics", page, marker))
    }

    fn start(&mut self, request: TaskActionRequest) -> Result<Value, Fault> {
        let arn = request.replication_task_arn;
        let task = self.task_mut(&arn)?;
        task.status = "starting".to_string();
        task.stop_reason = None;
        task.replication_task_start_date = Some(Utc::now().timestamp());
        info!(
            task = %task.replication_task_identifier,
            start_type = request.start_replication_task_type.as_deref().unwrap_or("start-replication"),
            "task started"
        );
        Ok(serde_json::json!({ "ReplicationTask": task }))
    }

    fn stop(&mut self, arn: &str) -> Result<Value, Fault> {
        let task = self.task_mut(arn)?;
        task.status = "stopping".to_string();
        task.stop_reason = Some("Stop Reason STOPPED_BY_USER".to_string());
        info!(task = %task.replication_task_identifier, "task stopped");
        Ok(serde_json::json!({ "ReplicationTask": task }))
    }

    fn task_mut(&mut self, arn: &str) -> Result<&mut MockTask, Fault> {
        self.tasks
            .iter_mut()
            .find(|task| task.replication_task_arn == arn)
            .ok_or_else(|| Fault::not_found(format!("task {arn} not found")))
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, Fault> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|err| Fault::bad_request("SerializationException", err.to_string()))
}

fn paginate<T: Clone>(
    items: &[T],
    marker: Option<&str>,
    max_records: Option<usize>,
) -> Result<(Vec<T>, Option<String>), Fault> {
    let start = match marker {
        Some(marker) => marker.parse::<usize>().map_err(|_| {
            Fault::bad_request("InvalidParameterValueException", format!("bad marker: {marker}"))
        })?,
        None => 0,
    };
    let limit = max_records.unwrap_or(DEFAULT_MAX_RECORDS).max(1);
    let end = items.len().min(start.saturating_add(limit));
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    Ok((page, next))
}

fn page_body<T: Serialize>(key: &str, page: Vec<T>, marker: Option<String>) -> Value {
    let mut body = Map::new();
    body.insert(
        key.to_string(),
        serde_json::to_value(page).unwrap_or(Value::Array(Vec::new())),
    );
    if let Some(marker) = marker {
        body.insert("Marker".to_string(), Value::String(marker));
    }
    Value::Object(body)
}

fn amz_json(status: StatusCode, body: &Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        body.to_string(),
    )
        .into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn request_arn(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    if let Some(arn) = value.get("ReplicationTaskArn").and_then(Value::as_str) {
        return Some(arn.to_string());
    }
    value
        .get("Filters")?
        .as_array()?
        .iter()
        .find(|filter| filter.get("Name").and_then(Value::as_str) == Some("replication-task-arn"))?
        .get("Values")?
        .get(0)?
        .as_str()
        .map(str::to_string)
}

pub fn router(fleet: SharedFleet) -> Router {
    Router::new()
        .route("/", post(dispatch))
        .route("/health", get(|| async { "ok" }))
        .with_state(fleet)
}

pub fn shared(fleet: Fleet) -> SharedFleet {
    Arc::new(Mutex::new(fleet))
}

async fn dispatch(State(fleet): State<SharedFleet>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(action) = header_str(&headers, "x-amz-target")
        .and_then(|target| target.strip_prefix(TARGET_PREFIX))
        .map(str::to_string)
    else {
        warn!("request without a recognizable X-Amz-Target");
        return Fault::bad_request("UnknownOperationException", "missing X-Amz-Target").into_response();
    };

    let mut guard = fleet.lock().await;
    guard.record(RecordedRequest {
        action: action.clone(),
        arn: request_arn(&body),
        authorization: header_str(&headers, "authorization").map(str::to_string),
    });

    match guard.handle(&action, &body) {
        Ok(value) => {
            debug!(action = %action, "request handled");
            amz_json(StatusCode::OK, &value)
        }
        Err(fault) => {
            warn!(action = %action, code = %fault.code, "request rejected: {}", fault.message);
            fault.into_response()
        }
    }
}
