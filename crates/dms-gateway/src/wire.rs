//! JSON shapes of the control-plane protocol and their conversion into
//! core records.

use chrono::{DateTime, TimeZone, Utc};
use dms_core::{ProgressStats, TableStatRecord, TaskRecord, TaskStatus, ValidationState};
use serde::{Deserialize, Serialize};

pub const TASK_ARN_FILTER: &str = "replication-task-arn";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter<'a> {
    pub name: &'a str,
    pub values: Vec<&'a str>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTasksRequest<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_records: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableStatsRequest<'a> {
    pub replication_task_arn: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_records: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartTaskRequest<'a> {
    pub replication_task_arn: &'a str,
    pub start_replication_task_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopTaskRequest<'a> {
    pub replication_task_arn: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTasksResponse {
    #[serde(default)]
    pub replication_tasks: Vec<WireTask>,
    pub marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableStatsResponse {
    #[serde(default)]
    pub table_statistics: Vec<WireTableStat>,
    pub marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WireTask {
    pub replication_task_arn: String,
    pub replication_task_identifier: String,
    pub status: String,
    pub replication_instance_arn: String,
    pub source_endpoint_arn: String,
    pub target_endpoint_arn: String,
    pub migration_type: String,
    pub table_mappings: Option<String>,
    pub replication_task_creation_date: Option<f64>,
    pub replication_task_start_date: Option<f64>,
    pub last_failure_message: Option<String>,
    pub stop_reason: Option<String>,
    pub replication_task_stats: Option<WireTaskStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WireTaskStats {
    pub full_load_progress_percent: i32,
    pub elapsed_time_millis: i64,
    pub tables_loaded: i32,
    pub tables_loading: i32,
    pub tables_queued: i32,
    pub tables_errored: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WireTableStat {
    pub schema_name: String,
    pub table_name: String,
    pub inserts: i64,
    pub deletes: i64,
    pub updates: i64,
    pub ddls: i64,
    pub full_load_rows: i64,
    pub last_update_time: Option<f64>,
    pub validation_state: String,
}

/// Error body: `{"__type": "...", "message": "..."}`. Some services spell the
/// message key with a capital letter.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type", default)]
    pub kind: String,
    #[serde(alias = "Message", default)]
    pub message: String,
}

impl ErrorBody {
    /// Shape name without the namespace prefix some endpoints add.
    pub fn code(&self) -> &str {
        self.kind.rsplit('#').next().unwrap_or(&self.kind)
    }
}

fn epoch_seconds(value: Option<f64>) -> Option<DateTime<Utc>> {
    let value = value?;
    if !value.is_finite() {
        return None;
    }
    let secs = value.trunc() as i64;
    let nanos = ((value - value.trunc()) * 1e9).round() as u32;
    Utc.timestamp_opt(secs, nanos.min(999_999_999)).single()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

impl From<WireTask> for TaskRecord {
    fn from(task: WireTask) -> Self {
        let stop_reason = non_empty(task.stop_reason);
        let stats = task.replication_task_stats.map(|stats| ProgressStats {
            full_load_progress_percent: stats.full_load_progress_percent,
            elapsed_time_millis: stats.elapsed_time_millis,
            tables_loaded: stats.tables_loaded,
            tables_loading: stats.tables_loading,
            tables_queued: stats.tables_queued,
            tables_errored: stats.tables_errored,
            stop_reason,
        });
        TaskRecord {
            arn: task.replication_task_arn,
            name: task.replication_task_identifier,
            status: TaskStatus::parse(&task.status),
            migration_type: task.migration_type,
            replication_instance_arn: task.replication_instance_arn,
            source_endpoint_arn: task.source_endpoint_arn,
            target_endpoint_arn: task.target_endpoint_arn,
            table_mappings: non_empty(task.table_mappings),
            created_at: epoch_seconds(task.replication_task_creation_date),
            started_at: epoch_seconds(task.replication_task_start_date),
            last_failure_message: non_empty(task.last_failure_message),
            stats,
        }
    }
}

impl From<WireTableStat> for TableStatRecord {
    fn from(stat: WireTableStat) -> Self {
        TableStatRecord {
            schema_name: stat.schema_name,
            table_name: stat.table_name,
            inserts: stat.inserts,
            deletes: stat.deletes,
            updates: stat.updates,
            ddls: stat.ddls,
            full_load_rows: stat.full_load_rows,
            last_update_time: epoch_seconds(stat.last_update_time),
            validation_state: ValidationState::parse(&stat.validation_state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_core::ValidationKind;

    #[test]
    fn task_conversion_parses_status_and_timestamps() {
        let wire: WireTask = serde_json::from_str(
            r#"{
                "ReplicationTaskArn": "arn:aws:dms:us-east-1:1:task:A",
                "ReplicationTaskIdentifier": "orders",
                "Status": "stopped",
                "MigrationType": "cdc",
                "ReplicationTaskCreationDate": 1700000000.5,
                "StopReason": "Stop Reason STOPPED_BY_USER",
                "LastFailureMessage": "",
                "ReplicationTaskStats": { "FullLoadProgressPercent": 100, "TablesLoaded": 4 }
            }"#,
        )
        .unwrap();

        let task = TaskRecord::from(wire);
        assert_eq!(task.status, TaskStatus::Stopped);
        assert_eq!(task.name, "orders");
        assert_eq!(task.created_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(task.created_at.unwrap().timestamp_subsec_millis(), 500);
        assert!(task.started_at.is_none());
        assert!(task.last_failure_message.is_none());
        let stats = task.stats.unwrap();
        assert_eq!(stats.tables_loaded, 4);
        assert_eq!(stats.stop_reason.as_deref(), Some("Stop Reason STOPPED_BY_USER"));
    }

    #[test]
    fn table_stat_conversion_classifies_validation() {
        let wire: WireTableStat = serde_json::from_str(
            r#"{"SchemaName":"public","TableName":"users","Inserts":3,"ValidationState":"Table validated"}"#,
        )
        .unwrap();
        let stat = TableStatRecord::from(wire);
        assert_eq!(stat.inserts, 3);
        assert_eq!(stat.validation_state.kind(), ValidationKind::Validated);
        assert!(stat.last_update_time.is_none());
    }

    #[test]
    fn requests_omit_empty_fields() {
        let body = serde_json::to_string(&DescribeTasksRequest::default()).unwrap();
        assert_eq!(body, "{}");

        let filtered = DescribeTasksRequest {
            filters: vec![Filter {
                name: TASK_ARN_FILTER,
                values: vec!["arn:x"],
            }],
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&filtered).unwrap(),
            r#"{"Filters":[{"Name":"replication-task-arn","Values":["arn:x"]}]}"#
        );
    }

    #[test]
    fn error_code_drops_namespace() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"__type":"com.amazonaws.dms#ResourceNotFoundFault","Message":"gone"}"#,
        )
        .unwrap();
        assert_eq!(body.code(), "ResourceNotFoundFault");
        assert_eq!(body.message, "gone");
    }
}
