use std::io::Write;

use anyhow::{Context, Result};
use dms_core::{resolve_targets, FanOutExecutor, FleetGateway, Operation};
use tracing::info;

use crate::output;

pub async fn list(
    gateway: &dyn FleetGateway,
    out: &mut impl Write,
    header: (&str, &str),
    stats: bool,
    json: bool,
) -> Result<()> {
    let tasks = gateway.list_tasks().await.context("failed to list tasks")?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &tasks)?;
        writeln!(out)?;
        return Ok(());
    }

    output::write_session_header(out, header.0, header.1)?;
    if tasks.is_empty() {
        writeln!(out, "No DMS replication tasks found.")?;
        return Ok(());
    }
    if stats {
        output::write_task_summaries(out, &tasks)?;
    } else {
        output::write_task_table(out, &tasks)?;
    }
    output::write_total(out, tasks.len())?;
    Ok(())
}

/// Describes each resolved task; one failure does not stop the rest.
pub async fn describe(
    gateway: &dyn FleetGateway,
    out: &mut impl Write,
    requested: &[String],
    tables: bool,
) -> Result<()> {
    let resolution = resolve_targets(gateway, requested)
        .await
        .context("failed to list tasks")?;
    output::write_warnings(out, &resolution.warnings)?;
    let targets = resolution.require_targets()?;

    for (index, arn) in targets.iter().enumerate() {
        if index > 0 {
            output::write_describe_separator(out)?;
        }
        let task = match gateway.describe_task(arn).await {
            Ok(task) => task,
            Err(err) => {
                output::write_describe_failure(out, arn, &err)?;
                continue;
            }
        };
        output::write_task_details(out, &task)?;

        if tables {
            match gateway.table_statistics(arn).await {
                Ok(stats) => output::write_table_statistics(out, &stats)?,
                Err(err) => writeln!(out, "\nError fetching table statistics: {err}")?,
            }
        }
    }
    Ok(())
}

/// Resolve, fan out, report. Partial failure is not an error.
pub async fn batch(
    gateway: &dyn FleetGateway,
    executor: &FanOutExecutor,
    out: &mut impl Write,
    requested: &[String],
    op: Operation,
) -> Result<()> {
    let resolution = resolve_targets(gateway, requested)
        .await
        .context("failed to list tasks")?;
    output::write_warnings(out, &resolution.warnings)?;
    let targets = resolution.require_targets()?;

    output::write_batch_header(out, op, targets.len())?;
    out.flush()?;
    let outcomes = executor.execute(targets, op).await;
    info!(
        op = op.name(),
        targets = targets.len(),
        succeeded = dms_core::count_succeeded(&outcomes),
        "batch finished"
    );
    output::write_outcomes(out, op, &outcomes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dms_core::{GatewayError, StartMode, TableStatRecord, TaskRecord};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    struct StubFleet {
        tasks: Vec<TaskRecord>,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubFleet {
        fn new(names: &[(&str, &str)], failing: &[&str]) -> Self {
            Self {
                tasks: names
                    .iter()
                    .map(|(name, status)| TaskRecord::new(format!("arn:aws:dms:us-east-1:1:task:{name}"), *name, status))
                    .collect(),
                failing: failing
                    .iter()
                    .map(|name| format!("arn:aws:dms:us-east-1:1:task:{name}"))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn check(&self, arn: &str) -> Result<(), GatewayError> {
            if self.failing.contains(arn) {
                Err(GatewayError::InvalidState("not running".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl FleetGateway for StubFleet {
        async fn list_tasks(&self) -> Result<Vec<TaskRecord>, GatewayError> {
            self.record("list".into());
            Ok(self.tasks.clone())
        }

        async fn describe_task(&self, arn: &str) -> Result<TaskRecord, GatewayError> {
            self.record(format!("describe {arn}"));
            self.check(arn)?;
            self.tasks
                .iter()
                .find(|task| task.arn == arn)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(arn.to_string()))
        }

        async fn table_statistics(&self, _arn: &str) -> Result<Vec<TableStatRecord>, GatewayError> {
            Ok(Vec::new())
        }

        async fn start_task(&self, arn: &str, _mode: StartMode) -> Result<(), GatewayError> {
            self.record(format!("start {arn}"));
            self.check(arn)
        }

        async fn stop_task(&self, arn: &str) -> Result<(), GatewayError> {
            self.record(format!("stop {arn}"));
            self.check(arn)
        }
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[tokio::test]
    async fn stop_reports_one_of_two_for_either_failing_target() {
        for failing in ["db-a", "db-b"] {
            let stub = Arc::new(StubFleet::new(&[("db-a", "running"), ("db-b", "failed")], &[failing]));
            let executor = FanOutExecutor::new(stub.clone());
            let mut out = Vec::new();

            batch(stub.as_ref(), &executor, &mut out, &args(&["db-a", "db-b"]), Operation::Stop)
                .await
                .unwrap();

            let text = String::from_utf8(out).unwrap();
            let lines: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
            assert_eq!(lines[0], "Stopping 2 task(s) in parallel...");
            assert!(lines[1].contains(" db-a: "));
            assert!(lines[2].contains(" db-b: "));
            assert!(lines[if failing == "db-a" { 1 } else { 2 }].starts_with('✗'));
            assert_eq!(lines[3], "Successfully stopped 1 out of 2 tasks");
        }
    }

    #[tokio::test]
    async fn empty_resolution_is_fatal_after_warnings() {
        let stub = Arc::new(StubFleet::new(&[("db-a", "running")], &[]));
        let executor = FanOutExecutor::new(stub.clone());
        let mut out = Vec::new();

        let err = batch(stub.as_ref(), &executor, &mut out, &args(&["ghost"]), Operation::Stop)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no valid tasks found");
        assert!(String::from_utf8(out).unwrap().contains("task 'ghost' not found"));
        assert_eq!(*stub.calls.lock().unwrap(), vec!["list".to_string()]);
    }

    #[tokio::test]
    async fn describe_continues_past_failures() {
        let stub = StubFleet::new(&[("db-a", "running"), ("db-b", "stopped")], &["db-a"]);
        let mut out = Vec::new();

        describe(&stub, &mut out, &args(&["db-a", "db-b"]), false)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("arn:aws:dms:us-east-1:1:task:db-a: invalid state: not running"));
        assert!(text.contains("db-b"));
        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|call| call.starts_with("describe")).count(), 2);
    }

    #[tokio::test]
    async fn list_handles_empty_fleet_and_json() {
        let empty = StubFleet::new(&[], &[]);
        let mut out = Vec::new();
        list(&empty, &mut out, ("us-east-1", "default"), false, false)
            .await
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No DMS replication tasks found."));

        let fleet = StubFleet::new(&[("db-a", "running")], &[]);
        let mut out = Vec::new();
        list(&fleet, &mut out, ("us-east-1", "default"), false, true)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["name"], "db-a");
        assert_eq!(parsed[0]["status"], "running");
    }
}
