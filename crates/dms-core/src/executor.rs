use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AttemptError;
use crate::gateway::FleetGateway;
use crate::model::{Operation, OperationOutcome, StartMode};

/// How a restart sequences its start after the stop call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Issue start as soon as stop is accepted. The remote task is usually
    /// still `stopping` at that point and the start can be rejected.
    #[default]
    Immediate,
    /// Poll the task until it is stopped (or failed) before issuing start.
    WaitForStopped {
        poll_interval: Duration,
        timeout: Duration,
    },
}

/// Applies one operation to many targets, one spawned unit per target.
#[derive(Clone)]
pub struct FanOutExecutor {
    gateway: Arc<dyn FleetGateway>,
    restart_policy: RestartPolicy,
}

impl FanOutExecutor {
    pub fn new(gateway: Arc<dyn FleetGateway>) -> Self {
        Self {
            gateway,
            restart_policy: RestartPolicy::default(),
        }
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// Runs every target concurrently and waits for all of them.
    /// `outcomes[i]` always describes `targets[i]`.
    pub async fn execute(&self, targets: &[String], op: Operation) -> Vec<OperationOutcome> {
        info!(op = op.name(), targets = targets.len(), "fan-out started");
        let mut handles = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let unit = Unit {
                index,
                target: target.clone(),
                op,
                gateway: Arc::clone(&self.gateway),
                restart_policy: self.restart_policy,
            };
            handles.push(tokio::spawn(unit.run()));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (target, handle) in targets.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(target = %target, "fan-out unit aborted: {err}");
                    OperationOutcome::failed(
                        target.as_str(),
                        op,
                        AttemptError::Aborted(err.to_string()),
                    )
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

struct Unit {
    index: usize,
    target: String,
    op: Operation,
    gateway: Arc<dyn FleetGateway>,
    restart_policy: RestartPolicy,
}

impl Unit {
    async fn run(self) -> OperationOutcome {
        debug!(index = self.index, target = %self.target, op = self.op.name(), "unit started");
        match self.attempt().await {
            Ok(()) => OperationOutcome::succeeded(self.target, self.op),
            Err(err) => {
                warn!(index = self.index, target = %self.target, op = self.op.name(), "unit failed: {err}");
                OperationOutcome::failed(self.target, self.op, err)
            }
        }
    }

    async fn attempt(&self) -> Result<(), AttemptError> {
        let gateway = self.gateway.as_ref();
        match self.op {
            Operation::Start(mode) => Ok(gateway.start_task(&self.target, mode).await?),
            Operation::Stop => Ok(gateway.stop_task(&self.target).await?),
            Operation::Restart(mode) => self.restart(mode).await,
        }
    }

    async fn restart(&self, mode: StartMode) -> Result<(), AttemptError> {
        let gateway = self.gateway.as_ref();
        gateway
            .stop_task(&self.target)
            .await
            .map_err(AttemptError::RestartStop)?;

        if let RestartPolicy::WaitForStopped {
            poll_interval,
            timeout,
        } = self.restart_policy
        {
            self.wait_until_at_rest(poll_interval, timeout).await?;
        }

        gateway
            .start_task(&self.target, mode)
            .await
            .map_err(AttemptError::RestartStart)
    }

    async fn wait_until_at_rest(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<(), AttemptError> {
        let deadline = Instant::now() + timeout;
        loop {
            tokio::time::sleep(poll_interval).await;
            let task = self
                .gateway
                .describe_task(&self.target)
                .await
                .map_err(AttemptError::RestartPoll)?;
            if task.status.is_at_rest() {
                debug!(target = %self.target, status = %task.status, "task at rest");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AttemptError::RestartTimeout(timeout));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::model::{count_succeeded, TableStatRecord, TaskRecord};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Start(String, StartMode),
        Stop(String),
        Describe(String),
    }

    #[derive(Default)]
    struct ScriptedGateway {
        calls: Mutex<Vec<Call>>,
        stop_failures: HashMap<String, GatewayError>,
        start_failures: HashMap<String, GatewayError>,
        statuses: Mutex<VecDeque<&'static str>>,
        delays: HashMap<String, Duration>,
        panic_on_stop: Option<String>,
    }

    impl ScriptedGateway {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    #[async_trait]
    impl FleetGateway for ScriptedGateway {
        async fn list_tasks(&self) -> Result<Vec<TaskRecord>, GatewayError> {
            Ok(Vec::new())
        }

        async fn describe_task(&self, arn: &str) -> Result<TaskRecord, GatewayError> {
            self.record(Call::Describe(arn.to_string()));
            let status = self
                .statuses
                .lock()
                .expect("statuses lock")
                .pop_front()
                .unwrap_or("stopped");
            Ok(TaskRecord::new(arn, arn, status))
        }

        async fn table_statistics(
            &self,
            _arn: &str,
        ) -> Result<Vec<TableStatRecord>, GatewayError> {
            Ok(Vec::new())
        }

        async fn start_task(&self, arn: &str, mode: StartMode) -> Result<(), GatewayError> {
            self.record(Call::Start(arn.to_string(), mode));
            match self.start_failures.get(arn) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        async fn stop_task(&self, arn: &str) -> Result<(), GatewayError> {
            if let Some(delay) = self.delays.get(arn) {
                tokio::time::sleep(*delay).await;
            }
            if self.panic_on_stop.as_deref() == Some(arn) {
                panic!("scripted panic for {arn}");
            }
            self.record(Call::Stop(arn.to_string()));
            match self.stop_failures.get(arn) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn outcomes_follow_target_order_regardless_of_completion() {
        let gateway = ScriptedGateway {
            delays: HashMap::from([
                ("arn:slow".to_string(), Duration::from_millis(60)),
                ("arn:mid".to_string(), Duration::from_millis(20)),
            ]),
            ..Default::default()
        };
        let executor = FanOutExecutor::new(Arc::new(gateway));
        let targets = targets(&["arn:slow", "arn:mid", "arn:fast"]);

        let outcomes = executor.execute(&targets, Operation::Stop).await;

        let order: Vec<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(order, vec!["arn:slow", "arn:mid", "arn:fast"]);
        assert!(outcomes.iter().all(|o| o.success));
    }

    #[tokio::test]
    async fn every_target_gets_an_outcome_when_all_fail() {
        let failures: HashMap<String, GatewayError> = ["arn:a", "arn:b", "arn:c"]
            .iter()
            .map(|arn| (arn.to_string(), GatewayError::Network("connection reset".into())))
            .collect();
        let gateway = ScriptedGateway {
            stop_failures: failures,
            ..Default::default()
        };
        let executor = FanOutExecutor::new(Arc::new(gateway));

        let outcomes = executor
            .execute(&targets(&["arn:a", "arn:b", "arn:c"]), Operation::Stop)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(count_succeeded(&outcomes), 0);
        assert_eq!(
            outcomes[1].message,
            "Failed to stop task: network error: connection reset"
        );
    }

    #[tokio::test]
    async fn empty_target_set_yields_no_outcomes() {
        let executor = FanOutExecutor::new(Arc::new(ScriptedGateway::default()));
        assert!(executor.execute(&[], Operation::Stop).await.is_empty());
    }

    #[tokio::test]
    async fn failure_on_either_target_maps_to_that_target() {
        for failing in ["arn:db-a", "arn:db-b"] {
            let gateway = ScriptedGateway {
                stop_failures: HashMap::from([(
                    failing.to_string(),
                    GatewayError::InvalidState("task is not running".into()),
                )]),
                ..Default::default()
            };
            let executor = FanOutExecutor::new(Arc::new(gateway));
            let outcomes = executor
                .execute(&targets(&["arn:db-a", "arn:db-b"]), Operation::Stop)
                .await;

            assert_eq!(count_succeeded(&outcomes), 1);
            for outcome in &outcomes {
                assert_eq!(outcome.success, outcome.target != failing, "{failing}");
            }
        }
    }

    #[tokio::test]
    async fn restart_skips_start_when_stop_fails() {
        let gateway = Arc::new(ScriptedGateway {
            stop_failures: HashMap::from([(
                "arn:x".to_string(),
                GatewayError::Auth("expired token".into()),
            )]),
            ..Default::default()
        });
        let executor = FanOutExecutor::new(gateway.clone());

        let outcomes = executor
            .execute(&targets(&["arn:x"]), Operation::reload())
            .await;

        assert!(!outcomes[0].success);
        assert_eq!(
            outcomes[0].message,
            "Failed to reload task: failed to stop task during restart: authentication failed: expired token"
        );
        assert_eq!(gateway.calls(), vec![Call::Stop("arn:x".to_string())]);
    }

    #[tokio::test]
    async fn immediate_restart_starts_right_after_stop() {
        let gateway = Arc::new(ScriptedGateway::default());
        let executor = FanOutExecutor::new(gateway.clone());

        let outcomes = executor
            .execute(&targets(&["arn:x"]), Operation::reload())
            .await;

        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].message, "Successfully issued reload command");
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Stop("arn:x".to_string()),
                Call::Start("arn:x".to_string(), StartMode::ReloadTarget),
            ]
        );
    }

    #[tokio::test]
    async fn restart_start_failure_names_the_start_phase() {
        let gateway = ScriptedGateway {
            start_failures: HashMap::from([(
                "arn:x".to_string(),
                GatewayError::InvalidState("task is stopping".into()),
            )]),
            ..Default::default()
        };
        let executor = FanOutExecutor::new(Arc::new(gateway));
        let outcomes = executor
            .execute(&targets(&["arn:x"]), Operation::reload())
            .await;
        assert_eq!(
            outcomes[0].error.as_deref(),
            Some("failed to start task during restart: invalid state: task is stopping")
        );
    }

    #[tokio::test]
    async fn waiting_restart_polls_until_stopped() {
        let gateway = Arc::new(ScriptedGateway {
            statuses: Mutex::new(VecDeque::from(["stopping", "stopping", "stopped"])),
            ..Default::default()
        });
        let executor = FanOutExecutor::new(gateway.clone()).with_restart_policy(
            RestartPolicy::WaitForStopped {
                poll_interval: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            },
        );

        let outcomes = executor
            .execute(&targets(&["arn:x"]), Operation::reload())
            .await;

        assert!(outcomes[0].success);
        let calls = gateway.calls();
        assert_eq!(calls.first(), Some(&Call::Stop("arn:x".to_string())));
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::Describe(_))).count(),
            3
        );
        assert_eq!(
            calls.last(),
            Some(&Call::Start("arn:x".to_string(), StartMode::ReloadTarget))
        );
    }

    #[tokio::test]
    async fn waiting_restart_gives_up_after_timeout() {
        let gateway = Arc::new(ScriptedGateway {
            statuses: Mutex::new(VecDeque::from(vec!["stopping"; 64])),
            ..Default::default()
        });
        let executor = FanOutExecutor::new(gateway.clone()).with_restart_policy(
            RestartPolicy::WaitForStopped {
                poll_interval: Duration::from_millis(2),
                timeout: Duration::from_millis(10),
            },
        );

        let outcomes = executor
            .execute(&targets(&["arn:x"]), Operation::reload())
            .await;

        assert!(!outcomes[0].success);
        assert!(outcomes[0].message.contains("start not attempted"));
        assert!(!gateway
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Start(..))));
    }

    #[tokio::test]
    async fn panicking_unit_does_not_affect_siblings() {
        let gateway = ScriptedGateway {
            panic_on_stop: Some("arn:bad".to_string()),
            ..Default::default()
        };
        let executor = FanOutExecutor::new(Arc::new(gateway));

        let outcomes = executor
            .execute(&targets(&["arn:ok", "arn:bad", "arn:ok2"]), Operation::Stop)
            .await;

        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1].message.contains("worker aborted"));
        assert!(outcomes[2].success);
    }
}
