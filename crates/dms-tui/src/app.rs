use std::collections::HashSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use dms_core::{
    count_succeeded, GatewayError, Operation, OperationOutcome, StartMode, TableStatRecord,
    TaskRecord,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Loading,
    TaskList,
    TaskDetails,
    TableStats,
    Error,
}

/// What the error view failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Tasks,
    TableStatistics,
}

impl ErrorSource {
    pub fn subject(self) -> &'static str {
        match self {
            ErrorSource::Tasks => "tasks",
            ErrorSource::TableStatistics => "table statistics",
        }
    }
}

/// Results of background work, delivered through the runtime channel.
#[derive(Debug)]
pub enum AppEvent {
    Snapshot {
        token: u64,
        result: Result<Vec<TaskRecord>, GatewayError>,
    },
    TableStats {
        token: u64,
        arn: String,
        result: Result<Vec<TableStatRecord>, GatewayError>,
    },
    OperationDone {
        op: Operation,
        outcomes: Vec<OperationOutcome>,
    },
}

/// Work the runtime must start on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchSnapshot { token: u64 },
    RunOperation { op: Operation, targets: Vec<String> },
    FetchTableStats { arn: String, token: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    pub region: String,
    pub profile: String,
}

pub struct App {
    pub header: HeaderInfo,
    pub view: View,
    pub tasks: Vec<TaskRecord>,
    pub focus: usize,
    pub selected: HashSet<String>,
    pub details_arn: Option<String>,
    pub table_stats: Vec<TableStatRecord>,
    pub table_stats_arn: Option<String>,
    pub error: Option<String>,
    pub error_source: ErrorSource,
    pub status_note: Option<String>,
    pub failed_outcomes: Vec<OperationOutcome>,
    pub auto_refresh: bool,
    pub extended_details: bool,
    pub show_help: bool,
    pub should_quit: bool,
    pub spinner_frame: usize,
    pending_operations: usize,
    next_token: u64,
    applied_snapshot: u64,
    latest_stats: Option<u64>,
    awaiting_stats: Option<u64>,
}

impl App {
    pub fn new(header: HeaderInfo, auto_refresh: bool) -> Self {
        Self {
            header,
            view: View::Loading,
            tasks: Vec::new(),
            focus: 0,
            selected: HashSet::new(),
            details_arn: None,
            table_stats: Vec::new(),
            table_stats_arn: None,
            error: None,
            error_source: ErrorSource::Tasks,
            status_note: None,
            failed_outcomes: Vec::new(),
            auto_refresh,
            extended_details: false,
            show_help: false,
            should_quit: false,
            spinner_frame: 0,
            pending_operations: 0,
            next_token: 0,
            applied_snapshot: 0,
            latest_stats: None,
            awaiting_stats: None,
        }
    }

    /// Effects to run once at startup.
    pub fn start(&mut self) -> Vec<Effect> {
        vec![self.request_snapshot()]
    }

    pub fn request_snapshot(&mut self) -> Effect {
        Effect::FetchSnapshot {
            token: self.issue_token(),
        }
    }

    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// The auto-refresh timer runs only while the list is on screen.
    pub fn timer_armed(&self) -> bool {
        self.view == View::TaskList && self.auto_refresh
    }

    pub fn loading_table_stats(&self) -> bool {
        self.awaiting_stats.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.view == View::Loading || self.pending_operations > 0
    }

    pub fn on_tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }

    pub fn focused_task(&self) -> Option<&TaskRecord> {
        self.tasks.get(self.focus)
    }

    pub fn details_task(&self) -> Option<&TaskRecord> {
        let arn = self.details_arn.as_deref()?;
        self.tasks.iter().find(|task| task.arn == arn)
    }

    pub fn is_selected(&self, task: &TaskRecord) -> bool {
        self.selected.contains(&task.arn)
    }

    /// Selection in snapshot order, or the focused record when nothing is
    /// selected. Snapshot and selection are read together here.
    pub fn operation_targets(&self) -> Vec<String> {
        if self.selected.is_empty() {
            return self
                .focused_task()
                .map(|task| vec![task.arn.clone()])
                .unwrap_or_default();
        }
        self.tasks
            .iter()
            .filter(|task| self.selected.contains(&task.arn))
            .map(|task| task.arn.clone())
            .collect()
    }

    pub fn apply(&mut self, event: AppEvent) -> Vec<Effect> {
        match event {
            AppEvent::Snapshot { token, result } => {
                self.apply_snapshot(token, result);
                Vec::new()
            }
            AppEvent::TableStats { token, arn, result } => {
                self.apply_table_stats(token, arn, result);
                Vec::new()
            }
            AppEvent::OperationDone { op, outcomes } => {
                self.pending_operations = self.pending_operations.saturating_sub(1);
                let succeeded = count_succeeded(&outcomes);
                debug!(op = op.name(), succeeded, total = outcomes.len(), "operation finished");
                self.status_note = Some(format!(
                    "Completed {succeeded}/{} operations successfully",
                    outcomes.len()
                ));
                self.failed_outcomes = outcomes.into_iter().filter(|o| !o.success).collect();
                vec![self.request_snapshot()]
            }
        }
    }

    fn apply_snapshot(&mut self, token: u64, result: Result<Vec<TaskRecord>, GatewayError>) {
        if token <= self.applied_snapshot {
            debug!(token, applied = self.applied_snapshot, "discarding stale snapshot");
            return;
        }
        self.applied_snapshot = token;

        match result {
            Ok(tasks) => {
                self.tasks = tasks;
                let present: HashSet<&str> = self.tasks.iter().map(|task| task.arn.as_str()).collect();
                self.selected.retain(|arn| present.contains(arn.as_str()));
                self.focus = self.focus.min(self.tasks.len().saturating_sub(1));
                self.error = None;

                match self.view {
                    View::Loading if self.awaiting_stats.is_none() => self.view = View::TaskList,
                    View::Error => self.view = View::TaskList,
                    View::TaskDetails if self.details_task().is_none() => {
                        self.view = View::TaskList;
                        self.status_note = Some("Task no longer exists".to_string());
                    }
                    _ => {}
                }
            }
            Err(err) => {
                self.error = Some(err.to_string());
                self.error_source = ErrorSource::Tasks;
                self.awaiting_stats = None;
                self.view = View::Error;
            }
        }
    }

    fn apply_table_stats(
        &mut self,
        token: u64,
        arn: String,
        result: Result<Vec<TableStatRecord>, GatewayError>,
    ) {
        if self.latest_stats != Some(token) {
            debug!(token, "discarding superseded table statistics");
            return;
        }
        let on_loading_screen = self.awaiting_stats == Some(token);
        self.awaiting_stats = None;

        match result {
            Ok(stats) => {
                self.table_stats = stats;
                self.table_stats_arn = Some(arn);
                if on_loading_screen {
                    self.view = View::TableStats;
                }
            }
            Err(err) if on_loading_screen => {
                self.error = Some(err.to_string());
                self.error_source = ErrorSource::TableStatistics;
                self.view = View::Error;
            }
            Err(err) => debug!("late table statistics failure ignored: {err}"),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Vec::new();
        }
        if self.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
            } else if key.code == KeyCode::Char('q') {
                self.should_quit = true;
            }
            return Vec::new();
        }

        match (self.view, key.code) {
            (View::TableStats, KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q')) => {
                self.leave_table_stats();
                return Vec::new();
            }
            (View::Error, KeyCode::Char('r') | KeyCode::Char('f')) => {
                self.view = View::Loading;
                return vec![self.request_snapshot()];
            }
            _ => {}
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return Vec::new();
            }
            KeyCode::Char('f') => {
                self.status_note = None;
                self.failed_outcomes.clear();
                return vec![self.request_snapshot()];
            }
            KeyCode::Char('a') => {
                self.auto_refresh = !self.auto_refresh;
                let state = if self.auto_refresh { "on" } else { "off" };
                self.status_note = Some(format!("Auto-refresh {state}"));
                return Vec::new();
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                return Vec::new();
            }
            _ => {}
        }

        match self.view {
            View::TaskList => self.handle_list_key(key),
            View::TaskDetails => self.handle_details_key(key),
            View::Loading => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Backspace)
                    && self.awaiting_stats.take().is_some()
                {
                    self.view = View::TaskDetails;
                }
                Vec::new()
            }
            View::TableStats | View::Error => Vec::new(),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.focus = self.focus.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.focus + 1 < self.tasks.len() {
                    self.focus += 1;
                }
            }
            KeyCode::Home | KeyCode::Char('g') => self.focus = 0,
            KeyCode::End | KeyCode::Char('G') => self.focus = self.tasks.len().saturating_sub(1),
            KeyCode::Char(' ') => {
                if let Some(arn) = self.focused_task().map(|task| task.arn.clone()) {
                    if !self.selected.remove(&arn) {
                        self.selected.insert(arn);
                    }
                }
            }
            KeyCode::Enter => {
                if let Some(arn) = self.focused_task().map(|task| task.arn.clone()) {
                    self.details_arn = Some(arn);
                    self.view = View::TaskDetails;
                }
            }
            KeyCode::Char('c') => self.selected.clear(),
            KeyCode::Char('s') => return self.dispatch(Operation::Start(StartMode::StartReplication)),
            KeyCode::Char('x') => return self.dispatch(Operation::Stop),
            KeyCode::Char('r') => return self.dispatch(Operation::resume()),
            KeyCode::Char('l') => return self.dispatch(Operation::reload()),
            _ => {}
        }
        Vec::new()
    }

    fn handle_details_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Esc | KeyCode::Backspace => {
                self.view = View::TaskList;
            }
            KeyCode::Char('t') => self.extended_details = !self.extended_details,
            KeyCode::Char('T') => {
                let Some(arn) = self.details_arn.clone() else {
                    return Vec::new();
                };
                let token = self.issue_token();
                self.latest_stats = Some(token);
                self.awaiting_stats = Some(token);
                self.table_stats.clear();
                self.table_stats_arn = None;
                self.view = View::Loading;
                return vec![Effect::FetchTableStats { arn, token }];
            }
            _ => {}
        }
        Vec::new()
    }

    fn leave_table_stats(&mut self) {
        self.table_stats.clear();
        self.table_stats_arn = None;
        self.view = View::TaskDetails;
    }

    fn dispatch(&mut self, op: Operation) -> Vec<Effect> {
        let targets = self.operation_targets();
        if targets.is_empty() {
            return Vec::new();
        }
        self.pending_operations += 1;
        self.failed_outcomes.clear();
        self.status_note = Some(format!("{} {} task(s)...", op.progressive(), targets.len()));
        vec![Effect::RunOperation { op, targets }]
    }
}
