use std::future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use dms_core::{FanOutExecutor, FleetGateway};
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use tracing::{debug, info};

use crate::app::{App, AppEvent, Effect, HeaderInfo};
use crate::theme::Theme;
use crate::ui;

const EVENT_QUEUE_CAPACITY: usize = 64;
const SPINNER_TICK_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct TuiOptions {
    pub region: String,
    pub profile: String,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
}

impl Default for TuiOptions {
    fn default() -> Self {
        Self {
            region: String::new(),
            profile: String::new(),
            auto_refresh: true,
            refresh_interval: Duration::from_secs(5),
        }
    }
}

/// Starts background work for effects and reports results on the channel.
struct Dispatcher {
    gateway: Arc<dyn FleetGateway>,
    executor: Arc<FanOutExecutor>,
    tx: mpsc::Sender<AppEvent>,
}

impl Dispatcher {
    fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            debug!(?effect, "dispatching");
            let tx = self.tx.clone();
            match effect {
                Effect::FetchSnapshot { token } => {
                    let gateway = Arc::clone(&self.gateway);
                    tokio::spawn(async move {
                        let result = gateway.list_tasks().await;
                        let _ = tx.send(AppEvent::Snapshot { token, result }).await;
                    });
                }
                Effect::FetchTableStats { arn, token } => {
                    let gateway = Arc::clone(&self.gateway);
                    tokio::spawn(async move {
                        let result = gateway.table_statistics(&arn).await;
                        let _ = tx.send(AppEvent::TableStats { token, arn, result }).await;
                    });
                }
                Effect::RunOperation { op, targets } => {
                    let executor = Arc::clone(&self.executor);
                    tokio::spawn(async move {
                        let outcomes = executor.execute(&targets, op).await;
                        let _ = tx.send(AppEvent::OperationDone { op, outcomes }).await;
                    });
                }
            }
        }
    }
}

/// Auto-refresh deadline. Armed only while the app allows it, and always
/// restarted from a full interval when it becomes armed again.
pub(crate) struct RefreshTimer {
    interval: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl RefreshTimer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            sleep: Box::pin(tokio::time::sleep(interval)),
            armed: false,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    pub(crate) fn sync(&mut self, eligible: bool) {
        if eligible && !self.armed {
            self.restart();
        }
        self.armed = eligible;
    }

    /// Resolves when an armed deadline passes. Never resolves while disarmed.
    pub(crate) async fn wait(&mut self) {
        if !self.armed {
            future::pending::<()>().await;
        }
        self.sleep.as_mut().await;
    }

    /// Requests a snapshot and starts the next interval.
    pub(crate) fn on_fire(&mut self, app: &mut App) -> Effect {
        self.restart();
        app.request_snapshot()
    }

    fn restart(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.interval);
    }
}

/// Raw mode and the alternate screen, undone on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

/// Runs the interactive fleet manager until the user quits. The terminal is
/// restored on every exit path, including setup failures.
pub async fn run(
    gateway: Arc<dyn FleetGateway>,
    executor: FanOutExecutor,
    options: TuiOptions,
) -> Result<()> {
    let guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = event_loop(&mut terminal, gateway, executor, options).await;

    drop(guard);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    gateway: Arc<dyn FleetGateway>,
    executor: FanOutExecutor,
    options: TuiOptions,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let dispatcher = Dispatcher {
        gateway,
        executor: Arc::new(executor),
        tx,
    };
    let theme = Theme::default();
    let mut app = App::new(
        HeaderInfo {
            region: options.region.clone(),
            profile: options.profile.clone(),
        },
        options.auto_refresh,
    );
    dispatcher.dispatch(app.start());

    let mut events = EventStream::new();
    let mut spinner = tokio::time::interval(Duration::from_millis(SPINNER_TICK_MS));
    spinner.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh = RefreshTimer::new(options.refresh_interval);
    info!(interval_secs = options.refresh_interval.as_secs(), "tui started");

    loop {
        terminal.draw(|frame| ui::render(frame, &app, &theme))?;

        refresh.sync(app.timer_armed());

        tokio::select! {
            _ = spinner.tick(), if app.is_busy() => app.on_tick(),
            () = refresh.wait(), if refresh.is_armed() => {
                let effect = refresh.on_fire(&mut app);
                dispatcher.dispatch(vec![effect]);
            }
            Some(event) = rx.recv() => {
                let effects = app.apply(event);
                dispatcher.dispatch(effects);
            }
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    let effects = app.handle_key(key);
                    dispatcher.dispatch(effects);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
        }

        if app.should_quit {
            break;
        }
    }
    info!("tui stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::View;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use dms_core::TaskRecord;
    use tokio::time::timeout;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn list_app(auto_refresh: bool) -> App {
        let mut app = App::new(HeaderInfo::default(), auto_refresh);
        let Effect::FetchSnapshot { token } = app.request_snapshot() else {
            panic!("expected snapshot fetch");
        };
        app.apply(AppEvent::Snapshot {
            token,
            result: Ok(vec![TaskRecord::new("arn:aws:dms:us-east-1:1:task:a", "a", "running")]),
        });
        assert_eq!(app.view, View::TaskList);
        app
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    async fn fires_within(timer: &mut RefreshTimer, limit: Duration) -> bool {
        timeout(limit, timer.wait()).await.is_ok()
    }

    #[test]
    fn terminal_guard_never_leaves_raw_mode_behind() {
        // Without a tty `enter` fails; with one it succeeds. Both must end cooked.
        if let Ok(guard) = TerminalGuard::enter() {
            drop(guard);
        }
        assert!(!crossterm::terminal::is_raw_mode_enabled().unwrap_or(false));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_on_the_task_list_and_rearms() {
        let mut app = list_app(true);
        let mut timer = RefreshTimer::new(INTERVAL);
        timer.sync(app.timer_armed());

        assert!(!fires_within(&mut timer, INTERVAL - Duration::from_millis(1)).await);
        assert!(fires_within(&mut timer, Duration::from_millis(2)).await);
        assert!(matches!(timer.on_fire(&mut app), Effect::FetchSnapshot { .. }));

        timer.sync(app.timer_armed());
        assert!(timer.is_armed());
        assert!(!fires_within(&mut timer, INTERVAL - Duration::from_millis(1)).await);
        assert!(fires_within(&mut timer, Duration::from_millis(2)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_quiet_in_details_or_with_auto_refresh_off() {
        let mut app = list_app(true);
        let mut timer = RefreshTimer::new(INTERVAL);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.view, View::TaskDetails);
        timer.sync(app.timer_armed());
        assert!(!timer.is_armed());
        assert!(!fires_within(&mut timer, INTERVAL * 3).await);

        let app = list_app(false);
        timer.sync(app.timer_armed());
        assert!(!fires_within(&mut timer, INTERVAL * 3).await);
    }

    #[tokio::test(start_paused = true)]
    async fn returning_to_the_list_restarts_a_full_interval() {
        let mut app = list_app(true);
        let mut timer = RefreshTimer::new(INTERVAL);
        timer.sync(app.timer_armed());
        tokio::time::advance(Duration::from_secs(4)).await;

        press(&mut app, KeyCode::Enter);
        timer.sync(app.timer_armed());
        tokio::time::advance(Duration::from_secs(10)).await;

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view, View::TaskList);
        timer.sync(app.timer_armed());
        assert!(!fires_within(&mut timer, INTERVAL - Duration::from_millis(1)).await);
        assert!(fires_within(&mut timer, Duration::from_millis(2)).await);
    }
}
