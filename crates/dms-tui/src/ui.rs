use dms_core::format::{format_elapsed, format_timestamp, label_from_arn, truncate};
use dms_core::TaskRecord;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use crate::app::{App, View};
use crate::theme::Theme;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const COLUMN_WIDTH: usize = 15;

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let area = frame.size();
    match app.view {
        View::Loading => render_loading(frame, app, theme, area),
        View::Error => render_error(frame, app, theme, area),
        View::TaskList => render_task_list(frame, app, theme, area),
        View::TaskDetails => render_details(frame, app, theme, area),
        View::TableStats => render_table_stats(frame, app, theme, area),
    }
    if app.show_help {
        render_help_overlay(frame, theme, area);
    }
}

fn spinner(app: &App) -> &'static str {
    SPINNER[app.spinner_frame % SPINNER.len()]
}

fn render_loading(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let message = if app.loading_table_stats() {
        "Loading table statistics..."
    } else {
        "Loading DMS tasks..."
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", spinner(app)), theme.cursor()),
        Span::styled(message, theme.title()),
    ])];
    if app.loading_table_stats() {
        lines.push(Line::from(Span::styled("[ESC] back", theme.muted())));
    }
    frame.render_widget(Paragraph::new(lines), inset(area));
}

fn render_error(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let error = app.error.as_deref().unwrap_or("unknown error");
    let lines = vec![
        Line::from(Span::styled("Error", theme.error())),
        Line::raw(""),
        Line::from(Span::styled(
            format!("Failed to load {}: {error}", app.error_source.subject()),
            Style::new().fg(theme.error),
        )),
        Line::raw(""),
        Line::from(Span::styled(
            "Press 'r' to retry or 'q' to quit",
            theme.muted(),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        inset(area),
    );
}

fn header_line(app: &App, theme: &Theme) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("AWS DMS Tasks - {}", app.header.region),
        theme.title(),
    )];
    if !app.header.profile.is_empty() {
        spans.push(Span::styled(
            format!(" (Profile: {})", app.header.profile),
            theme.muted(),
        ));
    }
    if !app.selected.is_empty() {
        spans.push(Span::styled(
            format!("  {} selected", app.selected.len()),
            theme.cursor(),
        ));
    }
    Line::from(spans)
}

fn status_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(note) = &app.status_note {
        let mut spans = Vec::new();
        if app.is_busy() {
            spans.push(Span::styled(format!("{} ", spinner(app)), theme.cursor()));
        }
        spans.push(Span::styled(note.clone(), Style::new().fg(theme.primary)));
        lines.push(Line::from(spans));
    }
    for outcome in &app.failed_outcomes {
        lines.push(Line::from(vec![
            Span::styled("✗ ", theme.error()),
            Span::styled(
                format!("{}: {}", label_from_arn(&outcome.target), outcome.message),
                Style::new().fg(theme.error),
            ),
        ]));
    }
    lines
}

fn task_row(task: &TaskRecord, focused: bool, selected: bool, theme: &Theme) -> Line<'static> {
    let cursor = if focused {
        Span::styled("→ ", theme.cursor())
    } else {
        Span::raw("  ")
    };
    let checkbox = if selected {
        Span::styled("[✓]", theme.checkmark())
    } else {
        Span::styled("[ ]", theme.muted())
    };
    let name_style = if focused {
        theme.cursor()
    } else {
        Style::new()
    };
    Line::from(vec![
        cursor,
        checkbox,
        Span::raw(" "),
        Span::styled(task.name.clone(), name_style),
        Span::raw(" - "),
        Span::styled(task.status.as_str().to_string(), theme.status(task.status.class())),
        Span::styled(format!(" ({})", task.migration_type), theme.muted()),
    ])
}

fn render_task_list(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let status = status_lines(app, theme);
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(status.len() as u16),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(inset(area));

    frame.render_widget(Paragraph::new(header_line(app, theme)), sections[0]);
    frame.render_widget(Paragraph::new(status), sections[1]);

    let body = sections[2];
    if app.tasks.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No tasks found.", theme.muted())),
            body,
        );
    } else {
        let height = body.height.max(1) as usize;
        let offset = app.focus.saturating_sub(height - 1);
        let rows: Vec<Line> = app
            .tasks
            .iter()
            .enumerate()
            .skip(offset)
            .take(height)
            .map(|(index, task)| task_row(task, index == app.focus, app.is_selected(task), theme))
            .collect();
        frame.render_widget(Paragraph::new(rows), body);
    }

    let auto = if app.auto_refresh { "on" } else { "off" };
    let help = vec![
        Line::raw(""),
        Line::from(Span::styled(
            "[↑/k] up • [↓/j] down • [space] select • [enter] details • [s] start • [x] stop • [r] resume • [l] reload",
            theme.muted(),
        )),
        Line::from(Span::styled(
            format!("[c] clear • [f] refresh • [a] auto-refresh: {auto} • [?] help • [q] quit"),
            theme.muted(),
        )),
    ];
    frame.render_widget(Paragraph::new(help), sections[3]);
}

fn field(label: &str, value: impl Into<String>, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), theme.label()),
        Span::styled(value.into(), theme.value()),
    ])
}

fn arn_field(label: &str, arn: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), theme.label()),
        Span::styled(arn.to_string(), theme.arn()),
    ])
}

fn count_span(value: i32, theme: &Theme) -> Span<'static> {
    Span::styled(value.to_string(), theme.number())
}

pub(crate) fn details_lines(task: &TaskRecord, extended: bool, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled("Task Details", theme.title())),
        Line::raw(""),
        field("Name", task.name.clone(), theme),
        Line::from(vec![
            Span::styled("Status: ", theme.label()),
            Span::styled(task.status.as_str().to_string(), theme.status(task.status.class())),
        ]),
        field("Type", task.migration_type.clone(), theme),
        arn_field("ARN", &task.arn, theme),
        Line::raw(""),
        Line::from(Span::styled("Endpoints:", theme.section())),
        arn_field("  Source", &task.source_endpoint_arn, theme),
        arn_field("  Target", &task.target_endpoint_arn, theme),
        arn_field("  Instance", &task.replication_instance_arn, theme),
        Line::raw(""),
        field("Created", format_timestamp(task.created_at.as_ref()), theme),
        field("Started", format_timestamp(task.started_at.as_ref()), theme),
    ];

    if let Some(stats) = &task.stats {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled("Statistics:", theme.section())));
        lines.push(Line::from(vec![
            Span::styled("  Progress: ", theme.label()),
            Span::styled(format!("{}%", stats.full_load_progress_percent), theme.number()),
        ]));
        let errored_style = if stats.tables_errored > 0 {
            theme.error()
        } else {
            theme.number()
        };
        lines.push(Line::from(vec![
            Span::styled("  Tables - ", theme.label()),
            Span::raw("Loaded: "),
            count_span(stats.tables_loaded, theme),
            Span::raw(", Loading: "),
            count_span(stats.tables_loading, theme),
            Span::raw(", Queued: "),
            count_span(stats.tables_queued, theme),
            Span::raw(", Errored: "),
            Span::styled(stats.tables_errored.to_string(), errored_style),
        ]));
        if stats.elapsed_time_millis > 0 {
            lines.push(field(
                "  Elapsed",
                format_elapsed(stats.elapsed_time_millis),
                theme,
            ));
        }
        if let Some(reason) = &stats.stop_reason {
            lines.push(Line::from(vec![
                Span::styled("  Stop Reason: ", theme.label()),
                Span::styled(reason.clone(), theme.warning()),
            ]));
        }
    }

    if extended {
        if let Some(mappings) = &task.table_mappings {
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled("Table Mappings:", theme.section())));
            lines.extend(
                mappings
                    .lines()
                    .map(|line| Line::from(Span::styled(format!("  {line}"), theme.muted()))),
            );
        }
    }

    if let Some(failure) = &task.last_failure_message {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled("Last Failure:", theme.error())));
        lines.push(Line::from(Span::styled(
            format!("  {failure}"),
            Style::new().fg(theme.error),
        )));
    }

    let mut help = Vec::new();
    if task.table_mappings.is_some() {
        let state = if extended { "on" } else { "off" };
        help.push(format!("[t] extended stats: {state}"));
    }
    help.push("[T] table stats".to_string());
    help.push("[ESC] back".to_string());
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(help.join(" • "), theme.muted())));
    lines
}

fn render_details(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let lines = match app.details_task() {
        Some(task) => details_lines(task, app.extended_details, theme),
        None => vec![Line::from(Span::styled(
            "Task no longer available. Press [ESC] to go back.",
            theme.muted(),
        ))],
    };
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        inset(area),
    );
}

fn render_table_stats(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let name = app
        .details_task()
        .map(|task| task.name.clone())
        .or_else(|| app.table_stats_arn.as_deref().map(|arn| label_from_arn(arn).to_string()))
        .unwrap_or_default();

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1), Constraint::Length(2)])
        .split(inset(area));

    frame.render_widget(
        Paragraph::new(Span::styled(format!("Table Statistics - {name}"), theme.title())),
        sections[0],
    );

    if app.table_stats.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No table statistics available.", theme.muted())),
            sections[1],
        );
    } else {
        let header = Row::new(
            ["SCHEMA", "TABLE", "INSERTS", "UPDATES", "DELETES", "DDLS", "ROWS", "STATE"]
                .into_iter()
                .map(Cell::from),
        )
        .style(theme.table_header());
        let rows = app.table_stats.iter().map(|stat| {
            Row::new(vec![
                Cell::from(truncate(&stat.schema_name, COLUMN_WIDTH)),
                Cell::from(truncate(&stat.table_name, COLUMN_WIDTH)),
                Cell::from(Span::styled(stat.inserts.to_string(), theme.number())),
                Cell::from(Span::styled(stat.updates.to_string(), theme.number())),
                Cell::from(Span::styled(stat.deletes.to_string(), theme.number())),
                Cell::from(Span::styled(stat.ddls.to_string(), theme.number())),
                Cell::from(Span::styled(stat.full_load_rows.to_string(), theme.number())),
                Cell::from(Span::styled(
                    stat.validation_state.as_str().to_string(),
                    theme.validation(stat.validation_state.kind()),
                )),
            ])
        });
        let widths = [
            Constraint::Length(COLUMN_WIDTH as u16),
            Constraint::Length(COLUMN_WIDTH as u16),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Min(10),
        ];
        frame.render_widget(Table::new(rows, widths).header(header).column_spacing(1), sections[1]);
    }

    frame.render_widget(
        Paragraph::new(Span::styled("Press [ESC] to go back", theme.muted())),
        sections[2],
    );
}

fn render_help_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let entries: [(&str, &str); 14] = [
        ("↑/k ↓/j", "move focus"),
        ("g / G", "first / last task"),
        ("space", "toggle selection"),
        ("c", "clear selection"),
        ("enter", "task details"),
        ("s", "start selected or focused"),
        ("x", "stop"),
        ("r", "resume processing"),
        ("l", "reload target"),
        ("T", "table statistics (details)"),
        ("f", "refresh now"),
        ("a", "toggle auto-refresh"),
        ("esc", "back / close help"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{key:<10}"), Style::new().fg(theme.primary).add_modifier(Modifier::BOLD)),
                Span::raw(*action),
            ])
        })
        .collect();

    let popup = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Left).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::new().fg(theme.secondary))
                .title(Span::styled(" Keys ", theme.title())),
        ),
        popup,
    );
}

fn inset(area: Rect) -> Rect {
    Rect {
        x: area.x.saturating_add(1),
        y: area.y,
        width: area.width.saturating_sub(2),
        height: area.height,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}
