//! Terminal output for the batch and inspection commands.

use std::io::{self, Write};

use crossterm::style::{style, Color, StyledContent, Stylize};
use dms_core::format::{format_elapsed, format_timestamp, label_from_arn};
use dms_core::{
    count_succeeded, Operation, OperationOutcome, ResolutionError, StatusClass, TableStatRecord,
    TaskRecord, ValidationKind,
};

const PRIMARY: Color = Color::AnsiValue(86);
const SECONDARY: Color = Color::AnsiValue(212);
const SUCCESS: Color = Color::AnsiValue(42);
const ERROR: Color = Color::AnsiValue(196);
const WARNING: Color = Color::AnsiValue(220);
const MUTED: Color = Color::AnsiValue(241);
const LABEL: Color = Color::AnsiValue(147);
const HIGHLIGHT: Color = Color::AnsiValue(215);
const HEADER: Color = Color::AnsiValue(39);
const VALUE: Color = Color::AnsiValue(252);
const NUMBER: Color = Color::AnsiValue(114);

const SEPARATOR_WIDTH: usize = 80;

fn paint(text: impl Into<String>, color: Color) -> StyledContent<String> {
    style(text.into()).with(color)
}

fn bold(text: impl Into<String>, color: Color) -> StyledContent<String> {
    paint(text, color).bold()
}

fn label(text: &str) -> StyledContent<String> {
    bold(text, LABEL)
}

fn status_color(class: StatusClass) -> Color {
    match class {
        StatusClass::Active => SUCCESS,
        StatusClass::Inactive => ERROR,
        StatusClass::Other => WARNING,
    }
}

fn validation_color(kind: ValidationKind) -> Color {
    match kind {
        ValidationKind::Validated => SUCCESS,
        ValidationKind::Failed => ERROR,
        ValidationKind::Pending => MUTED,
        ValidationKind::Other => WARNING,
    }
}

fn error_count(count: i32) -> StyledContent<String> {
    if count > 0 {
        bold(count.to_string(), ERROR)
    } else {
        paint(count.to_string(), NUMBER)
    }
}

fn separator(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", paint("─".repeat(SEPARATOR_WIDTH), MUTED))
}

/// Pads each column to its widest plain-text cell before styling.
fn column_widths<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> [usize; N] {
    let mut widths = header.map(|cell| cell.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}

fn pad(text: &str, width: usize) -> String {
    format!("{text:<width$}")
}

pub fn write_warnings(out: &mut impl Write, warnings: &[ResolutionError]) -> io::Result<()> {
    for warning in warnings {
        writeln!(out, "{} {warning}", bold("Warning:", WARNING))?;
    }
    Ok(())
}

pub fn write_session_header(out: &mut impl Write, region: &str, profile: &str) -> io::Result<()> {
    writeln!(out, "{} {}", label("Region:"), bold(region, PRIMARY))?;
    if !profile.is_empty() {
        writeln!(out, "{} {}", label("Profile:"), paint(profile, SECONDARY))?;
    }
    writeln!(out)
}

pub fn write_task_table(out: &mut impl Write, tasks: &[TaskRecord]) -> io::Result<()> {
    const HEADER_CELLS: [&str; 4] = ["NAME", "STATUS", "TYPE", "ARN"];
    let rows: Vec<[String; 4]> = tasks
        .iter()
        .map(|task| {
            [
                task.name.clone(),
                task.status.as_str().to_string(),
                task.migration_type.clone(),
                task.arn.clone(),
            ]
        })
        .collect();
    let widths = column_widths(HEADER_CELLS, &rows);

    for (cell, width) in HEADER_CELLS.iter().zip(widths) {
        write!(out, "{}  ", bold(pad(cell, width), HEADER))?;
    }
    writeln!(out)?;
    for (cell, width) in HEADER_CELLS.iter().zip(widths) {
        write!(out, "{}  ", paint(pad(&"─".repeat(cell.chars().count()), width), MUTED))?;
    }
    writeln!(out)?;

    for (task, row) in tasks.iter().zip(&rows) {
        writeln!(
            out,
            "{}  {}  {}  {}",
            bold(pad(&row[0], widths[0]), PRIMARY),
            bold(pad(&row[1], widths[1]), status_color(task.status.class())),
            paint(pad(&row[2], widths[2]), VALUE),
            paint(row[3].clone(), MUTED),
        )?;
    }
    Ok(())
}

fn write_statistics(out: &mut impl Write, task: &TaskRecord) -> io::Result<()> {
    let Some(stats) = &task.stats else {
        return Ok(());
    };
    writeln!(out)?;
    writeln!(out, "{}", bold("Statistics:", HIGHLIGHT))?;
    writeln!(
        out,
        "  {} {}",
        label("Full Load Progress:"),
        paint(format!("{}%", stats.full_load_progress_percent), NUMBER)
    )?;
    writeln!(out, "  {} {}", label("Tables Loaded:"), paint(stats.tables_loaded.to_string(), NUMBER))?;
    writeln!(out, "  {} {}", label("Tables Loading:"), paint(stats.tables_loading.to_string(), NUMBER))?;
    writeln!(out, "  {} {}", label("Tables Queued:"), paint(stats.tables_queued.to_string(), NUMBER))?;
    writeln!(out, "  {} {}", label("Tables Errored:"), error_count(stats.tables_errored))?;
    if stats.elapsed_time_millis > 0 {
        writeln!(
            out,
            "  {} {}",
            label("Elapsed Time:"),
            paint(format_elapsed(stats.elapsed_time_millis), VALUE)
        )?;
    }
    if let Some(reason) = &stats.stop_reason {
        writeln!(out, "  {} {}", label("Stop Reason:"), bold(reason.as_str(), WARNING))?;
    }
    Ok(())
}

/// `list --stats`: one block per task.
pub fn write_task_summaries(out: &mut impl Write, tasks: &[TaskRecord]) -> io::Result<()> {
    for (index, task) in tasks.iter().enumerate() {
        if index > 0 {
            separator(out)?;
        }
        writeln!(out, "{} {}", label("Task:"), bold(task.name.as_str(), PRIMARY))?;
        writeln!(
            out,
            "{} {}",
            label("Status:"),
            bold(task.status.as_str(), status_color(task.status.class()))
        )?;
        writeln!(out, "{} {}", label("Type:"), paint(task.migration_type.as_str(), VALUE))?;
        writeln!(out, "{} {}", label("ARN:"), paint(task.arn.as_str(), MUTED))?;
        write_statistics(out, task)?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_total(out: &mut impl Write, total: usize) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} {}", label("Total tasks:"), paint(total.to_string(), NUMBER))
}

pub fn write_task_details(out: &mut impl Write, task: &TaskRecord) -> io::Result<()> {
    writeln!(out, "{} {}", label("Task:"), bold(task.name.as_str(), PRIMARY))?;
    writeln!(out, "{} {}", label("ARN:"), paint(task.arn.as_str(), MUTED))?;
    writeln!(
        out,
        "{} {}",
        label("Status:"),
        bold(task.status.as_str(), status_color(task.status.class()))
    )?;
    writeln!(out, "{} {}", label("Migration Type:"), paint(task.migration_type.as_str(), VALUE))?;

    writeln!(out)?;
    writeln!(out, "{}", bold("Endpoints:", HIGHLIGHT))?;
    writeln!(
        out,
        "  {} {}",
        label("Replication Instance:"),
        paint(task.replication_instance_arn.as_str(), MUTED)
    )?;
    writeln!(out, "  {} {}", label("Source:"), paint(task.source_endpoint_arn.as_str(), MUTED))?;
    writeln!(out, "  {} {}", label("Target:"), paint(task.target_endpoint_arn.as_str(), MUTED))?;

    if task.created_at.is_some() {
        writeln!(out)?;
        writeln!(
            out,
            "{} {}",
            label("Created At:"),
            paint(format_timestamp(task.created_at.as_ref()), VALUE)
        )?;
    }
    if task.started_at.is_some() {
        writeln!(
            out,
            "{} {}",
            label("Started At:"),
            paint(format_timestamp(task.started_at.as_ref()), VALUE)
        )?;
    }
    if let Some(failure) = &task.last_failure_message {
        writeln!(out)?;
        writeln!(out, "{} {failure}", bold("Last Failure:", ERROR))?;
    }
    write_statistics(out, task)
}

pub fn write_describe_failure(out: &mut impl Write, arn: &str, err: &dyn std::fmt::Display) -> io::Result<()> {
    writeln!(out, "{} {arn}: {err}", bold("Error describing task", ERROR))
}

pub fn write_describe_separator(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    separator(out)
}

pub fn write_table_statistics(out: &mut impl Write, stats: &[TableStatRecord]) -> io::Result<()> {
    writeln!(out)?;
    if stats.is_empty() {
        return writeln!(out, "{}", bold("Table Statistics: None", WARNING));
    }
    writeln!(out, "{}", bold("Table Statistics:", HIGHLIGHT))?;

    const HEADER_CELLS: [&str; 8] = [
        "SCHEMA", "TABLE", "INSERTS", "UPDATES", "DELETES", "DDLS", "ROWS", "STATE",
    ];
    let rows: Vec<[String; 8]> = stats
        .iter()
        .map(|stat| {
            [
                stat.schema_name.clone(),
                stat.table_name.clone(),
                stat.inserts.to_string(),
                stat.updates.to_string(),
                stat.deletes.to_string(),
                stat.ddls.to_string(),
                stat.full_load_rows.to_string(),
                stat.validation_state.as_str().to_string(),
            ]
        })
        .collect();
    let widths = column_widths(HEADER_CELLS, &rows);

    write!(out, "  ")?;
    for (cell, width) in HEADER_CELLS.iter().zip(widths) {
        write!(out, "{}  ", bold(pad(cell, width), HEADER))?;
    }
    writeln!(out)?;

    for (stat, row) in stats.iter().zip(&rows) {
        write!(
            out,
            "  {}  {}  ",
            paint(pad(&row[0], widths[0]), VALUE),
            bold(pad(&row[1], widths[1]), PRIMARY)
        )?;
        for column in 2..7 {
            write!(out, "{}  ", paint(pad(&row[column], widths[column]), NUMBER))?;
        }
        writeln!(
            out,
            "{}",
            paint(row[7].clone(), validation_color(stat.validation_state.kind()))
        )?;
    }
    Ok(())
}

pub fn write_batch_header(out: &mut impl Write, op: Operation, count: usize) -> io::Result<()> {
    writeln!(out, "{} {count} task(s) in parallel...", op.progressive())?;
    writeln!(out)
}

/// One line per outcome in target order, then the success count.
pub fn write_outcomes(
    out: &mut impl Write,
    op: Operation,
    outcomes: &[OperationOutcome],
) -> io::Result<()> {
    for outcome in outcomes {
        let mark = if outcome.success { "✓" } else { "✗" };
        writeln!(out, "{mark} {}: {}", label_from_arn(&outcome.target), outcome.message)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Successfully {} {} out of {} tasks",
        op.past_tense(),
        count_succeeded(outcomes),
        outcomes.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_core::{ProgressStats, ValidationState};

    fn plain(bytes: Vec<u8>) -> String {
        let text = String::from_utf8(bytes).unwrap();
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\u{1b}' {
                for next in chars.by_ref() {
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn batch_output_lists_outcomes_and_summary() {
        let outcomes = vec![
            OperationOutcome::succeeded("arn:aws:dms:us-east-1:1:task:db-a", Operation::Stop),
            OperationOutcome::failed(
                "arn:aws:dms:us-east-1:1:task:db-b",
                Operation::Stop,
                "invalid state: not running",
            ),
        ];
        let mut out = Vec::new();
        write_batch_header(&mut out, Operation::Stop, 2).unwrap();
        write_outcomes(&mut out, Operation::Stop, &outcomes).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Stopping 2 task(s) in parallel...\n\n\
             ✓ db-a: Successfully issued stop command\n\
             ✗ db-b: Failed to stop task: invalid state: not running\n\n\
             Successfully stopped 1 out of 2 tasks\n"
        );
    }

    #[test]
    fn task_table_aligns_columns() {
        let mut long = TaskRecord::new("arn:aws:dms:us-east-1:1:task:L", "a-much-longer-name", "stopped");
        long.migration_type = "cdc".into();
        let short = TaskRecord::new("arn:aws:dms:us-east-1:1:task:S", "db", "running");

        let mut out = Vec::new();
        write_task_table(&mut out, &[long, short]).unwrap();
        let text = plain(out);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("NAME                "));
        assert!(lines[2].starts_with("a-much-longer-name  stopped  cdc"));
        assert!(lines[3].starts_with("db                  running"));
    }

    #[test]
    fn details_include_statistics_and_failure() {
        let mut task = TaskRecord::new("arn:aws:dms:us-east-1:1:task:X", "orders", "failed");
        task.last_failure_message = Some("timeout".into());
        task.stats = Some(ProgressStats {
            full_load_progress_percent: 40,
            elapsed_time_millis: 303_000,
            tables_errored: 2,
            stop_reason: Some("Stop Reason FATAL_ERROR".into()),
            ..Default::default()
        });

        let mut out = Vec::new();
        write_task_details(&mut out, &task).unwrap();
        let text = plain(out);

        assert!(text.contains("Status: failed"));
        assert!(text.contains("Last Failure: timeout"));
        assert!(text.contains("  Full Load Progress: 40%"));
        assert!(text.contains("  Tables Errored: 2"));
        assert!(text.contains("  Elapsed Time: 5m 3s"));
        assert!(text.contains("  Stop Reason: Stop Reason FATAL_ERROR"));
        assert!(!text.contains("Created At"));
    }

    #[test]
    fn empty_table_statistics_say_none() {
        let mut out = Vec::new();
        write_table_statistics(&mut out, &[]).unwrap();
        assert!(plain(out).contains("Table Statistics: None"));

        let stat = TableStatRecord {
            schema_name: "public".into(),
            table_name: "users".into(),
            inserts: 12,
            deletes: 0,
            updates: 3,
            ddls: 0,
            full_load_rows: 1000,
            last_update_time: None,
            validation_state: ValidationState::parse("Pending records"),
        };
        let mut out = Vec::new();
        write_table_statistics(&mut out, &[stat]).unwrap();
        let text = plain(out);
        assert!(text.contains("SCHEMA"));
        assert!(text.contains("public"));
        assert!(text.contains("Pending records"));
    }

    #[test]
    fn warnings_are_prefixed() {
        let mut out = Vec::new();
        write_warnings(&mut out, &[ResolutionError::NameNotFound("ghost".into())]).unwrap();
        assert_eq!(plain(out), "Warning: task 'ghost' not found\n");
    }
}
