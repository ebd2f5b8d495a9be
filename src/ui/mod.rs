mod popup;
mod task_detail;
mod task_list;

use chrono::Utc;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{App, Popup, Screen};
use crate::poller::{ListSnapshot, LoadingState, Phase, ScheduleState};
use crate::types::{TaskStatus, WorkflowTask};

pub fn render(frame: &mut Frame, app: &App) {
    let snapshot = app.snapshot();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, &snapshot, chunks[0]);

    match app.screen {
        Screen::TaskList => task_list::render(frame, app, &snapshot, chunks[1]),
        Screen::TaskDetail => task_detail::render(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, &snapshot, chunks[2]);

    match &app.popup {
        Some(Popup::Launch(form)) => popup::render_launch_form(frame, form),
        Some(Popup::ConfirmClone { task_id }) => popup::render_confirm(
            frame,
            "Clone task",
            &format!("Run a new task with the parameters of #{}?", task_id),
        ),
        None => {}
    }
}

fn render_header(frame: &mut Frame, app: &App, snapshot: &ListSnapshot<WorkflowTask>, area: Rect) {
    let title = match app.screen {
        Screen::TaskList => format!("ztask - {}", app.scope),
        Screen::TaskDetail => match &app.current_detail {
            Some(detail) => format!(
                "ztask - {} #{}",
                detail.task.workflow_display_name, detail.task.task_id
            ),
            None => "ztask - Task".to_string(),
        },
    };

    let refresh = match snapshot.phase {
        Phase::Active => Span::styled(" ● auto", Style::default().fg(Color::Green)),
        Phase::Suspended if snapshot.auto_refresh => {
            Span::styled(" ◐ paused", Style::default().fg(Color::Yellow))
        }
        Phase::Suspended => Span::styled(" ○ manual", Style::default().fg(Color::Gray)),
        Phase::Destroyed => Span::raw(""),
    };
    let schedule = Span::styled(
        schedule_label(snapshot.schedule),
        Style::default().fg(Color::Gray),
    );

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        refresh,
        schedule,
    ]))
    .style(Style::default().bg(Color::DarkGray));

    frame.render_widget(header, area);
}

fn render_status_bar(
    frame: &mut Frame,
    app: &App,
    snapshot: &ListSnapshot<WorkflowTask>,
    area: Rect,
) {
    let status = if let Some(error) = &app.error {
        Line::from(vec![Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )])
    } else if let Some(notice) = &app.notice {
        Line::from(vec![Span::styled(
            notice.clone(),
            Style::default().fg(Color::Green),
        )])
    } else if snapshot.loading == LoadingState::Foreground {
        Line::from(vec![Span::styled(
            "Loading...",
            Style::default().fg(Color::Yellow),
        )])
    } else {
        let help = match (app.screen, &app.popup) {
            (_, Some(Popup::Launch(_))) => {
                "↑/↓: field | type to edit | space/←/→: choose | Enter: launch | Esc: cancel"
            }
            (_, Some(Popup::ConfirmClone { .. })) => "y: clone | n: cancel",
            (Screen::TaskList, None) => {
                "j/k/g/G: nav | [/]: page | Enter: open | n: launch | c: clone | r: refresh | a: auto | o: browser | q: quit"
            }
            (Screen::TaskDetail, None) => "j/k: scroll | c: clone | o: browser | y: copy url | q: back",
        };
        Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

fn schedule_label(schedule: ScheduleState) -> &'static str {
    match schedule {
        ScheduleState::Scheduled => " (next tick armed)",
        ScheduleState::Fetching => " (refreshing)",
        ScheduleState::Idle => "",
    }
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Passed => Color::Green,
        TaskStatus::Failed | TaskStatus::Reject | TaskStatus::Timeout => Color::Red,
        TaskStatus::Running | TaskStatus::Prepare => Color::Yellow,
        TaskStatus::Cancelled | TaskStatus::Unstable => Color::Magenta,
        _ => Color::Gray,
    }
}

fn format_age(dt: chrono::DateTime<chrono::Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        "now".to_string()
    }
}

fn format_duration(secs: i64) -> String {
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Truncate to `max` characters, marking the cut with "...".
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formats() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m05s");
        assert_eq!(format_duration(3720), "1h02m");
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("build-and-deploy", 10), "build-a...");
        assert_eq!(truncate("构建部署流水线任务", 5), "构建...");
    }

    #[test]
    fn schedule_label_is_empty_when_idle() {
        assert_eq!(schedule_label(ScheduleState::Idle), "");
        assert!(schedule_label(ScheduleState::Fetching).contains("refreshing"));
    }

    #[test]
    fn age_of_recent_task_is_now() {
        assert_eq!(format_age(Utc::now()), "now");
        assert_eq!(format_age(Utc::now() - chrono::Duration::hours(3)), "3h");
    }
}
