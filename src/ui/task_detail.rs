use chrono::Utc;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use super::{format_duration, status_color};
use crate::app::App;
use crate::types::{TaskDetail, WorkflowTask};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(detail) = &app.current_detail else {
        let empty = Paragraph::new("No task loaded")
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    render_header(frame, &detail.task, chunks[0]);
    render_params(frame, app, detail, chunks[1]);
}

fn render_header(frame: &mut Frame, task: &WorkflowTask, area: Rect) {
    let label = Style::default().fg(Color::Gray);
    let color = status_color(task.status);
    let fmt_time = |t: Option<chrono::DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let duration = task
        .duration_secs(Utc::now())
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} {}", task.status.glyph(), task.status),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(format!("by {}", task.creator), label),
        ]),
        Line::from(vec![
            Span::styled("Created:  ", label),
            Span::raw(fmt_time(Some(task.create_time))),
        ]),
        Line::from(vec![
            Span::styled("Started:  ", label),
            Span::raw(fmt_time(task.start_time)),
        ]),
        Line::from(vec![
            Span::styled("Finished: ", label),
            Span::raw(fmt_time(task.end_time)),
        ]),
        Line::from(vec![Span::styled("Duration: ", label), Span::raw(duration)]),
    ];

    let header = Paragraph::new(lines).block(
        Block::default().borders(Borders::ALL).title(Span::styled(
            format!(" {} #{} ", task.workflow_display_name, task.task_id),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
    );
    frame.render_widget(header, area);
}

fn render_params(frame: &mut Frame, app: &App, detail: &TaskDetail, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Parameters ({}) ", detail.params.len()));

    if detail.params.is_empty() {
        let empty = Paragraph::new("This task ran without parameters")
            .block(block)
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    }

    let width = detail
        .params
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0);

    let lines: Vec<Line> = detail
        .params
        .iter()
        .map(|p| {
            Line::from(vec![
                Span::styled(format!("{:<width$}", p.name), Style::default().fg(Color::Cyan)),
                Span::raw("  "),
                Span::raw(p.display_value()),
            ])
        })
        .collect();

    let body = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(body, area);
}
