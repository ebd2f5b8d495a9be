use chrono::Utc;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use super::{format_age, format_duration, status_color, truncate};
use crate::app::App;
use crate::poller::{ListSnapshot, LoadingState};
use crate::types::WorkflowTask;

pub fn render(frame: &mut Frame, app: &App, snapshot: &ListSnapshot<WorkflowTask>, area: Rect) {
    let page = &snapshot.page;
    let refreshing = if snapshot.loading == LoadingState::Background {
        " ⟳"
    } else {
        ""
    };
    let block = Block::default().borders(Borders::ALL).title(format!(
        " Tasks ({}) - page {}/{}{} ",
        page.total,
        page.page_num,
        page.page_count(),
        refreshing
    ));

    if page.items.is_empty() && snapshot.loading != LoadingState::Foreground {
        let empty = Paragraph::new("No tasks yet - press n to launch one")
            .block(block)
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    }

    let w = area.width.saturating_sub(2) as usize;
    let fixed = 41; // status(2) + #id(7) + space(1) + status(10) + space(1) + creator(12) + space(1) + duration(6) + age(4)
    let flex = w.saturating_sub(fixed).max(10);
    let now = Utc::now();
    let selected = app.task_index.min(page.items.len().saturating_sub(1));

    let items: Vec<ListItem> = page
        .items
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let style = if i == selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let color = status_color(task.status);
            let duration = task
                .duration_secs(now)
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string());

            let line = Line::from(vec![
                Span::styled(format!("{:<2}", task.status.glyph()), Style::default().fg(color)),
                Span::styled(format!("#{:<6}", task.task_id), Style::default().fg(Color::Cyan)),
                Span::raw(" "),
                Span::styled(
                    format!("{:<flex$}", truncate(&task.workflow_display_name, flex)),
                    style,
                ),
                Span::raw(" "),
                Span::styled(
                    format!("{:<10}", task.status.to_string()),
                    Style::default().fg(color),
                ),
                Span::raw(" "),
                Span::styled(
                    format!("{:<12}", truncate(&task.creator, 12)),
                    Style::default().fg(Color::Gray),
                ),
                Span::raw(" "),
                Span::styled(format!("{:>6}", duration), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:>4}", format_age(task.create_time)),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default();
    if !page.items.is_empty() {
        state.select(Some(selected));
    }

    frame.render_stateful_widget(list, area, &mut state);
}
