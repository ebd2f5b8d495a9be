use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::LaunchForm;
use crate::types::ParamKind;

/// Render a centered confirmation popup: [y]es / [n]o
pub fn render_confirm(frame: &mut Frame, title: &str, message: &str) {
    let area = centered_rect(56, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::raw(message)),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y]", Style::default().fg(Color::Green)),
            Span::raw("es  "),
            Span::styled("[n]", Style::default().fg(Color::Red)),
            Span::raw("o"),
        ]),
    ];

    let popup = Paragraph::new(lines)
        .block(popup_block(title))
        .alignment(ratatui::layout::Alignment::Center);

    frame.render_widget(popup, area);
}

/// Rows taken by the border, the blank line and the key hints.
const FORM_CHROME: usize = 4;
const FORM_MAX_HEIGHT: usize = 20;

/// Render the launch form: one row per parameter, the selected one highlighted.
/// Long forms scroll so the selected row stays in view.
pub fn render_launch_form(frame: &mut Frame, form: &LaunchForm) {
    let wanted = form.spec.params.len().max(1) + FORM_CHROME;
    let area = centered_rect(70, wanted.min(FORM_MAX_HEIGHT) as u16, frame.area());
    frame.render_widget(Clear, area);

    let visible = (area.height as usize).saturating_sub(FORM_CHROME).max(1);
    let (first, last) = param_window(form.spec.params.len(), form.selected, visible);

    let name_width = form
        .spec
        .params
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<Line> = form
        .spec
        .params
        .iter()
        .enumerate()
        .skip(first)
        .take(last - first)
        .map(|(i, param)| {
            let is_selected = i == form.selected;
            let prefix = if is_selected { "> " } else { "  " };
            let name_style = if is_selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            let value = match param.kind {
                ParamKind::Choice => format!("‹ {} ›", param.value),
                ParamKind::Bool => format!("[{}]", if param.value == "true" { "x" } else { " " }),
                _ if is_selected => format!("{}▏", param.display_value()),
                _ => param.display_value(),
            };
            Line::from(vec![
                Span::styled(format!("{}{:<name_width$}", prefix, param.name), name_style),
                Span::raw("  "),
                Span::raw(value),
            ])
        })
        .collect();

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "  This workflow takes no parameters",
            Style::default().fg(Color::Gray),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[Enter]", Style::default().fg(Color::Green)),
        Span::raw(" launch  "),
        Span::styled("[Esc]", Style::default().fg(Color::Red)),
        Span::raw(" cancel"),
    ]));

    let title = if last - first < form.spec.params.len() {
        format!(
            "Launch {} ({}-{} of {})",
            form.spec.display_name,
            first + 1,
            last,
            form.spec.params.len()
        )
    } else {
        format!("Launch {}", form.spec.display_name)
    };
    let popup = Paragraph::new(lines).block(popup_block(&title));
    frame.render_widget(popup, area);
}

fn popup_block(title: &str) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(Span::styled(
        format!(" {} ", title),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
}

/// Half-open range of parameter rows to draw so `selected` is visible,
/// scrolling only as far as needed.
fn param_window(len: usize, selected: usize, visible: usize) -> (usize, usize) {
    if len <= visible {
        return (0, len);
    }
    let selected = selected.min(len - 1);
    let first = selected.saturating_sub(visible - 1).min(len - visible);
    (first, first + visible)
}

/// Create a centered rect of the given size, clamped to the outer rect
fn centered_rect(width: u16, height: u16, outer: Rect) -> Rect {
    let popup_width = width.min(outer.width);
    let popup_height = height.min(outer.height);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((outer.height.saturating_sub(popup_height)) / 2),
            Constraint::Length(popup_height),
            Constraint::Min(0),
        ])
        .split(outer);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((outer.width.saturating_sub(popup_width)) / 2),
            Constraint::Length(popup_width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}
