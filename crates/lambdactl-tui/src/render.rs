// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use lambdactl_app::{
    COLUMN_PADDING, ConsoleState, FOOTER_HEIGHT, HEADER_HEIGHT, ListView, SelectedRecord,
    TableWidget, ViewMode,
};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};

const TITLE: &str = "lambdactl";
const UNAVAILABLE: &str = "no longer available";

pub fn render(frame: &mut Frame<'_>, state: &ConsoleState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(frame.area());

    render_tabs(frame, layout[0], state);
    render_table(frame, layout[1], state);
    render_footer(frame, layout[2], state);

    match state.mode() {
        ViewMode::DetailOverlay | ViewMode::LaunchConfirm => render_overlay(frame, state),
        ViewMode::ShellSession => {
            let area = centered_rect(40, 20, frame.area());
            frame.render_widget(Clear, area);
            let notice = Paragraph::new("ssh session in progress")
                .block(Block::default().borders(Borders::ALL).title("shell"));
            frame.render_widget(notice, area);
        }
        ViewMode::InstanceList
        | ViewMode::OfferingList
        | ViewMode::FilesystemList
        | ViewMode::CredentialList => {}
    }
}

fn render_tabs(frame: &mut Frame<'_>, area: Rect, state: &ConsoleState) {
    let titles = ListView::ALL
        .iter()
        .map(|view| format!("{} ({})", view.label(), state.table(*view).len()))
        .collect::<Vec<String>>();

    let tabs = Tabs::new(titles)
        .block(Block::default().title(TITLE).borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(state.active_view().index());
    frame.render_widget(tabs, area);
}

fn render_table(frame: &mut Frame<'_>, area: Rect, state: &ConsoleState) {
    let view = state.active_view();
    let table = state.table(view);
    let page = table.page();
    let widths = column_constraints(table);

    let header = Row::new(table.headers().iter().map(|header| {
        Cell::from(header.clone()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = page.rows.iter().enumerate().map(|(index, cells)| {
        let style = if page.selected == Some(index) {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(cells.iter().map(|cell| Cell::from(cell.clone()))).style(style)
    });

    let title = if table.is_empty() {
        format!("{} (empty)", view.label())
    } else {
        format!("{} {}/{}", view.label(), table.cursor(), table.len())
    };
    let widget = Table::new(rows, widths)
        .header(header)
        .column_spacing(0)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(widget, area);
}

/// Each column carries its own trailing padding cell, so the lengths sum to
/// the table's inner width.
fn column_constraints(table: &TableWidget) -> Vec<Constraint> {
    table
        .column_widths()
        .into_iter()
        .map(|width| {
            let padded = width.saturating_add(COLUMN_PADDING);
            Constraint::Length(u16::try_from(padded).unwrap_or(u16::MAX))
        })
        .collect()
}

fn render_footer(frame: &mut Frame<'_>, area: Rect, state: &ConsoleState) {
    let (text, style) = if let Some(error) = state.error() {
        (
            error.message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else if let Some(launch) = state.launch()
        && launch.is_outstanding()
        && state.mode().list().is_some()
    {
        (
            format!("{}  |  {}", launch.summary(), key_hints(state)),
            Style::default().fg(Color::Yellow),
        )
    } else {
        (key_hints(state).to_owned(), Style::default().fg(Color::Yellow))
    };

    let footer = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

fn key_hints(state: &ConsoleState) -> &'static str {
    match state.mode() {
        ViewMode::DetailOverlay if state.active_view() == ListView::Instances => {
            "s ssh  esc back  q quit"
        }
        ViewMode::DetailOverlay => "esc back  q quit",
        ViewMode::LaunchConfirm => "l launch  esc back  q quit",
        ViewMode::ShellSession => "",
        _ if state.launch().is_some_and(|launch| launch.is_outstanding()) => {
            "tab next  enter open  r refresh  x cancel launch  q quit"
        }
        _ => "tab next  enter open  j/k move  r refresh  q quit",
    }
}

fn render_overlay(frame: &mut Frame<'_>, state: &ConsoleState) {
    let record = state.selected_record();
    let title = record
        .as_ref()
        .map_or_else(|| "selection".to_owned(), SelectedRecord::title);
    let mut body = record.map_or_else(|| UNAVAILABLE.to_owned(), |record| record_yaml(&record));
    if state.mode() == ViewMode::LaunchConfirm && record.is_some() {
        body.push_str("\npress l to launch one instance, esc to go back");
    }

    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let overlay = Paragraph::new(body).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(overlay, area);
}

fn record_yaml(record: &SelectedRecord<'_>) -> String {
    let rendered = match record {
        SelectedRecord::Instance(instance) => serde_yaml::to_string(instance),
        SelectedRecord::Offering(offering) => serde_yaml::to_string(offering),
        SelectedRecord::Filesystem(filesystem) => serde_yaml::to_string(filesystem),
        SelectedRecord::Credential(credential) => serde_yaml::to_string(credential),
    };
    rendered.unwrap_or_else(|error| format!("cannot render record: {error}"))
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
