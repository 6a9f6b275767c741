//! UI rendering functions

use ratatui::prelude::*;
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row as TableRow, Scrollbar,
    ScrollbarOrientation, ScrollbarState, Table,
};

use crate::app::App;
use appdeck::types::*;

pub fn ui(frame: &mut Frame, app: &mut App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let change_count = app.changes.change_count();
    let title_text = if change_count > 0 {
        format!(" Add/Remove Applications │ {change_count} pending changes ")
    } else {
        " Add/Remove Applications │ No changes pending ".to_string()
    };
    let title = Paragraph::new(title_text)
        .style(Style::default().fg(Color::White).bg(Color::Blue).bold());
    frame.render_widget(title, main_chunks[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(26), Constraint::Min(40)])
        .split(main_chunks[1]);

    render_category_pane(frame, app, panes[0]);
    render_app_table(frame, app, panes[1]);

    match app.state {
        AppState::ConfirmApply => render_apply_confirm_modal(frame, app, main_chunks[1]),
        AppState::ConfirmExit => render_exit_confirm_modal(frame, main_chunks[1]),
        AppState::Refreshing => render_refresh_modal(frame, app, main_chunks[1]),
        AppState::Listing => {}
    }

    let status_style = match app.state {
        AppState::Listing => Style::default().fg(Color::Yellow),
        AppState::ConfirmApply => Style::default().fg(Color::Cyan),
        AppState::Refreshing => Style::default().fg(Color::Cyan),
        AppState::ConfirmExit => Style::default().fg(Color::Red),
    };
    let status = Paragraph::new(app.status_message.clone())
        .style(status_style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, main_chunks[2]);

    let help_text = match app.state {
        AppState::Listing => {
            "Tab:Pane │ ↑↓/jk:Move │ Space:Toggle │ a:Apply │ r:Refresh data │ q:Quit"
        }
        AppState::ConfirmApply => "y/Enter:Apply │ n/Esc:Cancel",
        AppState::Refreshing => "Esc:Cancel fetch",
        AppState::ConfirmExit => "y/Enter:Quit │ n/Esc:Cancel",
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, main_chunks[3]);
}

fn render_category_pane(frame: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.ui.focused_pane == FocusedPane::Categories;

    let items: Vec<ListItem> = app
        .categories
        .entries()
        .iter()
        .map(|cate| ListItem::new(cate.name.clone()))
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Categories ")
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, &mut app.ui.cate_state);
}

fn render_app_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.ui.focused_pane == FocusedPane::Applications;

    let header = TableRow::new([
        Cell::from(""),
        Cell::from("Application").style(Style::default().fg(Color::Cyan).bold()),
        Cell::from("Summary").style(Style::default().fg(Color::Cyan).bold()),
    ])
    .height(1);

    let rows: Vec<TableRow> = app
        .rows
        .iter()
        .map(|row| {
            let checkbox = if row.checked { "[x]" } else { "[ ]" };
            // Pending rows carry the highlight until the change is applied
            // or undone.
            let name_style = if row.pending {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default()
            };
            let kind_suffix = match row.kind {
                RowKind::Application => "",
                RowKind::Update => " (update)",
            };

            TableRow::new([
                Cell::from(checkbox).style(name_style),
                Cell::from(format!("{}{kind_suffix}", row.display_name)).style(name_style),
                Cell::from(row.summary.clone()),
            ])
        })
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let widths = [
        Constraint::Length(3),
        Constraint::Length(24),
        Constraint::Min(20),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" Applications ({}) ", app.rows.len()))
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(table, area, &mut app.ui.table_state);

    if !app.rows.is_empty() {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        let mut scrollbar_state = ScrollbarState::new(app.rows.len())
            .position(app.ui.table_state.selected().unwrap_or(0));

        let scrollbar_area = Rect {
            x: area.x + area.width - 1,
            y: area.y + 1,
            width: 1,
            height: area.height.saturating_sub(2),
        };
        frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }
}

fn render_apply_confirm_modal(frame: &mut Frame, app: &App, area: Rect) {
    let modal_width = 60.min(area.width.saturating_sub(4));
    let modal_height = 20.min(area.height.saturating_sub(2));
    let modal_area = centered(area, modal_width, modal_height);

    frame.render_widget(Clear, modal_area);

    let mut lines = vec![
        Line::from(Span::styled(
            "The following changes will be made:",
            Style::default().bold(),
        )),
        Line::from(""),
    ];

    let to_add = app.changes.to_add();
    let to_rm = app.changes.to_rm();

    if !to_add.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Install ({}):", to_add.len()),
            Style::default().fg(Color::Green).bold(),
        )));
        for pkg in to_add {
            lines.push(Line::from(format!("  + {pkg}")));
        }
        lines.push(Line::from(""));
    }

    if !to_rm.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Remove ({}):", to_rm.len()),
            Style::default().fg(Color::Red).bold(),
        )));
        for pkg in to_rm {
            lines.push(Line::from(format!("  - {pkg}")));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "y/Enter: Apply │ n/Esc: Cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let modal = Paragraph::new(lines).block(
        Block::default()
            .title(" Apply Changes ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(modal, modal_area);
}

fn render_refresh_modal(frame: &mut Frame, app: &App, area: Rect) {
    let modal_width = 50.min(area.width.saturating_sub(4));
    let modal_area = centered(area, modal_width, 7);

    frame.render_widget(Clear, modal_area);

    let done = app.refresh.as_ref().map_or(0, appdeck::task::Task::items_done);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Fetching online data...",
            Style::default().bold(),
        )),
        Line::from(""),
        Line::from(format!("{done} items fetched")),
        Line::from(""),
    ];

    let modal = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Refresh ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(modal, modal_area);
}

fn render_exit_confirm_modal(frame: &mut Frame, area: Rect) {
    let modal_width = 50.min(area.width.saturating_sub(4));
    let modal_area = centered(area, modal_width, 7);

    frame.render_widget(Clear, modal_area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "You have pending changes!",
            Style::default().fg(Color::Red).bold(),
        )),
        Line::from(""),
        Line::from("Really quit without applying?"),
        Line::from(""),
        Line::from(Span::styled(
            "y/Enter: Quit │ n/Esc: Cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let modal = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Confirm Exit ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(modal, modal_area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
