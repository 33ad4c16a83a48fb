//! Table over a record feed that is still arriving.
//!
//! [`LazyTable`] owns the rows received so far and tells its driver, through
//! [`LazyTable::wants_more`], whether another record should be pulled. The
//! pull target is the cursor position plus the visible window plus a fixed
//! look-ahead, so the buffer only grows as the operator scrolls.

use std::sync::Arc;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::Theme;
use crate::config::{KeyResolver, NavAction, PickerAction};
use crate::record::Record;
use crate::ui::{Component, Handled, Result, Spinner};

const MAX_COLUMN_WIDTH: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    Confirmed(Record),
    Cancelled,
}

/// State of the feed behind the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// More records may still arrive.
    Loading,
    /// The feed ended normally.
    Exhausted,
    /// The feed ended with an error; rows received before it stay usable.
    Failed(String),
}

pub struct LazyTable {
    rows: Vec<Record>,
    columns: Vec<String>,
    state: TableState,
    status: FeedStatus,
    /// Downward moves requested past the last buffered row.
    pending_moves: usize,
    /// Data rows visible in the last rendered frame.
    viewport: usize,
    lookahead: usize,
    title: String,
    spinner: Spinner,
    resolver: Arc<KeyResolver>,
}

impl LazyTable {
    pub fn new(title: impl Into<String>, lookahead: usize, resolver: Arc<KeyResolver>) -> Self {
        Self {
            rows: Vec::new(),
            columns: Vec::new(),
            state: TableState::default(),
            status: FeedStatus::Loading,
            pending_moves: 0,
            viewport: 0,
            lookahead,
            title: title.into(),
            spinner: Spinner::new(),
            resolver,
        }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn selected(&self) -> Option<&Record> {
        self.state.selected().and_then(|i| self.rows.get(i))
    }

    /// Whether the driver should pull another record from the feed.
    pub fn wants_more(&self) -> bool {
        self.status == FeedStatus::Loading && self.rows.len() < self.pull_target()
    }

    fn pull_target(&self) -> usize {
        self.state.selected().unwrap_or(0)
            + self.pending_moves
            + self.viewport.max(1)
            + self.lookahead
    }

    /// Append a record from the feed.
    ///
    /// The first record fixes the columns; later records are shown under
    /// those columns with missing fields left blank.
    pub fn push(&mut self, record: Record) {
        if self.columns.is_empty() {
            self.columns = record.names().map(str::to_string).collect();
        }
        self.rows.push(record);

        if self.state.selected().is_none() {
            self.state.select(Some(0));
        } else if self.pending_moves > 0 {
            self.pending_moves -= 1;
            self.state.select(Some(self.rows.len() - 1));
        }
    }

    /// The feed ended normally.
    pub fn finish(&mut self) {
        self.status = FeedStatus::Exhausted;
        self.pending_moves = 0;
    }

    /// The feed ended with an error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = FeedStatus::Failed(message.into());
        self.pending_moves = 0;
    }

    fn last_index(&self) -> Option<usize> {
        self.rows.len().checked_sub(1)
    }

    /// Move the cursor down by `step`, parking any remainder as pending
    /// moves while the feed is still open.
    fn move_down(&mut self, step: usize) {
        let (Some(selected), Some(last)) = (self.state.selected(), self.last_index()) else {
            return;
        };
        let target = selected + self.pending_moves + step;
        if target <= last {
            self.pending_moves = 0;
            self.state.select(Some(target));
        } else {
            self.state.select(Some(last));
            self.pending_moves = if self.status == FeedStatus::Loading {
                target - last
            } else {
                0
            };
        }
    }

    fn move_up(&mut self, step: usize) {
        self.pending_moves = 0;
        if let Some(selected) = self.state.selected() {
            self.state.select(Some(selected.saturating_sub(step)));
        }
    }

    const fn page_size(&self) -> usize {
        if self.viewport > 1 { self.viewport - 1 } else { 1 }
    }

    fn column_widths(&self) -> Vec<Constraint> {
        let last = self.columns.len().saturating_sub(1);
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let widest = self
                    .rows
                    .iter()
                    .filter_map(|record| record.get(column))
                    .map(|value| value.chars().count())
                    .chain(std::iter::once(column.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .min(MAX_COLUMN_WIDTH);
                let width = u16::try_from(widest).unwrap_or(u16::MAX);
                if i == last {
                    Constraint::Min(width)
                } else {
                    Constraint::Length(width)
                }
            })
            .collect()
    }

    fn hints(&self, theme: &Theme) -> Line<'static> {
        let key_style = Style::default().fg(theme.peach());
        let separator_style = Style::default().fg(theme.surface2());
        let description_style = Style::default().fg(theme.subtext0());

        let bindings = [
            (
                format!(
                    "{}/{}",
                    self.resolver.display_nav(NavAction::Up),
                    self.resolver.display_nav(NavAction::Down)
                ),
                "move",
            ),
            (self.resolver.display_nav(NavAction::Select), "select"),
            (self.resolver.display_picker(PickerAction::Cancel), "cancel"),
        ];

        let mut spans = Vec::with_capacity(bindings.len() * 3);
        for (key, description) in bindings {
            spans.push(Span::styled(key, key_style));
            spans.push(Span::styled(" │ ", separator_style));
            spans.push(Span::styled(format!("{description}  "), description_style));
        }
        Line::from(spans)
    }

    fn render_footer(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let hints = self.hints(theme);
        let hints_width = u16::try_from(hints.width()).unwrap_or(u16::MAX);
        let [status_area, hints_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(hints_width)]).areas(area);

        let position = format!(
            "{}/{}",
            self.state.selected().map_or(0, |i| i + 1),
            self.rows.len()
        );
        let position_style = Style::default().fg(theme.subtext0());

        match &self.status {
            FeedStatus::Loading => {
                self.spinner.set_label(format!("{position} loading"));
                self.spinner.render(frame, status_area, theme);
            }
            FeedStatus::Exhausted => {
                let line = Line::from(vec![
                    Span::styled(position, position_style),
                    Span::styled("  end of list", Style::default().fg(theme.green())),
                ]);
                frame.render_widget(Paragraph::new(line), status_area);
            }
            FeedStatus::Failed(message) => {
                let line = Line::from(vec![
                    Span::styled(position, position_style),
                    Span::styled(
                        format!("  error: {message}"),
                        Style::default().fg(theme.error()),
                    ),
                ]);
                frame.render_widget(Paragraph::new(line), status_area);
            }
        }

        frame.render_widget(Paragraph::new(hints), hints_area);
    }
}

impl Component for LazyTable {
    type Output = PickerEvent;

    fn handle_key(&mut self, key: KeyEvent) -> Result<Handled<Self::Output>> {
        if self.resolver.matches_nav(&key, NavAction::Select) {
            return Ok(self
                .selected()
                .map_or(Handled::Ignored, |record| {
                    PickerEvent::Confirmed(record.clone()).into()
                }));
        }
        if self.resolver.matches_nav(&key, NavAction::Down) {
            self.move_down(1);
            return Ok(Handled::Consumed);
        }
        if self.resolver.matches_nav(&key, NavAction::Up) {
            self.move_up(1);
            return Ok(Handled::Consumed);
        }
        if self.resolver.matches_nav(&key, NavAction::PageDown) {
            self.move_down(self.page_size());
            return Ok(Handled::Consumed);
        }
        if self.resolver.matches_nav(&key, NavAction::PageUp) {
            self.move_up(self.page_size());
            return Ok(Handled::Consumed);
        }
        if self.resolver.matches_nav(&key, NavAction::Home) {
            self.move_up(usize::MAX);
            return Ok(Handled::Consumed);
        }
        if self.resolver.matches_nav(&key, NavAction::End) {
            // Only rows that have already arrived.
            self.pending_moves = 0;
            if let Some(last) = self.last_index() {
                self.state.select(Some(last));
            }
            return Ok(Handled::Consumed);
        }
        if self.resolver.matches_picker(&key, PickerAction::Cancel) {
            return Ok(PickerEvent::Cancelled.into());
        }

        Ok(Handled::Ignored)
    }

    fn on_tick(&mut self) {
        if self.status == FeedStatus::Loading {
            self.spinner.on_tick();
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let [table_area, footer_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

        // Borders and the header row take three lines.
        self.viewport = usize::from(table_area.height.saturating_sub(3));

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.border()))
            .title(format!(" {} ", self.title))
            .title_style(
                Style::default()
                    .fg(theme.mauve())
                    .add_modifier(Modifier::BOLD),
            );

        if self.columns.is_empty() {
            let message = match self.status {
                FeedStatus::Loading => "Waiting for results",
                FeedStatus::Exhausted => "No entries",
                FeedStatus::Failed(_) => "Nothing to show",
            };
            let placeholder = Paragraph::new(message)
                .style(Style::default().fg(theme.overlay1()))
                .block(block);
            frame.render_widget(placeholder, table_area);
        } else {
            let header_style = Style::default()
                .fg(theme.header())
                .add_modifier(Modifier::BOLD);
            let header = Row::new(
                self.columns
                    .iter()
                    .map(|column| Cell::from(column.clone()).style(header_style)),
            )
            .height(1)
            .style(Style::default().bg(theme.surface0()));

            let rows: Vec<Row> = self
                .rows
                .iter()
                .map(|record| {
                    Row::new(self.columns.iter().map(|column| {
                        Cell::from(record.get(column).unwrap_or_default().to_string())
                    }))
                    .style(Style::default().fg(theme.text()))
                })
                .collect();

            let table = Table::new(rows, self.column_widths())
                .header(header)
                .block(block)
                .row_highlight_style(
                    Style::default()
                        .bg(theme.selection_bg())
                        .fg(theme.lavender())
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("▶ ");

            frame.render_stateful_widget(table, table_area, &mut self.state);
        }

        self.render_footer(frame, footer_area, theme);
    }
}
