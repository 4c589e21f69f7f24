/// Spread Board TUI
///
/// Polls the spread feed until it is populated, then shows filtered spreads
/// grouped per token, widest spread first. Secondary routes for a token are
/// revealed by expanding its row.
use std::{
    error::Error,
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use arbhub_spreads::{
    init_file_logging,
    shared::format::{
        format_funding, format_price, format_spread_pct, format_summary, format_time_since,
        format_volume,
    },
    BoardStatus, DisplayRow, FeedConfig, FeedError, FilterField, HttpSpreadFeed, PollHandle,
    Poller, SpreadAcquirer, SpreadBoard, SpreadStore,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use itertools::Itertools;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Log destination; logging is off when unset
fn get_log_file() -> Option<String> {
    std::env::var("ARBHUB_LOG_FILE")
        .ok()
        .filter(|path| !path.trim().is_empty())
}

/// Filter text being typed in the footer
struct FilterInput {
    field: FilterField,
    buffer: String,
}

struct App {
    board: SpreadBoard,
    poll: PollHandle,
    cursor: usize,
    refresh: Option<JoinHandle<Result<usize, FeedError>>>,
    input: Option<FilterInput>,
    notice: Option<String>,
}

impl App {
    fn row_count(&self) -> usize {
        let groups = self.board.groups();
        self.board.rows(&groups).len()
    }

    fn move_cursor(&mut self, down: bool) {
        let last = self.row_count().saturating_sub(1);
        self.cursor = if down {
            (self.cursor + 1).min(last)
        } else {
            self.cursor.saturating_sub(1)
        };
    }

    fn toggle_under_cursor(&mut self) {
        if let Some(headline) = self.board.toggle_row(self.cursor) {
            self.cursor = headline;
        }
    }

    fn begin_input(&mut self, field: FilterField) {
        self.input = Some(FilterInput {
            field,
            buffer: String::new(),
        });
    }

    /// Feed a key to the open filter input
    fn edit_input(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.input = None,
            KeyCode::Backspace => {
                if let Some(input) = self.input.as_mut() {
                    input.buffer.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(input) = self.input.as_mut() {
                    input.buffer.push(ch);
                }
            }
            KeyCode::Enter => {
                let Some(FilterInput { field, buffer }) = self.input.take() else {
                    return;
                };
                let changed = self.board.apply_filter_input(field, &buffer);
                info!(%field, input = %buffer, changed, "filter input applied");
                self.notice = Some(if changed {
                    format!("Filter updated: {field}")
                } else {
                    format!("No change: {field} \"{}\"", buffer.trim())
                });
            }
            _ => {}
        }
    }

    fn select_under_cursor(&mut self) {
        let groups = self.board.groups();
        let id = match self.board.rows(&groups).get(self.cursor) {
            Some(row) => row.spread().id.clone(),
            None => return,
        };
        if self.board.selected_id() == Some(id.as_str()) {
            self.board.clear_selection();
        } else if let Some(spread) = self.board.select(&id) {
            info!(id = %spread.id, token = %spread.token, "selected spread");
        }
    }

    fn start_refresh(&mut self) {
        if self.refresh.is_some() {
            return;
        }
        let acquirer = self.board.acquirer().clone();
        self.refresh = Some(tokio::spawn(async move { acquirer.fetch_spreads().await }));
        self.notice = None;
    }

    async fn collect_refresh(&mut self) {
        if !self.refresh.as_ref().is_some_and(JoinHandle::is_finished) {
            return;
        }
        let Some(task) = self.refresh.take() else {
            return;
        };
        self.notice = match task.await {
            Ok(Ok(count)) => Some(format!("Refreshed: {count} spreads")),
            Ok(Err(error)) => Some(format!("Refresh failed: {error}")),
            Err(error) => {
                warn!(%error, "refresh task aborted");
                Some("Refresh aborted".to_string())
            }
        };
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    if let Some(path) = get_log_file() {
        init_file_logging(path)?;
    }

    let config = FeedConfig::from_env();
    info!(url = %config.base_url, mode = %config.mode, "starting spread board");

    let feed = Arc::new(HttpSpreadFeed::new(&config)?);
    let store = Arc::new(SpreadStore::new());
    let acquirer = SpreadAcquirer::new(feed, store, config.mode);
    let poll = Poller::new(acquirer.clone())
        .with_retry_delay(config.retry_delay)
        .spawn();

    let mut app = App {
        board: SpreadBoard::new(acquirer),
        poll,
        cursor: 0,
        refresh: None,
        input: None,
        notice: None,
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_secs(1);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    loop {
        if dirty || last_tick.elapsed() >= tick_rate {
            app.collect_refresh().await;
            app.cursor = app.cursor.min(app.row_count().saturating_sub(1));
            terminal.draw(|f| render_ui(f, &app))?;
            last_tick = Instant::now();
            dirty = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.input.is_some() {
                    app.edit_input(key.code);
                    dirty = true;
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('r') => app.start_refresh(),
                    KeyCode::Up => app.move_cursor(false),
                    KeyCode::Down => app.move_cursor(true),
                    KeyCode::Enter | KeyCode::Char(' ') => app.toggle_under_cursor(),
                    KeyCode::Char('s') => app.select_under_cursor(),
                    KeyCode::Char('a') => {
                        app.board.select_all_exchanges();
                        app.notice = Some("All exchanges selected".to_string());
                    }
                    KeyCode::Char('c') => {
                        app.board.filter_mut().clear_exchanges();
                        app.notice = Some("All exchanges cleared".to_string());
                    }
                    KeyCode::Char('e') => app.begin_input(FilterField::Exchange),
                    KeyCode::Char('b') => app.begin_input(FilterField::BlockedToken),
                    KeyCode::Char('m') => app.begin_input(FilterField::MinSpread),
                    KeyCode::Char('v') => app.begin_input(FilterField::MinVolume),
                    _ => continue,
                }
                dirty = true;
            }
        }
    }

    let state = app.poll.shutdown().await;
    info!(%state, "spread board closed");

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn render_ui(f: &mut Frame, app: &App) {
    let status = app.board.status();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_toolbar(f, app, &status, chunks[0]);
    render_spreads(f, app, &status, chunks[1]);
    render_selection(f, app, chunks[2]);
    render_footer(f, app, chunks[3]);
}

fn render_toolbar(f: &mut Frame, app: &App, status: &BoardStatus, area: Rect) {
    let filter = app.board.filter();

    let mut spans = vec![
        Span::styled(
            format_summary(status.token_count, status.spread_count),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!(
                "{}/{} exchanges",
                filter.exchanges.len(),
                status.available_exchanges.len()
            ),
            Style::default().fg(Color::Gray),
        ),
    ];

    if filter.min_spread > 0.0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("spread ≥ {}%", filter.min_spread),
            Style::default().fg(Color::Cyan),
        ));
    }

    if filter.min_volume > 0.0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("volume ≥ {}", format_volume(filter.min_volume)),
            Style::default().fg(Color::Cyan),
        ));
    }

    if !filter.blocked_tokens.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("blocked: {}", filter.blocked_tokens.iter().join(", ")),
            Style::default().fg(Color::Red),
        ));
    }

    let freshness = format_time_since(status.last_fetched);
    if !freshness.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("updated {freshness}"),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if status.loading {
        spans.push(Span::raw("  "));
        spans.push(Span::styled("● loading", Style::default().fg(Color::Yellow)));
    }

    let block = Block::default()
        .title(format!(" ARBHUB SPREADS [{}] ", app.board.acquirer().mode()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_spreads(f: &mut Frame, app: &App, status: &BoardStatus, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" SPREADS ")
        .border_style(Style::default().fg(Color::White));

    if let Some(placeholder) = status.phase.placeholder() {
        let message = Paragraph::new(placeholder)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(message, area);
        return;
    }

    let header_cells = [
        "Token",
        "Exchanges",
        "Buy Price",
        "Sell Price",
        "Spread",
        "Volume",
        "Funding",
        "Time",
    ]
    .iter()
    .map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let groups = app.board.groups();
    let selected_id = app.board.selected_id();
    let rows = app.board.rows(&groups).into_iter().map(|row| {
        let spread = row.spread();
        let token_cell = match row {
            DisplayRow::Best {
                group,
                expandable: true,
                expanded: false,
            } => format!("▸ {} (+{})", group.token, group.others.len()),
            DisplayRow::Best {
                group,
                expanded: true,
                ..
            } => format!("▾ {}", group.token),
            DisplayRow::Best { group, .. } => format!("  {}", group.token),
            DisplayRow::Sub { .. } => "    └".to_string(),
        };
        let token_style = match row {
            DisplayRow::Best { .. } => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            DisplayRow::Sub { .. } => Style::default().fg(Color::DarkGray),
        };
        let funding_color = if spread.funding >= 0.0 {
            Color::Green
        } else {
            Color::Red
        };

        let cells = vec![
            Cell::from(token_cell).style(token_style),
            Cell::from(format!("{} → {}", spread.buy_exchange, spread.sell_exchange)),
            Cell::from(format_price(spread.buy_price)),
            Cell::from(format_price(spread.sell_price)),
            Cell::from(format_spread_pct(spread.spread)).style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Cell::from(format_volume(spread.max_volume())),
            Cell::from(format_funding(spread.funding)).style(Style::default().fg(funding_color)),
            Cell::from(spread.time_active.clone()).style(Style::default().fg(Color::Gray)),
        ];

        let row = Row::new(cells).height(1);
        if selected_id == Some(spread.id.as_str()) {
            row.style(Style::default().bg(Color::DarkGray))
        } else {
            row
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(22),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Min(6),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default().with_selected(Some(app.cursor));
    f.render_stateful_widget(table, area, &mut state);
}

fn render_selection(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" SELECTED ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let line = match app.board.selected() {
        Some(spread) => Line::from(vec![
            Span::styled(
                spread.token.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  buy "),
            Span::styled(
                format!("{} @ {}", spread.buy_exchange, format_price(spread.buy_price)),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  sell "),
            Span::styled(
                format!("{} @ {}", spread.sell_exchange, format_price(spread.sell_price)),
                Style::default().fg(Color::Red),
            ),
            Span::raw("  "),
            Span::styled(
                format_spread_pct(spread.spread),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", spread.status),
                Style::default().fg(Color::Gray),
            ),
        ]),
        None if app.board.selected_id().is_some() => Line::from(Span::styled(
            "Selected spread is no longer in the feed",
            Style::default().fg(Color::DarkGray),
        )),
        None => Line::from(Span::styled(
            "Press s to select a spread",
            Style::default().fg(Color::DarkGray),
        )),
    };

    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    if let Some(input) = &app.input {
        f.render_widget(Paragraph::new(input_line(app, input)), area);
        return;
    }

    let mut spans = vec![
        Span::styled(
            format!(" poll: {} ", app.poll.state()),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            " q quit · r refresh · ↑/↓ move · enter expand · s select · a/c all/no exchanges · e exchange · b block · m spread · v volume ",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(
            format!(" {notice}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn input_line<'a>(app: &App, input: &'a FilterInput) -> Line<'a> {
    let filter = app.board.filter();
    let hint = match input.field {
        FilterField::BlockedToken => {
            let suggestions = filter.blocked_token_suggestions();
            if suggestions.is_empty() {
                format!("blocked: {}", filter.blocked_tokens.iter().join(", "))
            } else {
                format!("popular: {}", suggestions.iter().join(", "))
            }
        }
        FilterField::Exchange => {
            let available = app.board.status().available_exchanges;
            let hidden = available
                .iter()
                .filter(|name| !filter.exchanges.contains(*name))
                .join(", ");
            if hidden.is_empty() {
                "all exchanges selected".to_string()
            } else {
                format!("not selected: {hidden}")
            }
        }
        FilterField::MinSpread | FilterField::MinVolume => "blank or 0 disables".to_string(),
    };

    Line::from(vec![
        Span::styled(
            format!(" {}: ", input.field),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(input.buffer.as_str()),
        Span::styled("_", Style::default().fg(Color::Yellow)),
        Span::styled(
            format!("  {hint} · enter apply · esc cancel"),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}
