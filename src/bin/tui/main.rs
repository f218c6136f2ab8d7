mod app;

use std::io;
use std::time::Duration;

use app::{
    format_latency, format_published, format_sentiment, format_time_ns, signal_label, truncate,
    AppState, ConnectionStatus,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use market_news::types::Signal;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);
    let mut asset_table_state = TableState::default();

    // Initial fetch before rendering
    app.refresh(&client, None).await;
    if !app.assets.is_empty() {
        asset_table_state.select(Some(0));
    }

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client, &mut asset_table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    asset_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(5);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, asset_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client, asset_state.selected()).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.assets.len().saturating_sub(1);
                            let next = asset_state.selected().map_or(0, |i| (i + 1).min(max));
                            select_asset(app, client, asset_state, next).await;
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = asset_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            select_asset(app, client, asset_state, prev).await;
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client, asset_state.selected()).await;
            last_tick = std::time::Instant::now();
        }
    }
}

async fn select_asset(
    app: &mut AppState,
    client: &reqwest::Client,
    asset_state: &mut TableState,
    index: usize,
) {
    if asset_state.selected() == Some(index) {
        return;
    }
    asset_state.select(Some(index));
    if let Some(asset) = app.selected_asset(Some(index)).cloned() {
        app.fetch_detail(client, &asset).await;
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, asset_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, asset_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let batch_text = if app.health.running {
        "batch running".to_string()
    } else {
        app.health
            .last_finished_at_ns
            .map_or("no batch yet".to_string(), |ns| {
                format!("last batch {} UTC", format_time_ns(ns as i64))
            })
    };
    let batch_color = if app.health.last_error.is_some() {
        Color::Red
    } else {
        Color::White
    };

    let mut spans = vec![
        Span::styled(
            " Market Newsdesk  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(batch_text, Style::default().fg(batch_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} assets", app.assets.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "sentiment p50/p99 {}/{}",
                format_latency(app.latency.p50_ms),
                format_latency(app.latency.p99_ms)
            ),
            Style::default().fg(Color::White),
        ),
    ];
    if let Some(s) = &app.health.last_summary {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(
            format!(
                "+{} articles, {} scored, {} failed",
                s.articles_added,
                s.score.ok,
                s.ingest.failed + s.score.failed
            ),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, asset_state: &mut TableState, area: Rect) {
    // Horizontal split: assets (30%) | detail (70%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    render_assets_table(f, app, asset_state, halves[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),      // latest metric
            Constraint::Length(7),      // brief
            Constraint::Min(0),         // news
        ])
        .split(halves[1]);

    render_metric_panel(f, app, right[0]);
    render_brief(f, app, right[1]);
    render_news_table(f, app, right[2]);
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn header_row(labels: &[&'static str]) -> Row<'static> {
    let cells = labels
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    Row::new(cells).height(1)
}

fn render_assets_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let rows: Vec<Row> = app
        .assets
        .iter()
        .map(|a| {
            Row::new(vec![
                Cell::from(a.ticker.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate(&a.name, 24)),
            ])
        })
        .collect();

    let table = Table::new(rows, [Constraint::Length(8), Constraint::Min(10)])
        .header(header_row(&["Ticker", "Name"]))
        .block(panel(" ASSETS "))
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(table, area, state);
}

fn signal_color(signal: Signal) -> Color {
    match signal {
        Signal::PositiveMomentum => Color::Green,
        Signal::Caution => Color::Red,
        Signal::HighUncertainty => Color::Yellow,
        Signal::LowCoverage => Color::DarkGray,
        Signal::Neutral => Color::White,
    }
}

fn sentiment_color(v: f64) -> Color {
    if v > 0.0 {
        Color::Green
    } else if v < 0.0 {
        Color::Red
    } else {
        Color::White
    }
}

fn render_metric_panel(f: &mut Frame, app: &AppState, area: Rect) {
    let lines = match app.detail.latest() {
        Some(m) => {
            let trend: Vec<Span> = app
                .detail
                .metrics
                .iter()
                .rev()
                .map(|d| {
                    Span::styled(
                        format!("{} ", format_sentiment(d.avg_sentiment)),
                        Style::default().fg(sentiment_color(d.avg_sentiment)),
                    )
                })
                .collect();
            vec![
                Line::from(vec![
                    Span::styled(format!("{}  ", m.metric_date), Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        signal_label(m.signal),
                        Style::default().fg(signal_color(m.signal)).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(vec![
                    Span::raw("avg "),
                    Span::styled(
                        format_sentiment(m.avg_sentiment),
                        Style::default().fg(sentiment_color(m.avg_sentiment)),
                    ),
                    Span::raw(format!("   std {:.2}   volume {}", m.sentiment_std, m.news_volume)),
                ]),
                Line::from(
                    std::iter::once(Span::styled("trend ", Style::default().fg(Color::DarkGray)))
                        .chain(trend)
                        .collect::<Vec<_>>(),
                ),
            ]
        }
        None => vec![Line::from(Span::styled(
            "no metrics yet",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    f.render_widget(Paragraph::new(lines).block(panel(" LATEST METRIC ")), area);
}

fn render_brief(f: &mut Frame, app: &AppState, area: Rect) {
    let (title, text) = match &app.detail.brief {
        Some(b) => (
            format!(
                " BRIEF {} → {} ({}, {}) ",
                b.period_start,
                b.period_end,
                b.model_name,
                format_time_ns(b.generated_at)
            ),
            Line::from(b.content.clone()),
        ),
        None => (
            " BRIEF ".to_string(),
            Line::from(Span::styled("no brief yet", Style::default().fg(Color::DarkGray))),
        ),
    };

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(panel(&title));
    f.render_widget(paragraph, area);
}

fn render_news_table(f: &mut Frame, app: &AppState, area: Rect) {
    let rows: Vec<Row> = app
        .detail
        .news
        .iter()
        .map(|n| {
            Row::new(vec![
                Cell::from(format_published(&n.published_at)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&n.title, 80)),
            ])
        })
        .collect();

    let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(10)])
        .header(header_row(&["Published", "Title"]))
        .block(panel(" RECENT NEWS "));

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select asset  "),
        Span::styled("auto-refresh: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
