use std::{io, time::Duration};

use chrono::Local;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Borders, Cell, Paragraph, Row, Table,
    },
    Frame, Terminal,
};
use tokio::time::interval;

use crate::app::DashboardController;
use crate::constants::{RELEASE_TIME_STEP_MINS, UI_TICK_RATE_MS};
use crate::remote::Location;
use crate::util::{format_clock, format_release_time, format_seconds};

pub async fn run(
    controller: DashboardController,
    sites: Vec<String>,
    location: Option<Location>,
) -> anyhow::Result<()> {
    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_loop(&mut terminal, controller, sites, location).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_app_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut controller: DashboardController,
    sites: Vec<String>,
    location: Option<Location>,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut redraw = interval(Duration::from_millis(UI_TICK_RATE_MS));
    let mut cursor: usize = 0;

    loop {
        terminal.draw(|f| draw(f, &controller, &sites, location.as_ref(), cursor))?;

        tokio::select! {
            _ = redraw.tick() => {}
            event = events.next() => {
                match event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => {
                                controller.shutdown();
                                return Ok(());
                            }
                            KeyCode::Up => cursor = cursor.saturating_sub(1),
                            KeyCode::Down => {
                                if cursor + 1 < sites.len() {
                                    cursor += 1;
                                }
                            }
                            KeyCode::Enter => {
                                if let Some(site) = sites.get(cursor) {
                                    controller.select_target(site);
                                }
                            }
                            KeyCode::Char('+') | KeyCode::Char('=') => {
                                controller.adjust_release_time(RELEASE_TIME_STEP_MINS);
                            }
                            KeyCode::Char('-') => {
                                controller.adjust_release_time(-RELEASE_TIME_STEP_MINS);
                            }
                            KeyCode::Char('o') => controller.request_optimal_time(),
                            KeyCode::Char('s') => controller.stop_requests(),
                            _ => {}
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => {
                        controller.shutdown();
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn draw(
    f: &mut Frame,
    controller: &DashboardController,
    sites: &[String],
    location: Option<&Location>,
    cursor: usize,
) {
    // ============= whole screen layout ============
    let outer_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(24), Constraint::Percentage(76)].as_ref())
        .split(f.size());

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),    // Latency chart
            Constraint::Length(9),  // Entry time panel
            Constraint::Length(1),  // Bottom key bar
        ].as_ref())
        .split(outer_chunks[1]);

    // ============= Sidebar: registered sites ============
    let selected = controller.selected_target();
    let header = Row::new([Cell::from("Sites").style(
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )])
    .height(1)
    .bottom_margin(1);

    let rows = sites.iter().enumerate().map(|(i, site)| {
        let marker = if Some(site.as_str()) == selected.as_deref() { "● " } else { "  " };
        let style = if i == cursor {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else if Some(site.as_str()) == selected.as_deref() {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        Row::new([Cell::from(format!("{marker}{site}")).style(style)]).height(1)
    });

    let site_table = Table::new(rows, [Constraint::Percentage(100)])
        .header(header)
        .block(
            Block::default()
                .title(" Monitoring ")
                .borders(Borders::ALL)
                .border_type(ratatui::widgets::BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    f.render_widget(site_table, outer_chunks[0]);

    // ============= Latency chart ============
    let chart_title = match &selected {
        Some(site) => format!(" Response Time (s) [{site}] "),
        None => " Response Time (s) [select a site] ".to_string(),
    };
    let chart_block = Block::default()
        .borders(Borders::ALL)
        .title(chart_title)
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(Color::White));
    f.render_widget(chart_block.clone(), main_chunks[0]);

    let inner_area = chart_block.inner(main_chunks[0]);
    let graph_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(78), Constraint::Percentage(22)].as_ref())
        .split(inner_area);

    let snapshot = controller.series().snapshot();
    let x_limit = controller.series().capacity() as f64;
    let y_limit = snapshot.iter().map(|p| p.seconds).fold(2.0, f64::max);

    let latency_canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([0.0, x_limit])
        .y_bounds([0.0, y_limit])
        .paint(|ctx| {
            for (i, point) in snapshot.iter().enumerate() {
                ctx.draw(&CanvasLine {
                    x1: i as f64,
                    y1: 0.0,
                    x2: i as f64,
                    y2: point.seconds,
                    color: Color::Cyan,
                });
            }
        });
    f.render_widget(latency_canvas, graph_chunks[0]);

    // textual stats on the right
    let last = snapshot.last();
    let peak = snapshot.iter().map(|p| p.seconds).fold(0.0, f64::max);
    let stats_text = vec![
        Line::from(vec![
            Span::styled("Last: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                last.map_or("-".to_string(), |p| format_seconds(p.seconds)),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("  at: ", Style::default().fg(Color::DarkGray)),
            Span::raw(last.map_or("-".to_string(), |p| p.label.clone())),
        ]),
        Line::from(vec![
            Span::styled("Peak: ", Style::default().fg(Color::DarkGray)),
            Span::raw(if snapshot.is_empty() {
                "-".to_string()
            } else {
                format_seconds(peak)
            }),
        ]),
        Line::from(vec![
            Span::styled("Pts:  ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{}/{}", snapshot.len(), controller.series().capacity())),
        ]),
    ];
    f.render_widget(Paragraph::new(stats_text), graph_chunks[1]);

    // ============= Entry time panel ============
    let (country, timezone) = match location {
        Some(location) => (location.country.as_str(), location.timezone.as_str()),
        None => ("Unknown Country", "-"),
    };

    let auto_line = if controller.auto_active() {
        Span::styled("auto-request active", Style::default().fg(Color::Green))
    } else {
        Span::styled("auto-request stopped", Style::default().fg(Color::DarkGray))
    };
    let status_message = controller.status().message();
    let mut panel_lines = vec![
        Line::from(vec![
            Span::styled("Location:     ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{country} ({timezone})")),
        ]),
        Line::from(vec![
            Span::styled("Current time: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format_clock(Local::now())),
        ]),
        Line::from(vec![
            Span::styled("Release time: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format_release_time(controller.release_time())),
        ]),
        Line::from(auto_line),
    ];
    if controller.status().is_loading() {
        panel_lines.push(Line::from(Span::styled(
            "Fetching optimal entry time...",
            Style::default().fg(Color::Magenta),
        )));
    }
    if !status_message.is_empty() {
        panel_lines.push(Line::from(Span::styled(
            status_message,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
    }

    let panel = Paragraph::new(panel_lines).block(
        Block::default()
            .title(" Best Entry Time ")
            .borders(Borders::ALL)
            .border_type(ratatui::widgets::BorderType::Rounded),
    );
    f.render_widget(panel, main_chunks[1]);

    // ============ Bottom key bar ============
    let request_hint = if controller.auto_active() {
        Span::styled("[o] request (auto)", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw("[o] request")
    };
    let key_bar = Line::from(vec![
        Span::styled(" SITE MONITOR ", Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD)),
        Span::raw(" [↑/↓] browse | [Enter] monitor | [+/-] release time | "),
        request_hint,
        Span::raw(" | [s] stop | [q] quit"),
    ]);
    let key_bar = Paragraph::new(key_bar).style(Style::default().bg(Color::Rgb(20, 20, 20)));
    f.render_widget(key_bar, main_chunks[2]);
}
