//! Interactive TUI (Terminal User Interface) for reviewing results.
//!
//! Provides a review screen with:
//! - Live progress while the scan runs
//! - The grouped report, with keyboard navigation between results
//! - Refresh (rescan with the same request) and jump-to-location

use crate::app::App;
use crate::ScanArgs;
use crossbeam_channel::Receiver;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::*};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tagscan_core::{
    organize, scan, Config, Cursor, LoggingProgress, Move, Report, ScanHandle, ScanOutcome,
    ScanRequest,
};
use tracing::warn;

/// A scan in flight and the channel its outcome arrives on.
struct RunningScan {
    handle: ScanHandle,
    outcome: Receiver<ScanOutcome>,
}

/// TUI application state.
struct TuiApp {
    /// The main application
    app: App,

    /// Request replayed on refresh
    request: ScanRequest,

    /// Scan currently running, if any
    running: Option<RunningScan>,

    /// Last rendered report
    report: Report,

    /// Line index of each result in the report
    result_lines: Vec<usize>,

    /// Selection over results
    cursor: Cursor,

    /// Vertical scroll offset, in report lines
    scroll_offset: usize,

    /// Whether we should quit
    should_quit: bool,

    /// Location chosen with Enter, printed after the terminal is restored
    chosen: Option<String>,

    /// Status message
    status_message: Option<String>,
}

impl TuiApp {
    fn new(app: App, request: ScanRequest) -> Self {
        let cursor = Cursor::new(0, &app.config.navigation);
        TuiApp {
            app,
            request,
            running: None,
            report: Report::default(),
            result_lines: Vec::new(),
            cursor,
            scroll_offset: 0,
            should_quit: false,
            chosen: None,
            status_message: None,
        }
    }

    /// Start a scan with the stored request. A scan already running is
    /// superseded and its outcome ignored.
    fn start_scan(&mut self) -> anyhow::Result<()> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let handle = scan::spawn(
            self.request.clone(),
            Some(Arc::new(LoggingProgress)),
            move |outcome| {
                let _ = done_tx.send(outcome);
            },
        )?;

        self.running = Some(RunningScan {
            handle,
            outcome: done_rx,
        });
        self.status_message = None;
        Ok(())
    }

    /// Pick up a finished scan, if there is one.
    fn poll_scan(&mut self) {
        let Some(running) = &self.running else {
            return;
        };
        let Ok(outcome) = running.outcome.try_recv() else {
            return;
        };

        if let Some(running) = self.running.take() {
            if let Err(e) = running.handle.join() {
                warn!(error = %e, "Scan worker did not shut down cleanly");
            }
        }

        let metrics = outcome.metrics;
        let groups = organize(outcome.findings, &self.app.config.weights);
        self.report = self.app.renderer().render(&groups, &metrics);
        self.result_lines = self.report.result_lines();
        self.cursor.reset(self.result_lines.len());
        self.scroll_offset = 0;
    }

    /// Rescan with the same request.
    fn refresh(&mut self) {
        if let Err(e) = self.start_scan() {
            self.status_message = Some(format!("Refresh failed: {}", e));
        }
    }

    /// Move the selection.
    fn step(&mut self, movement: Move) {
        self.cursor.step(movement);
    }

    /// Report line of the selected result.
    fn selected_line(&self) -> Option<usize> {
        self.cursor
            .selected()
            .and_then(|idx| self.result_lines.get(idx).copied())
    }

    /// Remember the selected location and quit.
    fn open_selected(&mut self) {
        if let Some(finding) = self.selected_line().and_then(|l| self.report.finding_at(l)) {
            self.chosen = Some(finding.location());
            self.should_quit = true;
        }
    }

    /// Keep the selected line inside a window of `visible_height` lines.
    fn ensure_visible(&mut self, visible_height: usize) {
        let Some(line) = self.selected_line() else {
            return;
        };
        if line < self.scroll_offset {
            self.scroll_offset = line;
        } else if visible_height > 0 && line >= self.scroll_offset + visible_height {
            self.scroll_offset = line + 1 - visible_height;
        }
    }
}

/// Run the TUI application.
pub fn run(config: Config, args: ScanArgs) -> anyhow::Result<()> {
    let app = App::new(config, &args)?;
    let request = app.request(&args);

    let mut tui_app = TuiApp::new(app, request);

    // Start scanning before taking over the terminal so configuration errors
    // are printed normally
    tui_app.start_scan()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_loop(&mut terminal, &mut tui_app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(location) = &tui_app.chosen {
        println!("{}", location);
    }

    result
}

/// Main event loop.
fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut TuiApp) -> anyhow::Result<()> {
    loop {
        app.poll_scan();
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc | KeyCode::Char('q') => {
                            app.should_quit = true;
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            app.should_quit = true;
                        }
                        KeyCode::Char('r') => {
                            app.refresh();
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.step(Move::Up);
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.step(Move::Down);
                        }
                        KeyCode::PageUp => {
                            app.step(Move::UpSkip);
                        }
                        KeyCode::PageDown => {
                            app.step(Move::DownSkip);
                        }
                        KeyCode::Enter => {
                            app.open_selected();
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

mod ui {
    use super::*;

    /// Draw the UI.
    pub fn draw(f: &mut Frame, app: &mut TuiApp) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Min(10),   // Report
                Constraint::Length(2), // Status bar
            ])
            .split(f.area());

        draw_report(f, app, chunks[0]);
        draw_status_bar(f, app, chunks[1]);
    }

    /// Draw the report lines, highlighting the selected result.
    fn draw_report(f: &mut Frame, app: &mut TuiApp, area: Rect) {
        let visible_height = area.height.saturating_sub(2) as usize;
        app.ensure_visible(visible_height);
        let selected = app.selected_line();

        let items: Vec<ListItem> = app
            .report
            .lines()
            .iter()
            .enumerate()
            .skip(app.scroll_offset)
            .take(visible_height)
            .map(|(idx, line)| {
                let style = if Some(idx) == selected {
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else if line.starts_with("## ") {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else if line.starts_with("// ") {
                    Style::default().fg(Color::Gray)
                } else {
                    Style::default()
                };

                ListItem::new(line.as_str()).style(style)
            })
            .collect();

        let title = format!(" Results ({}) ", app.report.len());
        let report = List::new(items).block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(report, area);
    }

    /// Draw the status bar.
    fn draw_status_bar(f: &mut Frame, app: &TuiApp, area: Rect) {
        let status = if let Some(ref msg) = app.status_message {
            msg.clone()
        } else if let Some(running) = &app.running {
            format!("Scanning... {} files", running.handle.scanned())
        } else {
            "↑↓:Navigate PgUp/PgDn:Skip Enter:Open r:Refresh Esc:Quit".to_string()
        };

        let status_bar = Paragraph::new(status).style(Style::default().fg(Color::Gray));

        f.render_widget(status_bar, area);
    }
}
