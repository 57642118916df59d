mod help;
mod picker;
mod state;

use crate::cli::{build_config, open_preferences, Cli};
use crate::model::BacktestReport;
use crate::orchestrator::{self, BacktestDialog, DialogState, EngineLauncher};
use crate::preferences::FilePreferences;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use picker::TerminalPicker;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};
use state::DialogScreen;
use std::{io, time::Duration, time::Instant};

/// What the dialog left behind once it closed.
struct DialogOutcome {
    state: DialogState,
    report: Option<BacktestReport>,
    error: Option<String>,
}

pub async fn run(args: Cli) -> Result<DialogState> {
    let prefs = open_preferences(&args)?;
    let runtime = tokio::runtime::Handle::current();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, prefs, runtime));

    let outcome = match tokio::task::spawn_blocking(move || ui_handle.join())
        .await
        .context("join TUI thread")?
    {
        Ok(res) => res?,
        Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
    };

    if outcome.state == DialogState::Failed {
        if let Some(error) = outcome.error.as_deref() {
            eprintln!("Back test failed: {error}");
        }
    }
    if let Some(report) = outcome.report.as_ref() {
        let processed = orchestrator::process_run_completion(&args, report);
        for line in processed.summary {
            println!("{line}");
        }
        for msg in processed.export_messages {
            eprintln!("{msg}");
        }
    }
    Ok(outcome.state)
}

/// Run the dialog loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    prefs: FilePreferences,
    runtime: tokio::runtime::Handle,
) -> Result<DialogOutcome> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let launcher = EngineLauncher::new(build_config(&args), runtime);
    let mut dialog = BacktestDialog::new(DialogScreen::default(), prefs, launcher);
    if let Some(p) = args.data_file.as_deref() {
        dialog.set_field_text(&p.to_string_lossy());
    }

    let tick_rate = Duration::from(args.tick_rate);
    let mut last_draw: Option<Instant> = None;

    let res: Result<()> = loop {
        // Runner events are applied here, on the thread that owns the screen.
        let applied = dialog.dispatch_pending();
        if dialog.view().is_closed() {
            break Ok(());
        }

        let due = last_draw.map_or(true, |t| t.elapsed() >= tick_rate);
        if due || applied > 0 {
            terminal.draw(|f| draw(f.area(), f, dialog.view())).ok();
            last_draw = Some(Instant::now());
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(k)) = event::read() else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        match (k.modifiers, k.code) {
            (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => dialog.cancel(),
            (KeyModifiers::CONTROL, KeyCode::Char('o')) => {
                let mut picker = TerminalPicker::new(&mut terminal);
                dialog.choose_file(&mut picker);
                terminal.clear().ok();
                last_draw = None;
            }
            (_, KeyCode::Enter) => {
                if dialog.view().submit_enabled {
                    let file = dialog.field().to_string();
                    // Failures are shown on screen by the controller.
                    let _ = dialog.submit(&file);
                } else if default_is_cancel(dialog.view()) {
                    dialog.cancel();
                }
            }
            (_, KeyCode::Backspace) => {
                let mut text = dialog.field().to_string();
                text.pop();
                dialog.set_field_text(&text);
            }
            (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
                let mut text = dialog.field().to_string();
                text.push(c);
                dialog.set_field_text(&text);
            }
            _ => {}
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res?;

    let state = dialog.state();
    let report = dialog.take_report();
    let error = dialog.view().error.clone();
    Ok(DialogOutcome {
        state,
        report,
        error,
    })
}

/// While a run is active Cancel is the default button.
fn default_is_cancel(screen: &DialogScreen) -> bool {
    !screen.submit_enabled && screen.cancel_enabled
}

fn draw(area: Rect, f: &mut ratatui::Frame, screen: &DialogScreen) {
    let outer = Block::default().borders(Borders::ALL).title("Back Test");
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(inner);

    let field_style = if screen.submit_enabled {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let field = Paragraph::new(screen.field.as_str()).style(field_style).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Historical data file"),
    );
    f.render_widget(field, chunks[0]);

    if screen.progress_visible {
        f.render_widget(
            Paragraph::new(screen.progress_label.as_str()).style(Style::default().fg(Color::Gray)),
            chunks[1],
        );
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Green))
            .percent(u16::from(screen.percent))
            .label(screen.progress_text.as_str());
        f.render_widget(gauge, chunks[2]);
    }

    if let Some(error) = screen.error.as_deref() {
        f.render_widget(
            Paragraph::new(error).style(Style::default().fg(Color::Red)),
            chunks[3],
        );
    }

    f.render_widget(Paragraph::new(buttons(screen)), chunks[4]);
    f.render_widget(Paragraph::new(help::dialog_keys(!screen.submit_enabled)), chunks[5]);
}

fn button(label: &'static str, enabled: bool) -> Span<'static> {
    if enabled {
        Span::styled(
            label,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(label, Style::default().fg(Color::DarkGray))
    }
}

fn buttons(screen: &DialogScreen) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        button("[ Back Test ]", screen.submit_enabled),
        Span::raw("  "),
        button("[ Cancel ]", screen.cancel_enabled),
    ])
}
