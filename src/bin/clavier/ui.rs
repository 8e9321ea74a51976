//! Status view: engine state, capture/replay transport, recording list.
//!
//! Deliberately not a keyboard picture - the instrument is the physical
//! keyboard in front of the player.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};

use super::app::App;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Engine / capture status
            Constraint::Length(3), // Playback transport
            Constraint::Min(4),    // Recording list
            Constraint::Length(1), // Help bar
        ])
        .split(frame.area());

    render_status(frame, chunks[0], app);
    render_transport(frame, chunks[1], app);
    render_recordings(frame, chunks[2], app);
    render_help(frame, chunks[3]);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title(" clavier ").borders(Borders::ALL);

    let engine = if app.handle.is_attached() {
        Span::styled("audio", Style::default().fg(Color::Green))
    } else {
        Span::styled("silent", Style::default().fg(Color::Yellow))
    };

    let capture = if app.recorder.is_capturing() {
        Span::styled(
            format!("● REC {:>3} notes  ", app.recorder.pending_events()),
            Style::default().fg(Color::Red),
        )
    } else {
        Span::raw("")
    };

    let held: Vec<String> = app.held.iter().map(|(_, id)| id.to_string()).collect();

    let line = Line::from(vec![
        engine,
        Span::raw("  "),
        Span::styled(
            format!("Vol {:>3.0}%  ", app.handle.volume() * 100.0),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!(
                "Ring {:.1}s+{:.1}s  ",
                app.handle.sustain_time(),
                app.handle.release_time()
            ),
            Style::default().fg(Color::Cyan),
        ),
        capture,
        Span::styled(held.join(" "), Style::default().fg(Color::White)),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title(" Playback ").borders(Borders::ALL);

    match &app.playback {
        Some(playback) => {
            let label = app
                .recordings
                .recordings()
                .iter()
                .find(|r| r.id == playback.recording_id())
                .map(|r| r.name.clone())
                .unwrap_or_else(|| String::from("?"));

            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(Color::Green))
                .ratio(f64::from(playback.progress()))
                .label(format!("▶ {label}"));
            frame.render_widget(gauge, area);
        }
        None => {
            let line = Line::from(Span::styled(
                app.status.as_str(),
                Style::default().fg(Color::DarkGray),
            ));
            frame.render_widget(Paragraph::new(line).block(block), area);
        }
    }
}

fn render_recordings(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(format!(" Recordings ({}) ", app.recordings.len()))
        .borders(Borders::ALL);

    if !app.recordings.has_recordings() {
        let hint = Paragraph::new(" No recordings yet. Ctrl-R starts a take.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let items: Vec<ListItem> = app
        .recordings
        .recordings()
        .iter()
        .enumerate()
        .map(|(i, recording)| {
            let marker = if i == app.selected { "▸ " } else { "  " };
            let text = format!(
                "{marker}{}  —  {} notes · {:.1}s",
                recording.name,
                recording.notes.len(),
                recording.duration as f32 / 1000.0
            );
            let style = if i == app.selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(text).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        " [Esc] Quit  [^R] Record  [^P] Play/Stop  [^E] Export  [^D] Delete  [↑↓] Select  [←→] Volume  [F5-F8] Ring",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
