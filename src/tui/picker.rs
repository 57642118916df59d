//! Modal directory browser used to choose a historical data file.

use crate::orchestrator::FilePicker;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Terminal,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Browser state, independent of the terminal.
#[derive(Debug)]
pub struct PickerState {
    pub dir: PathBuf,
    pub entries: Vec<Entry>,
    pub selected: usize,
    pub message: Option<String>,
}

fn read_entries(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for item in std::fs::read_dir(dir)? {
        let item = item?;
        let path = item.path();
        entries.push(Entry {
            name: item.file_name().to_string_lossy().into_owned(),
            is_dir: path.is_dir(),
            path,
        });
    }
    // Directories first, then by name.
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

impl PickerState {
    /// Open at the seed's directory (or the current directory), preselecting the seed file.
    pub fn open(seed: Option<&Path>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let seed = seed.map(|s| if s.is_absolute() { s.to_path_buf() } else { cwd.join(s) });
        let dir = match seed.as_deref() {
            Some(s) if s.is_dir() => s.to_path_buf(),
            Some(s) => s
                .parent()
                .filter(|p| p.is_dir())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone()),
            None => cwd.clone(),
        };
        let mut state = Self {
            dir,
            entries: Vec::new(),
            selected: 0,
            message: None,
        };
        state.reload();
        if let Some(seed) = seed {
            if let Some(i) = state.entries.iter().position(|e| e.path == seed) {
                state.selected = i;
            }
        }
        state
    }

    fn reload(&mut self) {
        match read_entries(&self.dir) {
            Ok(entries) => {
                self.entries = entries;
                self.message = None;
            }
            Err(e) => {
                self.entries.clear();
                self.message = Some(format!("Cannot read {}: {e}", self.dir.display()));
            }
        }
        self.selected = 0;
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    pub fn parent(&mut self) {
        let Some(parent) = self.dir.parent().map(Path::to_path_buf) else {
            return;
        };
        let came_from = std::mem::replace(&mut self.dir, parent);
        self.reload();
        if let Some(i) = self.entries.iter().position(|e| e.path == came_from) {
            self.selected = i;
        }
    }

    /// Enter the selected directory, or return the selected file.
    pub fn activate(&mut self) -> Option<PathBuf> {
        let entry = self.entries.get(self.selected)?.clone();
        if entry.is_dir {
            self.dir = entry.path;
            self.reload();
            None
        } else {
            Some(entry.path)
        }
    }
}

/// Runs the browser as a modal loop on the dialog's terminal.
pub struct TerminalPicker<'t, B: Backend> {
    terminal: &'t mut Terminal<B>,
}

impl<'t, B: Backend> TerminalPicker<'t, B> {
    pub fn new(terminal: &'t mut Terminal<B>) -> Self {
        Self { terminal }
    }

    fn draw(&mut self, state: &PickerState) {
        let mut list_state = ListState::default();
        if !state.entries.is_empty() {
            list_state.select(Some(state.selected));
        }
        self.terminal
            .draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
                    .split(f.area());

                let items: Vec<ListItem> = state
                    .entries
                    .iter()
                    .map(|e| {
                        if e.is_dir {
                            ListItem::new(format!("{}/", e.name))
                                .style(Style::default().fg(Color::Cyan))
                        } else {
                            ListItem::new(e.name.clone())
                        }
                    })
                    .collect();
                let list = List::new(items)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!("Select Historical Data File: {}", state.dir.display())),
                    )
                    .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
                f.render_stateful_widget(list, chunks[0], &mut list_state);

                let msg = state.message.clone().unwrap_or_default();
                f.render_widget(
                    Paragraph::new(msg).style(Style::default().fg(Color::Red)),
                    chunks[1],
                );
                f.render_widget(Paragraph::new(super::help::picker_keys()), chunks[2]);
            })
            .ok();
    }
}

impl<B: Backend> FilePicker for TerminalPicker<'_, B> {
    fn pick(&mut self, seed: Option<&Path>) -> Option<PathBuf> {
        let mut state = PickerState::open(seed);
        loop {
            self.draw(&state);
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let Ok(Event::Key(k)) = event::read() else {
                continue;
            };
            if k.kind != KeyEventKind::Press {
                continue;
            }
            match (k.modifiers, k.code) {
                (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => return None,
                (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.move_up(),
                (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.move_down(),
                (_, KeyCode::Backspace) | (_, KeyCode::Left) => state.parent(),
                (_, KeyCode::Enter) => {
                    if let Some(path) = state.activate() {
                        return Some(path);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("archive")).unwrap();
        std::fs::write(dir.path().join("archive").join("old.csv"), "").unwrap();
        std::fs::write(dir.path().join("a.csv"), "").unwrap();
        std::fs::write(dir.path().join("b.csv"), "").unwrap();
        dir
    }

    #[test]
    fn opens_at_seed_and_preselects_it() {
        let dir = tree();
        let seed = dir.path().join("b.csv");
        let state = PickerState::open(Some(&seed));
        assert_eq!(state.dir, dir.path());
        let names: Vec<_> = state.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "a.csv", "b.csv"]);
        assert_eq!(state.selected, 2);
    }

    #[test]
    fn enters_directories_and_returns_files() {
        let dir = tree();
        let mut state = PickerState::open(Some(dir.path()));
        assert_eq!(state.activate(), None);
        assert_eq!(state.dir, dir.path().join("archive"));

        assert_eq!(state.activate(), Some(dir.path().join("archive").join("old.csv")));
    }

    #[test]
    fn parent_reselects_previous_directory() {
        let dir = tree();
        let mut state = PickerState::open(Some(&dir.path().join("archive")));
        state.parent();
        assert_eq!(state.dir, dir.path());
        assert_eq!(state.entries[state.selected].name, "archive");
    }

    #[test]
    fn movement_stays_in_bounds() {
        let dir = tree();
        let mut state = PickerState::open(Some(dir.path()));
        state.move_up();
        assert_eq!(state.selected, 0);
        for _ in 0..10 {
            state.move_down();
        }
        assert_eq!(state.selected, 2);
    }

    #[test]
    fn missing_seed_directory_falls_back_to_cwd() {
        let state = PickerState::open(Some(Path::new("/no/such/dir/file.csv")));
        assert_eq!(state.dir, std::env::current_dir().unwrap());
    }
}
