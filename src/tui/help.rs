use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

fn key(k: &'static str) -> Span<'static> {
    Span::styled(k, Style::default().fg(Color::Magenta))
}

/// One-line keybind hint for the dialog.
pub fn dialog_keys(running: bool) -> Line<'static> {
    if running {
        return Line::from(vec![
            key("Enter"),
            Span::raw(" / "),
            key("Esc"),
            Span::raw(" / "),
            key("Ctrl-C"),
            Span::raw(" Cancel"),
        ]);
    }
    Line::from(vec![
        key("Enter"),
        Span::raw(" Back test   "),
        key("Ctrl-O"),
        Span::raw(" Browse   "),
        key("Esc"),
        Span::raw(" Close"),
    ])
}

/// One-line keybind hint for the file picker.
pub fn picker_keys() -> Line<'static> {
    Line::from(vec![
        key("↑/↓"),
        Span::raw(" Move   "),
        key("Enter"),
        Span::raw(" Open/Select   "),
        key("Backspace"),
        Span::raw(" Parent   "),
        key("Esc"),
        Span::raw(" Dismiss"),
    ])
}
