//! Terminal glue: crossterm key translation and a character-grid frame sink.

use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::{
    cursor::MoveTo,
    event::{KeyCode, KeyModifiers},
    queue,
    terminal::{Clear, ClearType},
};

use handset_core::config::SnakeConfig;
use handset_core::engine::snake::{BODY_COLOR, FOOD_COLOR};
use handset_core::{DisplayFrame, FrameSink, Key};

/// What a terminal key press asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(Key),
    Save,
    Load,
    Quit,
}

/// Translate crossterm key events to game actions.
pub fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Action::Quit),
            _ => None,
        };
    }

    let key = match code {
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Enter => Key::Select,
        KeyCode::Esc | KeyCode::Backspace => Key::Back,
        KeyCode::F(5) => return Some(Action::Save),
        KeyCode::F(9) => return Some(Action::Load),
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Action::Quit),
        KeyCode::Char(c @ '0'..='9') => Key::Digit(c as u8 - b'0'),
        KeyCode::Char('*') => Key::Star,
        KeyCode::Char('#') => Key::Pound,
        _ => return None,
    };
    Some(Action::Key(key))
}

/// Draws frames as a grid of characters, one per cell.
pub struct TerminalSink {
    cols: usize,
    rows: usize,
    cell_size: i32,
    status: Mutex<String>,
}

impl TerminalSink {
    pub fn new(config: &SnakeConfig) -> Self {
        Self {
            cols: config.cols.max(0) as usize,
            rows: config.rows.max(0) as usize,
            cell_size: config.cell_size.max(1),
            status: Mutex::new(String::new()),
        }
    }

    /// Message shown under the grid on the next frame.
    pub fn set_status(&self, message: impl Into<String>) {
        if let Ok(mut status) = self.status.lock() {
            *status = message.into();
        }
    }

    /// Lay a frame out as text lines: border, grid, frame text.
    pub fn draw(&self, frame: &DisplayFrame) -> Vec<String> {
        let mut grid = vec![vec!['.'; self.cols]; self.rows];
        for rect in &frame.pixels {
            let (x, y) = (rect.x / self.cell_size, rect.y / self.cell_size);
            if x < 0 || y < 0 || x as usize >= self.cols || y as usize >= self.rows {
                continue;
            }
            let glyph = match rect.color.as_str() {
                BODY_COLOR => '#',
                FOOD_COLOR => '@',
                _ => '+',
            };
            grid[y as usize][x as usize] = glyph;
        }

        let border = format!("+{}+", "-".repeat(self.cols));
        let mut lines = Vec::with_capacity(self.rows + 3);
        lines.push(border.clone());
        lines.extend(grid.into_iter().map(|row| format!("|{}|", row.into_iter().collect::<String>())));
        lines.push(border);
        lines.push(frame.text.clone());
        lines
    }

    fn write_frame(&self, frame: &DisplayFrame) -> io::Result<()> {
        let status = self.status.lock().map(|s| s.clone()).unwrap_or_default();
        let mut out = io::stdout().lock();
        queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
        for line in self.draw(frame) {
            // Raw mode: no implicit carriage return
            write!(out, "{}\r\n", line)?;
        }
        write!(out, "{}\r\n", status)?;
        write!(out, "arrows/2468 move  Esc pause  Enter restart  F5 save  F9 load  q quit\r\n")?;
        out.flush()
    }
}

impl FrameSink for TerminalSink {
    fn present(&self, frame: &DisplayFrame) {
        let _ = self.write_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handset_core::PixelRect;

    fn rect(x: i32, y: i32, color: &str) -> PixelRect {
        PixelRect {
            x,
            y,
            width: 7,
            height: 7,
            color: color.to_string(),
        }
    }

    #[test]
    fn test_translate_keys() {
        let none = KeyModifiers::NONE;
        assert_eq!(translate_key(KeyCode::Up, none), Some(Action::Key(Key::Up)));
        assert_eq!(translate_key(KeyCode::Enter, none), Some(Action::Key(Key::Select)));
        assert_eq!(translate_key(KeyCode::Esc, none), Some(Action::Key(Key::Back)));
        assert_eq!(translate_key(KeyCode::Char('7'), none), Some(Action::Key(Key::Digit(7))));
        assert_eq!(translate_key(KeyCode::Char('#'), none), Some(Action::Key(Key::Pound)));
        assert_eq!(translate_key(KeyCode::F(5), none), Some(Action::Save));
        assert_eq!(translate_key(KeyCode::Char('q'), none), Some(Action::Quit));
        assert_eq!(translate_key(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Action::Quit));
        assert_eq!(translate_key(KeyCode::Tab, none), None);
    }

    #[test]
    fn test_draw_places_cells() {
        let config = SnakeConfig {
            cols: 4,
            rows: 2,
            ..SnakeConfig::default()
        };
        let sink = TerminalSink::new(&config);
        let frame = DisplayFrame {
            background_color: "#9DB892".into(),
            pixels: vec![rect(8, 0, BODY_COLOR), rect(24, 8, FOOD_COLOR), rect(800, 0, BODY_COLOR)],
            text: "Score: 0".into(),
            text_color: "#000000".into(),
            font: "bold 12px monospace".into(),
            text_x: 10,
            text_y: 15,
        };

        assert_eq!(
            sink.draw(&frame),
            vec!["+----+", "|.#..|", "|...@|", "+----+", "Score: 0"]
        );
    }
}
