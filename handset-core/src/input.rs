//! Abstract handset keys and their runtime names.

use std::fmt;
use std::str::FromStr;

/// A key on the simulated handset keypad.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    /// Numeric keypad, 0-9.
    Digit(u8),
    Star,
    Pound,
    /// Any code without an abstract meaning; passed through untouched.
    Other(String),
}

impl Key {
    /// Symbolic key name expected by the bytecode runtime.
    ///
    /// Mapped keys translate 1:1; `Other` codes pass through unchanged.
    pub fn runtime_name(&self) -> String {
        match self {
            Key::Up => "UP".to_string(),
            Key::Down => "DOWN".to_string(),
            Key::Left => "LEFT".to_string(),
            Key::Right => "RIGHT".to_string(),
            Key::Select => "FIRE".to_string(),
            Key::Back => "SOFT2".to_string(),
            Key::Digit(d) => format!("NUM{}", d),
            Key::Star => "STAR".to_string(),
            Key::Pound => "POUND".to_string(),
            Key::Other(code) => code.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Up => write!(f, "UP"),
            Key::Down => write!(f, "DOWN"),
            Key::Left => write!(f, "LEFT"),
            Key::Right => write!(f, "RIGHT"),
            Key::Select => write!(f, "SELECT"),
            Key::Back => write!(f, "BACK"),
            Key::Digit(d) => write!(f, "{}", d),
            Key::Star => write!(f, "*"),
            Key::Pound => write!(f, "#"),
            Key::Other(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    /// Parse a keypad code. Unknown codes become `Key::Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "UP" => Key::Up,
            "DOWN" => Key::Down,
            "LEFT" => Key::Left,
            "RIGHT" => Key::Right,
            "SELECT" => Key::Select,
            "BACK" => Key::Back,
            "*" => Key::Star,
            "#" => Key::Pound,
            _ => match s.as_bytes() {
                [d @ b'0'..=b'9'] => Key::Digit(*d - b'0'),
                _ => Key::Other(s.to_string()),
            },
        };
        Ok(key)
    }
}
