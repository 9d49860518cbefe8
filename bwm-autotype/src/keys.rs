//! Named keys and the fixed per-backend key tables.
//!
//! | Token(s)                      | xdotool / wtype | ydotool    | uinput code        |
//! |-------------------------------|-----------------|------------|--------------------|
//! | `{TAB}`                       | `Tab`           | `TAB`      | `KEY_TAB` (15)     |
//! | `{ENTER}` `~`                 | `Return`        | `ENTER`    | `KEY_ENTER` (28)   |
//! | `{PGUP}` `{PGDN}`             | `Page_Up/Down`  | `PAGEUP/…` | 104 / 109          |
//! | `{F1}`…`{F16}`                | `F1`…`F16`      | `F1`…`F16` | 59…68, 87, 88, 183…186 |
//! | `{ADD}` `{NUMPAD0}`…          | `KP_Add`, `KP_0`| `KPPLUS`, `KP0` | 78, 82…      |
//! | `+` `^` `%` `@`               | shift/ctrl/alt/super | LEFTSHIFT/LEFTCTRL/LEFTALT/– | 42/29/56/125 |

use std::fmt;

/// Canonical key a special token can name, independent of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Tab,
    Enter,
    Up,
    Down,
    Left,
    Right,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Space,
    Backspace,
    Break,
    CapsLock,
    Escape,
    Win,
    LeftWin,
    RightWin,
    Apps,
    Help,
    NumLock,
    PrintScreen,
    ScrollLock,
    /// Function key 1..=16.
    F(u8),
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Keypad digit 0..=9.
    Numpad(u8),
    Shift,
    Ctrl,
    Alt,
    Super,
}

impl NamedKey {
    /// Parse the raw text of a special token (`{TAB}`, `~`, `+`, …).
    pub fn parse(raw: &str) -> Option<NamedKey> {
        let key = match raw {
            "~" => NamedKey::Enter,
            "+" => NamedKey::Shift,
            "^" => NamedKey::Ctrl,
            "%" => NamedKey::Alt,
            "@" => NamedKey::Super,
            _ => {
                let name = raw.strip_prefix('{')?.strip_suffix('}')?;
                return Self::from_name(name);
            }
        };
        Some(key)
    }

    fn from_name(name: &str) -> Option<NamedKey> {
        let key = match name {
            "TAB" => NamedKey::Tab,
            "ENTER" => NamedKey::Enter,
            "UP" => NamedKey::Up,
            "DOWN" => NamedKey::Down,
            "LEFT" => NamedKey::Left,
            "RIGHT" => NamedKey::Right,
            "INSERT" | "INS" => NamedKey::Insert,
            "DELETE" | "DEL" => NamedKey::Delete,
            "HOME" => NamedKey::Home,
            "END" => NamedKey::End,
            "PGUP" => NamedKey::PageUp,
            "PGDN" => NamedKey::PageDown,
            "SPACE" => NamedKey::Space,
            "BACKSPACE" | "BS" | "BKSP" => NamedKey::Backspace,
            "BREAK" => NamedKey::Break,
            "CAPSLOCK" => NamedKey::CapsLock,
            "ESC" => NamedKey::Escape,
            "WIN" => NamedKey::Win,
            "LWIN" => NamedKey::LeftWin,
            "RWIN" => NamedKey::RightWin,
            "APPS" => NamedKey::Apps,
            "HELP" => NamedKey::Help,
            "NUMLOCK" => NamedKey::NumLock,
            "PRTSC" => NamedKey::PrintScreen,
            "SCROLLLOCK" => NamedKey::ScrollLock,
            "ADD" => NamedKey::Add,
            "SUBTRACT" => NamedKey::Subtract,
            "MULTIPLY" => NamedKey::Multiply,
            "DIVIDE" => NamedKey::Divide,
            other => {
                if let Some(n) = other.strip_prefix('F') {
                    return digits(n).filter(|n| (1..=16).contains(n)).map(NamedKey::F);
                }
                if let Some(n) = other.strip_prefix("NUMPAD") {
                    return digits(n).filter(|n| *n <= 9).map(NamedKey::Numpad);
                }
                return None;
            }
        };
        Some(key)
    }

    pub fn is_enter(self) -> bool {
        self == NamedKey::Enter
    }
}

fn digits(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for NamedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedKey::F(n) => write!(f, "F{n}"),
            NamedKey::Numpad(n) => write!(f, "NUMPAD{n}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// How one backend physically produces a named key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKey {
    /// Key name or keysym passed to the backend's key command.
    Key(&'static str),
    /// Typed as text rather than tapped.
    Text(&'static str),
    /// Modifier pressed and released on its own.
    Modifier(&'static str),
    /// Linux input event code.
    Code(u16),
}

/// Fixed mapping from [`NamedKey`] to one backend's representation.
pub struct KeyTable {
    pub backend: &'static str,
    lookup: fn(NamedKey) -> Option<NativeKey>,
}

impl KeyTable {
    pub fn get(&self, key: NamedKey) -> Option<NativeKey> {
        (self.lookup)(key)
    }
}

impl fmt::Debug for KeyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTable").field("backend", &self.backend).finish()
    }
}

pub static XDOTOOL_KEYS: KeyTable = KeyTable {
    backend: "xdotool",
    lookup: xdotool,
};

pub static YDOTOOL_KEYS: KeyTable = KeyTable {
    backend: "ydotool",
    lookup: ydotool,
};

pub static WTYPE_KEYS: KeyTable = KeyTable {
    backend: "wtype",
    lookup: wtype,
};

pub static UINPUT_KEYS: KeyTable = KeyTable {
    backend: "uinput",
    lookup: uinput,
};

const FUNCTION_KEYSYMS: [&str; 16] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "F13", "F14",
    "F15", "F16",
];
const KP_KEYSYMS: [&str; 10] = [
    "KP_0", "KP_1", "KP_2", "KP_3", "KP_4", "KP_5", "KP_6", "KP_7", "KP_8", "KP_9",
];
const KP_YDOTOOL: [&str; 10] = [
    "KP0", "KP1", "KP2", "KP3", "KP4", "KP5", "KP6", "KP7", "KP8", "KP9",
];
const FUNCTION_CODES: [u16; 16] = [
    59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 87, 88, 183, 184, 185, 186,
];
const KP_CODES: [u16; 10] = [82, 79, 80, 81, 75, 76, 77, 71, 72, 73];

fn function_index(n: u8) -> Option<usize> {
    (1..=16).contains(&n).then(|| usize::from(n - 1))
}

/// X keysym shared by xdotool and wtype.
fn keysym(key: NamedKey) -> Option<&'static str> {
    let name = match key {
        NamedKey::Tab => "Tab",
        NamedKey::Enter => "Return",
        NamedKey::Up => "Up",
        NamedKey::Down => "Down",
        NamedKey::Left => "Left",
        NamedKey::Right => "Right",
        NamedKey::Insert => "Insert",
        NamedKey::Delete => "Delete",
        NamedKey::Home => "Home",
        NamedKey::End => "End",
        NamedKey::PageUp => "Page_Up",
        NamedKey::PageDown => "Page_Down",
        NamedKey::Backspace => "BackSpace",
        NamedKey::Break => "Break",
        NamedKey::CapsLock => "Caps_Lock",
        NamedKey::Escape => "Escape",
        NamedKey::Win => "Super",
        NamedKey::LeftWin => "Super_L",
        NamedKey::RightWin => "Super_R",
        NamedKey::Apps => "Menu",
        NamedKey::Help => "Help",
        NamedKey::NumLock => "Num_Lock",
        NamedKey::PrintScreen => "Print",
        NamedKey::ScrollLock => "Scroll_Lock",
        NamedKey::F(n) => FUNCTION_KEYSYMS[function_index(n)?],
        NamedKey::Add => "KP_Add",
        NamedKey::Subtract => "KP_Subtract",
        NamedKey::Multiply => "KP_Multiply",
        NamedKey::Divide => "KP_Divide",
        NamedKey::Numpad(n) => *KP_KEYSYMS.get(usize::from(n))?,
        NamedKey::Shift => "shift",
        NamedKey::Ctrl => "ctrl",
        NamedKey::Alt => "alt",
        NamedKey::Super => "super",
        NamedKey::Space => return None,
    };
    Some(name)
}

fn xdotool(key: NamedKey) -> Option<NativeKey> {
    match key {
        NamedKey::Space => Some(NativeKey::Text(" ")),
        NamedKey::Apps | NamedKey::Help | NamedKey::PrintScreen => None,
        other => keysym(other).map(NativeKey::Key),
    }
}

fn wtype(key: NamedKey) -> Option<NativeKey> {
    match key {
        NamedKey::Space => Some(NativeKey::Text(" ")),
        NamedKey::Shift => Some(NativeKey::Modifier("shift")),
        NamedKey::Ctrl => Some(NativeKey::Modifier("ctrl")),
        NamedKey::Alt => Some(NativeKey::Modifier("alt")),
        NamedKey::Super => Some(NativeKey::Modifier("logo")),
        other => keysym(other).map(NativeKey::Key),
    }
}

fn ydotool(key: NamedKey) -> Option<NativeKey> {
    let name = match key {
        NamedKey::Tab => "TAB",
        NamedKey::Enter => "ENTER",
        NamedKey::Up => "UP",
        NamedKey::Down => "DOWN",
        NamedKey::Left => "LEFT",
        NamedKey::Right => "RIGHT",
        NamedKey::Insert => "INSERT",
        NamedKey::Delete => "DELETE",
        NamedKey::Home => "HOME",
        NamedKey::End => "END",
        NamedKey::PageUp => "PAGEUP",
        NamedKey::PageDown => "PAGEDOWN",
        NamedKey::Space => return Some(NativeKey::Text(" ")),
        NamedKey::Backspace => "BACKSPACE",
        NamedKey::Break => "BREAK",
        NamedKey::CapsLock => "CAPSLOCK",
        NamedKey::Escape => "ESC",
        NamedKey::NumLock => "NUMLOCK",
        NamedKey::ScrollLock => "SCROLLLOCK",
        NamedKey::F(n) => FUNCTION_KEYSYMS[function_index(n)?],
        NamedKey::Add => "KPPLUS",
        NamedKey::Subtract => "KPMINUS",
        NamedKey::Multiply => "KPASTERISK",
        NamedKey::Divide => "KPSLASH",
        NamedKey::Numpad(n) => *KP_YDOTOOL.get(usize::from(n))?,
        NamedKey::Shift => "LEFTSHIFT",
        NamedKey::Ctrl => "LEFTCTRL",
        NamedKey::Alt => "LEFTALT",
        NamedKey::Win
        | NamedKey::LeftWin
        | NamedKey::RightWin
        | NamedKey::Apps
        | NamedKey::Help
        | NamedKey::PrintScreen
        | NamedKey::Super => return None,
    };
    Some(NativeKey::Key(name))
}

fn uinput(key: NamedKey) -> Option<NativeKey> {
    let code = match key {
        NamedKey::Tab => 15,
        NamedKey::Enter => 28,
        NamedKey::Up => 103,
        NamedKey::Down => 108,
        NamedKey::Left => 105,
        NamedKey::Right => 106,
        NamedKey::Insert => 110,
        NamedKey::Delete => 111,
        NamedKey::Home => 102,
        NamedKey::End => 107,
        NamedKey::PageUp => 104,
        NamedKey::PageDown => 109,
        NamedKey::Space => 57,
        NamedKey::Backspace => 14,
        NamedKey::Break => 119,
        NamedKey::CapsLock => 58,
        NamedKey::Escape => 1,
        NamedKey::Win | NamedKey::LeftWin | NamedKey::Super => 125,
        NamedKey::RightWin => 126,
        NamedKey::Apps => 127,
        NamedKey::Help => 138,
        NamedKey::NumLock => 69,
        NamedKey::PrintScreen => 99,
        NamedKey::ScrollLock => 70,
        NamedKey::F(n) => FUNCTION_CODES[function_index(n)?],
        NamedKey::Add => 78,
        NamedKey::Subtract => 74,
        NamedKey::Multiply => 55,
        NamedKey::Divide => 98,
        NamedKey::Numpad(n) => *KP_CODES.get(usize::from(n))?,
        NamedKey::Shift => 42,
        NamedKey::Ctrl => 29,
        NamedKey::Alt => 56,
    };
    Some(NativeKey::Code(code))
}
