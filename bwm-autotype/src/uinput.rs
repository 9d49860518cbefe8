//! In-process virtual keyboard through `/dev/uinput`. US layout, ASCII only.

use std::time::Duration;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};

use crate::backend::KeyInjector;
use crate::error::AutotypeError;
use crate::keys::NativeKey;

const BACKEND: &str = "uinput";
const KEY_LEFTSHIFT: u16 = 42;
const DEVICE_SETTLE: Duration = Duration::from_millis(200);

/// Key code and shift state for one ASCII character.
pub(crate) fn ascii_key(c: char) -> Option<(u16, bool)> {
    const LETTERS: [u16; 26] = [
        30, 48, 46, 32, 18, 33, 34, 35, 23, 36, 37, 38, 50, 49, 24, 25, 16, 19, 31, 20, 22, 47,
        17, 45, 21, 44,
    ];
    let plain = |code| Some((code, false));
    let shifted = |code| Some((code, true));
    match c {
        'a'..='z' => plain(LETTERS[(c as u8 - b'a') as usize]),
        'A'..='Z' => shifted(LETTERS[(c as u8 - b'A') as usize]),
        '1'..='9' => plain(u16::from(c as u8 - b'1') + 2),
        '0' => plain(11),
        ' ' => plain(57),
        '\t' => plain(15),
        '\n' => plain(28),
        '-' => plain(12),
        '=' => plain(13),
        '[' => plain(26),
        ']' => plain(27),
        ';' => plain(39),
        '\'' => plain(40),
        '`' => plain(41),
        '\\' => plain(43),
        ',' => plain(51),
        '.' => plain(52),
        '/' => plain(53),
        '!' => shifted(2),
        '@' => shifted(3),
        '#' => shifted(4),
        '$' => shifted(5),
        '%' => shifted(6),
        '^' => shifted(7),
        '&' => shifted(8),
        '*' => shifted(9),
        '(' => shifted(10),
        ')' => shifted(11),
        '_' => shifted(12),
        '+' => shifted(13),
        '{' => shifted(26),
        '}' => shifted(27),
        ':' => shifted(39),
        '"' => shifted(40),
        '~' => shifted(41),
        '|' => shifted(43),
        '<' => shifted(51),
        '>' => shifted(52),
        '?' => shifted(53),
        _ => None,
    }
}

pub struct UinputInjector {
    device: VirtualDevice,
}

impl UinputInjector {
    pub fn open() -> Result<Self, AutotypeError> {
        let unavailable = |e: std::io::Error| AutotypeError::BackendUnavailable {
            backend: BACKEND,
            reason: format!("/dev/uinput: {e}"),
        };
        let mut keys = AttributeSet::<Key>::new();
        for code in 1..=248 {
            keys.insert(Key::new(code));
        }
        let device = VirtualDeviceBuilder::new()
            .map_err(unavailable)?
            .name("bwm virtual keyboard")
            .with_keys(&keys)
            .map_err(unavailable)?
            .build()
            .map_err(unavailable)?;
        // The compositor needs a moment to pick up a new device.
        std::thread::sleep(DEVICE_SETTLE);
        Ok(Self { device })
    }

    fn emit(&mut self, code: u16, value: i32) -> Result<(), AutotypeError> {
        self.device
            .emit(&[InputEvent::new(EventType::KEY, code, value)])
            .map_err(|e| AutotypeError::Injection {
                backend: BACKEND,
                reason: e.to_string(),
            })
    }

    fn tap(&mut self, code: u16, shift: bool) -> Result<(), AutotypeError> {
        if shift {
            self.emit(KEY_LEFTSHIFT, 1)?;
        }
        self.emit(code, 1)?;
        self.emit(code, 0)?;
        if shift {
            self.emit(KEY_LEFTSHIFT, 0)?;
        }
        Ok(())
    }
}

impl KeyInjector for UinputInjector {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn type_text(&mut self, text: &str) -> Result<(), AutotypeError> {
        // Validate up front so nothing is typed for an unusable string.
        let keys = text
            .chars()
            .map(ascii_key)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AutotypeError::Injection {
                backend: BACKEND,
                reason: "unable to type string, bad character".to_string(),
            })?;
        for (code, shift) in keys {
            self.tap(code, shift)?;
        }
        Ok(())
    }

    fn tap_key(&mut self, key: NativeKey) -> Result<(), AutotypeError> {
        match key {
            NativeKey::Code(code) => self.tap(code, false),
            NativeKey::Text(text) => self.type_text(text),
            NativeKey::Key(name) | NativeKey::Modifier(name) => Err(AutotypeError::Injection {
                backend: BACKEND,
                reason: format!("no key code for {name}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case('a', (30, false))]
    #[case('Z', (44, true))]
    #[case('1', (2, false))]
    #[case('9', (10, false))]
    #[case('0', (11, false))]
    #[case('@', (3, true))]
    #[case('?', (53, true))]
    #[case(' ', (57, false))]
    fn ascii_layout(#[case] c: char, #[case] expected: (u16, bool)) {
        assert_eq!(ascii_key(c), Some(expected));
    }

    #[test]
    fn non_ascii_has_no_key() {
        assert_eq!(ascii_key('é'), None);
        assert_eq!(ascii_key('€'), None);
    }

    #[test]
    fn every_printable_ascii_character_is_typeable() {
        for byte in 0x20u8..0x7f {
            assert!(ascii_key(byte as char).is_some(), "{:?}", byte as char);
        }
    }
}
