use std::collections::HashSet;

use glam::Vec2;

/// Returned by the viewer's key poll when the user asked to quit.
pub const QUIT: i32 = -1;
/// Returned by the viewer's key poll when no key arrived within the timeout.
pub const NO_KEY: i32 = 0;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    /// Integer code reported by the key poll.
    ///
    /// Letters report their uppercase ASCII value and digits their ASCII
    /// digit; named and function keys live above 255 so the low byte of
    /// their code never aliases a character.
    pub fn code(self) -> i32 {
        match self {
            Self::Character(ch) => ch.to_ascii_uppercase() as i32,
            Self::Digit(d) => i32::from(b'0' + d.min(9)),
            Self::Named(NamedKey::Space) => i32::from(b' '),
            Self::Named(named) => 256 + named as i32,
            Self::Function(n) => 289 + i32::from(n),
        }
    }
}

/// Friendly names for a subset of keyboard keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    Home,
    End,
    PageUp,
    PageDown,
}

/// A non-quit key poll result, reduced to its low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub code: i32,
    pub ch: char,
}

impl KeyPress {
    /// `None` for the quit sentinel (any negative code).
    pub fn from_code(code: i32) -> Option<Self> {
        if code < 0 {
            return None;
        }
        Some(Self {
            code,
            ch: char::from((code & 0xff) as u8),
        })
    }

    /// True when nothing was pressed during the poll.
    pub fn is_idle(&self) -> bool {
        self.code == NO_KEY
    }

    pub fn matches_ignore_case(&self, ch: char) -> bool {
        !self.is_idle() && self.ch.eq_ignore_ascii_case(&ch)
    }
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }
}

/// Pointer buttons and cursor position, turned into drag deltas.
#[derive(Debug, Default)]
pub struct PointerState {
    buttons: HashSet<MouseButton>,
    position: Option<Vec2>,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button_down(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn set_button_up(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    /// Records the new cursor position and returns the movement since the
    /// previous one (zero for the first sample).
    pub fn move_to(&mut self, position: Vec2) -> Vec2 {
        let delta = self.position.map_or(Vec2::ZERO, |previous| position - previous);
        self.position = Some(position);
        delta
    }

    pub fn position(&self) -> Option<Vec2> {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_report_uppercase_ascii() {
        assert_eq!(KeyCode::Character('v').code(), 'V' as i32);
        assert_eq!(KeyCode::Character('V').code(), 86);
        assert_eq!(KeyCode::Digit(7).code(), '7' as i32);
        assert_eq!(KeyCode::Named(NamedKey::Space).code(), 32);
    }

    #[test]
    fn named_keys_do_not_alias_letters() {
        for named in [NamedKey::Enter, NamedKey::Escape, NamedKey::PageDown] {
            let press = KeyPress::from_code(KeyCode::Named(named).code()).unwrap();
            assert!(!press.matches_ignore_case('v'));
        }
        let f1 = KeyPress::from_code(KeyCode::Function(1).code()).unwrap();
        assert!(!f1.ch.is_ascii_alphabetic());
    }

    #[test]
    fn key_press_masks_low_byte() {
        assert_eq!(KeyPress::from_code(QUIT), None);
        assert_eq!(KeyPress::from_code(-42), None);
        let press = KeyPress::from_code(0x100 + 'v' as i32).unwrap();
        assert_eq!(press.ch, 'v');
        assert!(press.matches_ignore_case('V'));
        assert!(KeyPress::from_code('V' as i32).unwrap().matches_ignore_case('v'));
    }

    #[test]
    fn idle_poll_matches_nothing() {
        let idle = KeyPress::from_code(NO_KEY).unwrap();
        assert!(idle.is_idle());
        assert!(!idle.matches_ignore_case('\0'));
    }

    #[test]
    fn pointer_reports_drag_deltas() {
        let mut pointer = PointerState::new();
        assert_eq!(pointer.move_to(Vec2::new(10.0, 10.0)), Vec2::ZERO);
        pointer.set_button_down(MouseButton::LEFT);
        assert_eq!(pointer.move_to(Vec2::new(15.0, 7.0)), Vec2::new(5.0, -3.0));
        assert!(pointer.is_button_down(MouseButton::LEFT));
        pointer.set_button_up(MouseButton::LEFT);
        assert!(!pointer.is_button_down(MouseButton::LEFT));
        assert_eq!(pointer.position(), Some(Vec2::new(15.0, 7.0)));
    }
}
