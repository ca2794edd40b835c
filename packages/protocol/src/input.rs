//! Input events sent from a client to the computer it is viewing.

use std::collections::BTreeSet;

use bytes::{Buf, BufMut};

use crate::error::{ProtocolError, Result};
use crate::wire::{read_bool, read_string, read_u8, read_var_int, write_bool, write_string, write_var_int};

/// Longest paste accepted, in characters.
pub const MAX_PASTE_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown { key: i32, repeat: bool },
    KeyUp { key: i32 },
    Char { ch: char },
    MouseClick { button: i32, x: i32, y: i32 },
    MouseUp { button: i32, x: i32, y: i32 },
    MouseDrag { button: i32, x: i32, y: i32 },
    MouseScroll { direction: i32, x: i32, y: i32 },
    Paste { text: String },
    Terminate,
    Shutdown,
    Reboot,
    TurnOn,
}

impl InputEvent {
    fn tag(&self) -> u8 {
        match self {
            InputEvent::KeyDown { .. } => 0,
            InputEvent::KeyUp { .. } => 1,
            InputEvent::Char { .. } => 2,
            InputEvent::MouseClick { .. } => 3,
            InputEvent::MouseUp { .. } => 4,
            InputEvent::MouseDrag { .. } => 5,
            InputEvent::MouseScroll { .. } => 6,
            InputEvent::Paste { .. } => 7,
            InputEvent::Terminate => 8,
            InputEvent::Shutdown => 9,
            InputEvent::Reboot => 10,
            InputEvent::TurnOn => 11,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_u8(self.tag());
        match self {
            InputEvent::KeyDown { key, repeat } => {
                write_var_int(buf, *key);
                write_bool(buf, *repeat);
            }
            InputEvent::KeyUp { key } => write_var_int(buf, *key),
            InputEvent::Char { ch } => write_var_int(buf, u32::from(*ch) as i32),
            InputEvent::MouseClick { button, x, y }
            | InputEvent::MouseUp { button, x, y }
            | InputEvent::MouseDrag { button, x, y }
            | InputEvent::MouseScroll {
                direction: button,
                x,
                y,
            } => {
                for value in [*button, *x, *y] {
                    write_var_int(buf, value);
                }
            }
            InputEvent::Paste { text } => write_string(buf, text, MAX_PASTE_LENGTH)?,
            InputEvent::Terminate | InputEvent::Shutdown | InputEvent::Reboot | InputEvent::TurnOn => {}
        }
        Ok(())
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let tag = read_u8(buf)?;
        Ok(match tag {
            0 => InputEvent::KeyDown {
                key: read_var_int(buf)?,
                repeat: read_bool(buf)?,
            },
            1 => InputEvent::KeyUp {
                key: read_var_int(buf)?,
            },
            2 => {
                let code = read_var_int(buf)? as u32;
                InputEvent::Char {
                    ch: char::from_u32(code).ok_or(ProtocolError::InvalidChar(code))?,
                }
            }
            3 => {
                let (button, x, y) = read_mouse(buf)?;
                InputEvent::MouseClick { button, x, y }
            }
            4 => {
                let (button, x, y) = read_mouse(buf)?;
                InputEvent::MouseUp { button, x, y }
            }
            5 => {
                let (button, x, y) = read_mouse(buf)?;
                InputEvent::MouseDrag { button, x, y }
            }
            6 => {
                let (direction, x, y) = read_mouse(buf)?;
                InputEvent::MouseScroll { direction, x, y }
            }
            7 => InputEvent::Paste {
                text: read_string(buf, MAX_PASTE_LENGTH)?,
            },
            8 => InputEvent::Terminate,
            9 => InputEvent::Shutdown,
            10 => InputEvent::Reboot,
            11 => InputEvent::TurnOn,
            tag => return Err(ProtocolError::UnknownEvent(tag)),
        })
    }
}

fn read_mouse(buf: &mut impl Buf) -> Result<(i32, i32, i32)> {
    Ok((read_var_int(buf)?, read_var_int(buf)?, read_var_int(buf)?))
}

/// Which keys and mouse button a client currently holds down, so they can be
/// released if the client goes away mid-press.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    keys_down: BTreeSet<i32>,
    last_mouse_x: i32,
    last_mouse_y: i32,
    last_mouse_down: Option<i32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event the client sent.
    pub fn observe(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::KeyDown { key, .. } => {
                self.keys_down.insert(key);
            }
            InputEvent::KeyUp { key } => {
                self.keys_down.remove(&key);
            }
            InputEvent::MouseClick { button, x, y } | InputEvent::MouseDrag { button, x, y } => {
                self.last_mouse_x = x;
                self.last_mouse_y = y;
                self.last_mouse_down = Some(button);
            }
            InputEvent::MouseUp { x, y, .. } => {
                self.last_mouse_x = x;
                self.last_mouse_y = y;
                self.last_mouse_down = None;
            }
            InputEvent::MouseScroll { x, y, .. } => {
                self.last_mouse_x = x;
                self.last_mouse_y = y;
            }
            _ => {}
        }
    }

    pub fn keys_down(&self) -> impl Iterator<Item = i32> + '_ {
        self.keys_down.iter().copied()
    }

    pub fn mouse_down(&self) -> Option<i32> {
        self.last_mouse_down
    }

    /// Events releasing everything still held, leaving nothing held.
    pub fn release_all(&mut self) -> Vec<InputEvent> {
        let mut events: Vec<InputEvent> = std::mem::take(&mut self.keys_down)
            .into_iter()
            .map(|key| InputEvent::KeyUp { key })
            .collect();
        if let Some(button) = self.last_mouse_down.take() {
            events.push(InputEvent::MouseUp {
                button,
                x: self.last_mouse_x,
                y: self.last_mouse_y,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(event: InputEvent) {
        let mut buf = Vec::new();
        event.encode(&mut buf).unwrap();
        let mut slice = &buf[..];
        assert_eq!(InputEvent::decode(&mut slice).unwrap(), event);
        assert!(slice.is_empty(), "{event:?} left trailing bytes");
    }

    #[test]
    fn events_survive_the_wire() {
        roundtrip(InputEvent::KeyDown { key: 340, repeat: true });
        roundtrip(InputEvent::Char { ch: 'é' });
        roundtrip(InputEvent::MouseScroll {
            direction: -1,
            x: 3,
            y: 4,
        });
        roundtrip(InputEvent::Paste {
            text: "print('hi')".to_string(),
        });
        roundtrip(InputEvent::TurnOn);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(matches!(
            InputEvent::decode(&mut &[42u8][..]),
            Err(ProtocolError::UnknownEvent(42))
        ));
    }

    #[test]
    fn long_pastes_are_rejected() {
        let text = "a".repeat(MAX_PASTE_LENGTH + 1);
        assert!(InputEvent::Paste { text }.encode(&mut Vec::new()).is_err());
    }

    #[test]
    fn release_all_lets_go_of_everything() {
        let mut state = InputState::new();
        for event in [
            InputEvent::KeyDown { key: 30, repeat: false },
            InputEvent::KeyDown { key: 29, repeat: false },
            InputEvent::KeyDown { key: 31, repeat: false },
            InputEvent::KeyUp { key: 31 },
            InputEvent::MouseClick { button: 1, x: 5, y: 6 },
            InputEvent::MouseDrag { button: 1, x: 7, y: 8 },
        ] {
            state.observe(&event);
        }

        assert_eq!(
            state.release_all(),
            vec![
                InputEvent::KeyUp { key: 29 },
                InputEvent::KeyUp { key: 30 },
                InputEvent::MouseUp { button: 1, x: 7, y: 8 },
            ]
        );
        assert!(state.release_all().is_empty(), "Nothing is held after releasing");
    }

    #[test]
    fn mouse_up_clears_the_button() {
        let mut state = InputState::new();
        state.observe(&InputEvent::MouseClick { button: 2, x: 1, y: 1 });
        state.observe(&InputEvent::MouseUp { button: 2, x: 1, y: 1 });
        assert_eq!(state.mouse_down(), None);
        assert!(state.release_all().is_empty());
    }
}
