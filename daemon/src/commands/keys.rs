//! Key combos and keyboard backends
//!
//! A combo of one key is pressed; a combo of several keys is a chord
//! (pressed in order, released in reverse).

use serde_json::Value;

use crate::error::ActionError;

/// Modifier names after alias normalization
pub mod modifiers {
    pub const CTRL: &str = "ctrl";
    pub const ALT: &str = "alt";
    pub const SHIFT: &str = "shift";
    pub const CMD: &str = "cmd";
}

/// Canonical spelling of a key name
pub fn normalize_key(name: &str) -> String {
    let key = name.trim().to_lowercase();
    match key.as_str() {
        "control" | "ctl" => modifiers::CTRL.to_string(),
        "option" | "opt" => modifiers::ALT.to_string(),
        "command" | "super" | "win" | "meta" => modifiers::CMD.to_string(),
        "enter" => "return".to_string(),
        "esc" => "escape".to_string(),
        _ => key,
    }
}

/// Ordered keys of a keypress action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo(Vec<String>);

impl KeyCombo {
    /// Parse `"ctrl+c"`, `"f5"` or a lone `"+"`
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        if spec == "+" {
            return Some(Self(vec![spec.to_string()]));
        }

        let keys: Vec<String> = spec
            .split('+')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(normalize_key)
            .collect();
        (!keys.is_empty()).then_some(Self(keys))
    }

    /// Accept a string combo or a list of key names
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(spec) => Self::parse(spec),
            Value::Array(items) => {
                let keys: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(normalize_key))
                    .collect();
                let keys: Vec<String> = keys?.into_iter().filter(|k| !k.is_empty()).collect();
                (!keys.is_empty()).then_some(Self(keys))
            }
            _ => None,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// More than one key, so it must be sent as a hotkey
    pub fn is_chord(&self) -> bool {
        self.0.len() > 1
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("+"))
    }
}

/// Something that can synthesize keystrokes
pub trait Keyboard: Send {
    /// Press and release a single key
    fn press(&mut self, key: &str) -> Result<(), ActionError>;

    /// Hold `keys` down in order, then release them in reverse
    fn hotkey(&mut self, keys: &[String]) -> Result<(), ActionError>;
}

/// The platform keystroke backend, if this build has one
pub fn system_keyboard() -> Result<Box<dyn Keyboard>, ActionError> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::CoreGraphicsKeyboard))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Err(ActionError::Dependency(
            "no keypress backend for this platform".to_string(),
        ))
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

    use super::{modifiers, Keyboard};
    use crate::error::ActionError;

    /// Posts keyboard events through Quartz
    pub struct CoreGraphicsKeyboard;

    impl CoreGraphicsKeyboard {
        fn source() -> Result<CGEventSource, ActionError> {
            CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| {
                ActionError::Keyboard(
                    "failed to create event source - check Accessibility permissions".to_string(),
                )
            })
        }

        fn post(
            source: &CGEventSource,
            key: &str,
            down: bool,
            flags: CGEventFlags,
        ) -> Result<(), ActionError> {
            let code = key_code(key)
                .ok_or_else(|| ActionError::Keyboard(format!("unknown key '{key}'")))?;
            let event = CGEvent::new_keyboard_event(source.clone(), code, down)
                .map_err(|_| ActionError::Keyboard(format!("failed to build event for '{key}'")))?;
            event.set_flags(flags);
            event.post(CGEventTapLocation::HID);
            Ok(())
        }
    }

    impl Keyboard for CoreGraphicsKeyboard {
        fn press(&mut self, key: &str) -> Result<(), ActionError> {
            let source = Self::source()?;
            let flags = CGEventFlags::CGEventFlagNull;
            Self::post(&source, key, true, flags)?;
            Self::post(&source, key, false, flags)
        }

        fn hotkey(&mut self, keys: &[String]) -> Result<(), ActionError> {
            let source = Self::source()?;
            let mut flags = CGEventFlags::CGEventFlagNull;

            for key in keys {
                flags |= modifier_flag(key);
                Self::post(&source, key, true, flags)?;
            }
            for key in keys.iter().rev() {
                flags.remove(modifier_flag(key));
                Self::post(&source, key, false, flags)?;
            }
            Ok(())
        }
    }

    fn modifier_flag(key: &str) -> CGEventFlags {
        match key {
            modifiers::CTRL => CGEventFlags::CGEventFlagControl,
            modifiers::ALT => CGEventFlags::CGEventFlagAlternate,
            modifiers::SHIFT => CGEventFlags::CGEventFlagShift,
            modifiers::CMD => CGEventFlags::CGEventFlagCommand,
            _ => CGEventFlags::CGEventFlagNull,
        }
    }

    /// ANSI virtual key codes
    fn key_code(key: &str) -> Option<CGKeyCode> {
        let code = match key {
            "a" => 0x00,
            "s" => 0x01,
            "d" => 0x02,
            "f" => 0x03,
            "h" => 0x04,
            "g" => 0x05,
            "z" => 0x06,
            "x" => 0x07,
            "c" => 0x08,
            "v" => 0x09,
            "b" => 0x0B,
            "q" => 0x0C,
            "w" => 0x0D,
            "e" => 0x0E,
            "r" => 0x0F,
            "y" => 0x10,
            "t" => 0x11,
            "1" => 0x12,
            "2" => 0x13,
            "3" => 0x14,
            "4" => 0x15,
            "6" => 0x16,
            "5" => 0x17,
            "=" | "+" => 0x18,
            "9" => 0x19,
            "7" => 0x1A,
            "-" => 0x1B,
            "8" => 0x1C,
            "0" => 0x1D,
            "]" => 0x1E,
            "o" => 0x1F,
            "u" => 0x20,
            "[" => 0x21,
            "i" => 0x22,
            "p" => 0x23,
            "return" => 0x24,
            "l" => 0x25,
            "j" => 0x26,
            "'" => 0x27,
            "k" => 0x28,
            ";" => 0x29,
            "\\" => 0x2A,
            "," => 0x2B,
            "/" => 0x2C,
            "n" => 0x2D,
            "m" => 0x2E,
            "." => 0x2F,
            "tab" => 0x30,
            "space" | " " => 0x31,
            "`" => 0x32,
            "backspace" => 0x33,
            "escape" => 0x35,
            modifiers::CMD => 0x37,
            modifiers::SHIFT => 0x38,
            "capslock" => 0x39,
            modifiers::ALT => 0x3A,
            modifiers::CTRL => 0x3B,
            "f5" => 0x60,
            "f6" => 0x61,
            "f7" => 0x62,
            "f3" => 0x63,
            "f8" => 0x64,
            "f9" => 0x65,
            "f11" => 0x67,
            "f13" | "printscreen" => 0x69,
            "f10" => 0x6D,
            "f12" => 0x6F,
            "home" => 0x73,
            "pageup" => 0x74,
            "delete" => 0x75,
            "f4" => 0x76,
            "end" => 0x77,
            "f2" => 0x78,
            "pagedown" => 0x79,
            "f1" => 0x7A,
            "left" => 0x7B,
            "right" => 0x7C,
            "down" => 0x7D,
            "up" => 0x7E,
            _ => return None,
        };
        Some(code)
    }
}
