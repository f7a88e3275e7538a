//! Single-line text input used by the create and key steps.

use crate::onboarding::event::Key;

#[derive(Debug, Default)]
pub struct TextInput {
    value: String,
    masked: bool,
    placeholder: &'static str,
}

impl TextInput {
    pub fn new(placeholder: &'static str) -> Self {
        Self {
            placeholder,
            ..Self::default()
        }
    }

    /// Input whose contents render as bullets.
    pub fn masked(placeholder: &'static str) -> Self {
        Self {
            masked: true,
            placeholder,
            ..Self::default()
        }
    }

    /// Apply an editing key. Returns false for keys that are not edits.
    pub fn handle(&mut self, key: Key) -> bool {
        match key {
            Key::Char(c) if !c.is_control() => {
                self.value.push(c);
                true
            }
            Key::Backspace => {
                self.value.pop();
                true
            }
            _ => false,
        }
    }

    pub fn value(&self) -> &str {
        self.value.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    pub fn view(&self) -> String {
        if self.value.is_empty() {
            return format!("> {}", self.placeholder);
        }
        if self.masked {
            format!("> {}", "•".repeat(self.value.chars().count()))
        } else {
            format!("> {}", self.value)
        }
    }
}
