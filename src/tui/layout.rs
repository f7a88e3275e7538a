//! Frame composition: header, step content, error line, key-binding footer.

use crate::error::Error;
use crate::onboarding::KeyBinding;

/// Everything a layout needs to draw one frame.
#[derive(Debug)]
pub struct Screen<'a> {
    pub content: String,
    pub error: Option<&'a Error>,
    pub bindings: Vec<KeyBinding>,
    pub busy: bool,
}

pub trait Layout {
    /// Compose `screen` into at most `height` lines of at most `width` columns.
    fn render(&self, screen: &Screen<'_>, width: u16, height: u16) -> Vec<String>;
}

/// Title bar on top, bindings at the bottom.
pub struct HeaderLayout {
    title: String,
}

impl HeaderLayout {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self::new(format!("tero {}", env!("CARGO_PKG_VERSION")))
    }
}

fn truncate(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}

pub fn footer(bindings: &[KeyBinding]) -> String {
    bindings
        .iter()
        .map(|b| format!("{} {}", b.keys, b.help))
        .collect::<Vec<_>>()
        .join(" • ")
}

impl Layout for HeaderLayout {
    fn render(&self, screen: &Screen<'_>, width: u16, height: u16) -> Vec<String> {
        let width = usize::from(width.max(1));
        let height = usize::from(height.max(1));

        let mut header = vec![self.title.clone(), "─".repeat(width), String::new()];
        let mut tail = Vec::new();
        if let Some(error) = screen.error {
            tail.push(String::new());
            tail.extend(error.to_string().lines().map(|l| format!("✗ {l}")));
        }
        if screen.busy {
            tail.push(String::new());
            tail.push("…".into());
        }
        tail.push(String::new());
        tail.push(footer(&screen.bindings));

        let budget = height.saturating_sub(header.len() + tail.len());
        header.extend(screen.content.lines().take(budget).map(str::to_string));
        header.extend(tail);
        header
            .iter()
            .take(height)
            .map(|line| truncate(line, width))
            .collect()
    }
}
