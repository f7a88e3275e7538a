//! Auto-selection for list steps (organizations, accounts).

use tracing::info;

use crate::api::{Account, Organization};
use crate::error::{ApiError, Error, PreferencesError};
use crate::preferences::PreferencesService;

use super::event::Key;
use super::step::{KeyBinding, RETRY};

/// How a freshly loaded list resolves without user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to pick from: go to the create path.
    Create,
    /// The saved preference matches item `n`.
    Preferred(usize),
    /// Item `n` is the only one and nothing was saved; it must be persisted.
    Only(usize),
    /// The user has to choose.
    Manual,
}

/// Resolve a loaded list in fixed order: empty, saved preference, single item, manual.
pub fn resolve<T>(items: &[T], saved: Option<&str>, id: impl Fn(&T) -> &str) -> Resolution {
    if items.is_empty() {
        return Resolution::Create;
    }

    if let Some(saved) = saved.filter(|s| !s.is_empty()) {
        if let Some(index) = items.iter().position(|item| id(item) == saved) {
            return Resolution::Preferred(index);
        }
        return Resolution::Manual;
    }

    if items.len() == 1 {
        return Resolution::Only(0);
    }

    Resolution::Manual
}

/// Cursor over a list with wrap-free up/down movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn up(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn down(&mut self, len: usize) {
        if self.index + 1 < len {
            self.index += 1;
        }
    }
}

/// Render `names` one per line, marking the cursor row.
pub fn render_list<'a>(names: impl IntoIterator<Item = &'a str>, cursor: Cursor) -> String {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            if i == cursor.index() {
                format!("> {name}")
            } else {
                format!("  {name}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// An item a select step lists by name and remembers by id.
pub trait Choice: Clone {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Choice for Organization {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Choice for Account {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type SavedId = fn(&PreferencesService) -> Option<String>;
type SaveId = fn(&PreferencesService, &str) -> Result<(), PreferencesError>;

/// Follow-up work a key press asks of the owning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    None,
    Reload,
}

/// List state shared by the select steps.
///
/// A pick only counts once its id is saved as the default; a failed save is
/// kept pending and written again on `r`.
pub struct Picker<T> {
    noun: &'static str,
    saved_id: SavedId,
    save_id: SaveId,
    loading: bool,
    items: Vec<T>,
    cursor: Cursor,
    selected: Option<T>,
    pending: Option<usize>,
    create: bool,
    error: Option<Error>,
}

impl<T: Choice> Picker<T> {
    pub fn new(noun: &'static str, saved_id: SavedId, save_id: SaveId) -> Self {
        Self {
            noun,
            saved_id,
            save_id,
            loading: false,
            items: Vec::new(),
            cursor: Cursor::default(),
            selected: None,
            pending: None,
            create: false,
            error: None,
        }
    }

    pub fn start_loading(&mut self) {
        self.loading = true;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    pub fn wants_create(&self) -> bool {
        self.create
    }

    /// Either an item was picked or the create path was chosen.
    pub fn is_decided(&self) -> bool {
        self.selected.is_some() || self.create
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn on_loaded(&mut self, prefs: &PreferencesService, result: Result<Vec<T>, ApiError>) {
        self.loading = false;
        let items = match result {
            Ok(items) => items,
            Err(e) => {
                self.error = Some(e.into());
                return;
            }
        };

        let saved = (self.saved_id)(prefs);
        let resolution = resolve(&items, saved.as_deref(), |item| item.id());
        self.items = items;
        match resolution {
            Resolution::Create => self.create = true,
            Resolution::Preferred(i) => {
                info!(noun = self.noun, id = %self.items[i].id(), "Using saved default");
                self.selected = Some(self.items[i].clone());
            }
            Resolution::Only(i) => self.choose(prefs, i),
            Resolution::Manual => {}
        }
    }

    /// Save item `index` as the default, selecting it once the write succeeds.
    pub fn choose(&mut self, prefs: &PreferencesService, index: usize) {
        let Some(item) = self.items.get(index) else {
            return;
        };
        match (self.save_id)(prefs, item.id()) {
            Ok(()) => {
                info!(noun = self.noun, id = %item.id(), "Selected");
                self.pending = None;
                self.selected = Some(item.clone());
            }
            Err(e) => {
                self.pending = Some(index);
                self.error = Some(e.into());
            }
        }
    }

    pub fn handle_key(&mut self, prefs: &PreferencesService, key: Key) -> PickerAction {
        if self.loading || self.is_decided() {
            return PickerAction::None;
        }
        if self.error.is_some() {
            if key == Key::Char('r') {
                self.error = None;
                match self.pending {
                    Some(index) => self.choose(prefs, index),
                    None => return PickerAction::Reload,
                }
            }
            return PickerAction::None;
        }
        match key {
            Key::Up | Key::Char('k') => self.cursor.up(),
            Key::Down | Key::Char('j') => self.cursor.down(self.items.len()),
            Key::Enter => self.choose(prefs, self.cursor.index()),
            Key::Char('n') => self.create = true,
            _ => {}
        }
        PickerAction::None
    }

    pub fn render(&self) -> String {
        render_list(self.items.iter().map(|item| item.name()), self.cursor)
    }

    pub fn help(&self, create_label: &'static str) -> Vec<KeyBinding> {
        if self.error.is_some() {
            return vec![RETRY];
        }
        vec![
            KeyBinding::new("↑/k", "up"),
            KeyBinding::new("↓/j", "down"),
            KeyBinding::new("enter", "select"),
            KeyBinding::new("n", create_label),
        ]
    }
}
