use super::action::{Action, Nav};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Button {
    pub(crate) label: String,
    pub(crate) action: Action,
}

impl Button {
    pub(crate) fn new(label: impl Into<String>, action: Action) -> Self {
        Self { label: label.into(), action }
    }
}

/// Message text with an inline keyboard, one inner vector per row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Screen {
    pub(crate) text: String,
    pub(crate) keyboard: Vec<Vec<Button>>,
}

impl Screen {
    pub(crate) fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: Vec::new() }
    }

    /// Appends a row holding a single button.
    pub(crate) fn button(mut self, label: impl Into<String>, action: impl Into<Action>) -> Self {
        self.keyboard.push(vec![Button::new(label, action.into())]);
        self
    }

    pub(crate) fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.keyboard.push(buttons);
        }
        self
    }

    pub(crate) fn main_menu_button(self) -> Self {
        self.button("🏠 Главное меню", Nav::MainMenu)
    }

    pub(crate) fn back_to_main(self) -> Self {
        self.button("🔙 Назад", Nav::MainMenu)
    }

    #[cfg(test)]
    pub(crate) fn has(&self, action: impl Into<Action>) -> bool {
        let action = action.into();
        self.keyboard.iter().flatten().any(|button| button.action == action)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reply {
    Screen(Screen),
    /// Short acknowledgement; shown as a callback toast for button presses.
    Notice(String),
    Document {
        filename: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

impl From<Screen> for Reply {
    fn from(screen: Screen) -> Self {
        Self::Screen(screen)
    }
}
