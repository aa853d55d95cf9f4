//! Inline menu buttons and their callback ids.

use std::fmt;

use crate::messaging::types::{InlineButton, InlineKeyboard};

/// Every button the bot can show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    Main,
    Setup,
    Upload,
    Status,
    Help,
    ViewConfig,
    DeleteConfig,
    ConfirmDelete,
    CancelSetup,
}

impl MenuAction {
    pub const ALL: [MenuAction; 9] = [
        MenuAction::Main,
        MenuAction::Setup,
        MenuAction::Upload,
        MenuAction::Status,
        MenuAction::Help,
        MenuAction::ViewConfig,
        MenuAction::DeleteConfig,
        MenuAction::ConfirmDelete,
        MenuAction::CancelSetup,
    ];

    /// Callback data carried by the button.
    pub fn id(self) -> &'static str {
        match self {
            MenuAction::Main => "menu_main",
            MenuAction::Setup => "menu_setup",
            MenuAction::Upload => "menu_upload",
            MenuAction::Status => "menu_status",
            MenuAction::Help => "menu_help",
            MenuAction::ViewConfig => "menu_view_config",
            MenuAction::DeleteConfig => "delete_config",
            MenuAction::ConfirmDelete => "confirm_delete",
            MenuAction::CancelSetup => "cancel_setup",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == data)
    }

    fn button(self, label: &str) -> InlineButton {
        InlineButton::new(label, self.id())
    }
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub fn main_menu(has_config: bool) -> InlineKeyboard {
    let setup_label = if has_config {
        "⚙️ Edit FTP Config"
    } else {
        "⚙️ Setup FTP"
    };
    let mut buttons = vec![
        MenuAction::Setup.button(setup_label),
        MenuAction::Upload.button("📤 Upload File"),
        MenuAction::Status.button("✅ Test Connection"),
    ];
    if has_config {
        buttons.push(MenuAction::ViewConfig.button("📋 View Saved Config"));
    }
    buttons.push(MenuAction::Help.button("ℹ️ Help"));
    InlineKeyboard::single_column(buttons)
}

pub fn back_to_menu() -> InlineKeyboard {
    InlineKeyboard::single_column([MenuAction::Main.button("🏠 Back to Menu")])
}

pub fn cancel() -> InlineKeyboard {
    InlineKeyboard::single_column([MenuAction::CancelSetup.button("❌ Cancel")])
}

pub fn config_view() -> InlineKeyboard {
    InlineKeyboard::single_column([
        MenuAction::Setup.button("🔄 Update Config"),
        MenuAction::DeleteConfig.button("🗑️ Delete Config"),
        MenuAction::Main.button("🏠 Back to Menu"),
    ])
}

pub fn delete_confirmation() -> InlineKeyboard {
    InlineKeyboard::single_column([
        MenuAction::ConfirmDelete.button("✅ Yes, Delete"),
        MenuAction::ViewConfig.button("❌ Cancel"),
    ])
}
