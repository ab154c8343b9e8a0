//! Key bindings for the dashboard editor. The command modifier is either
//! `ctrl` or `meta`, whichever the host platform reports.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
    Copy,
    Cut,
    Paste,
    Delete,
    /// Switch between free and grid placement.
    ToggleGrid,
    Deselect,
}

/// Static binding table; hosts forward raw key events to [`ShortcutMap::resolve`].
pub struct ShortcutMap;

impl ShortcutMap {
    /// Action bound to `key` under the given modifiers, if any. `key` is the
    /// logical key name as the host reports it, such as `"z"` or `"Escape"`.
    pub fn resolve(
        key: &str,
        ctrl: bool,
        shift: bool,
        _alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                "g" | "G" => Some(ShortcutAction::ToggleGrid),
                _ => None,
            };
        }

        if shift {
            return None;
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }
}
