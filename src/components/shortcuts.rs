use std::fmt;

// ============================================================================
// KEYBOARD SHORTCUTS
// ============================================================================

/// Editor actions reachable from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShortcutAction {
    Undo,
    Redo,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    Deselect,
    BrushSizeDecrease,
    BrushSizeIncrease,
}

impl ShortcutAction {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::ZoomIn => "Zoom In",
            Self::ZoomOut => "Zoom Out",
            Self::ResetZoom => "Reset Zoom",
            Self::Deselect => "Deselect Tool",
            Self::BrushSizeDecrease => "Decrease Brush Size",
            Self::BrushSizeIncrease => "Increase Brush Size",
        }
    }

    /// All actions in display order
    pub fn all() -> &'static [ShortcutAction] {
        use ShortcutAction::*;
        &[
            Undo, Redo,
            ZoomIn, ZoomOut, ResetZoom,
            Deselect,
            BrushSizeDecrease, BrushSizeIncrease,
        ]
    }

    /// Viewport actions stay available while an edit is in flight.
    pub fn allowed_while_processing(&self) -> bool {
        matches!(self, Self::ZoomIn | Self::ZoomOut | Self::ResetZoom)
    }

    /// Default binding, shown next to menu entries.
    pub fn binding_label(&self) -> &'static str {
        match self {
            Self::Undo => "Ctrl+Z",
            Self::Redo => "Ctrl+Shift+Z",
            Self::ZoomIn => "+",
            Self::ZoomOut => "-",
            Self::ResetZoom => "Ctrl+0",
            Self::Deselect => "Escape",
            Self::BrushSizeDecrease => "[",
            Self::BrushSizeIncrease => "]",
        }
    }
}

impl fmt::Display for ShortcutAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single key-down event as reported by the host view.
///
/// `key` is the produced key name (`"z"`, `"+"`, `"Escape"`, ...). `command`
/// folds Ctrl and Cmd together so bindings match on every platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub command: bool,
    pub shift: bool,
    pub alt: bool,
    /// Focus is inside a text input; shortcuts must not steal typing.
    pub in_text_field: bool,
}

impl KeyPress {
    pub fn key(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    pub fn command_key(key: impl Into<String>) -> Self {
        Self { key: key.into(), command: true, ..Self::default() }
    }

    pub fn command_shift_key(key: impl Into<String>) -> Self {
        Self { key: key.into(), command: true, shift: true, ..Self::default() }
    }

    pub fn in_text_field(mut self) -> Self {
        self.in_text_field = true;
        self
    }
}

/// Map a key press to an editor action.
pub fn resolve(press: &KeyPress) -> Option<ShortcutAction> {
    if press.in_text_field || press.alt {
        return None;
    }

    let key = press.key.as_str();
    if press.command {
        return match key {
            k if k.eq_ignore_ascii_case("z") && press.shift => Some(ShortcutAction::Redo),
            k if k.eq_ignore_ascii_case("z") => Some(ShortcutAction::Undo),
            "0" => Some(ShortcutAction::ResetZoom),
            _ => None,
        };
    }

    match key {
        "+" | "=" => Some(ShortcutAction::ZoomIn),
        "-" => Some(ShortcutAction::ZoomOut),
        "Escape" => Some(ShortcutAction::Deselect),
        "[" => Some(ShortcutAction::BrushSizeDecrease),
        "]" => Some(ShortcutAction::BrushSizeIncrease),
        _ => None,
    }
}

#[cfg(test)]
#[path = "shortcuts_test.rs"]
mod tests;
