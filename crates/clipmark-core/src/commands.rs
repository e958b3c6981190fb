// crates/clipmark-core/src/commands.rs
//
// Every user action is expressed as an AnnotatorCommand.
// Panels emit these; Navigator::dispatch processes them after the UI pass.

use std::path::PathBuf;

use crate::media_types::ViewerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotatorCommand {
    // ── Navigation ───────────────────────────────────────────────────────────
    SetIndex(usize),
    StepLeft,
    StepRight,
    /// Jump to the next clip carrying this label.
    NextInstance(String),
    /// Jump to the previous clip carrying this label.
    PrevInstance(String),

    // ── Labels (label documents) ─────────────────────────────────────────────
    AddLabel(String),
    RemoveLabel(String),
    /// Rename across every clip. The shell has already asked for `new`.
    RenameLabel { old: String, new: String },
    /// Delete across every clip. The shell has already confirmed.
    DeleteLabel(String),

    // ── Matching (match documents) ───────────────────────────────────────────
    /// Left click → similar, right click → dissimilar.
    ClassifyTarget { target: usize, similar: bool },

    // ── Document ─────────────────────────────────────────────────────────────
    Save,
    RequestClose,
    ResolveClose(CloseChoice),
}

/// Answer to the unsaved-changes prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseChoice {
    SaveAndClose,
    DiscardAndClose,
    Cancel,
}

/// Things the shell has to show the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved(PathBuf),
    SaveFailed(String),
    /// Unsaved changes: ask Save / Discard / Cancel, answer with ResolveClose.
    ConfirmClose,
    /// The document is closed; the shell may drop its tab.
    Closed,
    LoadFailed { viewer: ViewerId, msg: String },
    /// The command didn't apply (wrong document kind, bad index, …).
    Rejected(String),
}
