// crates/clipmark-ui/src/helpers/format.rs
//
// UI-layer string utilities. Clip descriptions live in
// clipmark_core::helpers::format; this module is purely about fitting and
// decorating strings for display.

use std::path::Path;

/// Truncates `text` to fit within `max_px` using a per-character width
/// heuristic (≈ 6.5 px/char at the default proportional size). Appends "…"
/// when truncated. Avoids egui font measurement, which needs `&mut Fonts`.
pub fn fit_label(text: &str, max_px: f32) -> String {
    const AVG_CHAR_PX: f32 = 6.5;
    const ELLIPSIS: &str = "…";
    let max_chars = (max_px / AVG_CHAR_PX).max(0.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    // Reserve one slot for the ellipsis itself.
    let keep = max_chars.saturating_sub(1);
    text.chars().take(keep).collect::<String>() + ELLIPSIS
}

/// Tab caption: file name, with a trailing `*` while there are unsaved changes.
pub fn tab_title(path: &Path, dirty: bool) -> String {
    let name = path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if dirty { format!("{name} *") } else { name }
}
