// crates/clipmark-ui/src/modules/viewer.rs
//
// One clip player on screen: the viewer's current frame letterboxed into a
// box, a frame counter, and a border the caller picks (classification colour
// in the matcher). Returns the click response so callers can react.

use egui::{pos2, Align2, Color32, FontId, Rect, Response, Sense, Stroke, Ui, Vec2};

use clipmark_core::media_types::ViewerId;
use clipmark_core::Navigator;

use crate::context::FrameTextures;
use crate::theme::{DARK_BG_0, DARK_TEXT_DIM};

/// Aspect used for the placeholder before the first frame arrives.
const PLACEHOLDER_ASPECT: f32 = 16.0 / 9.0;

pub fn show_viewer(
    ui:     &mut Ui,
    frames: &FrameTextures,
    nav:    &Navigator,
    viewer: ViewerId,
    max:    Vec2,
    border: Stroke,
) -> Response {
    let tex  = frames.get(viewer);
    let src  = tex.map_or(egui::vec2(PLACEHOLDER_ASPECT, 1.0), |t| t.size_vec2());
    let size = fit_size(src, max);

    let (rect, response) = ui.allocate_exact_size(size, Sense::click());
    let painter = ui.painter();
    painter.rect_filled(rect, 4, DARK_BG_0);

    match tex {
        Some(t) => {
            let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
            painter.image(t.id(), rect, uv, Color32::WHITE);
            if let Some(p) = nav.player(viewer) {
                painter.text(
                    rect.right_bottom() + egui::vec2(-4.0, -3.0),
                    Align2::RIGHT_BOTTOM,
                    format!("{}/{}", p.cursor() + 1, p.clip().len()),
                    FontId::monospace(10.0),
                    Color32::from_white_alpha(180),
                );
            }
        }
        None => {
            let msg = if nav.is_loading(viewer) { "loading…" } else { "no preview" };
            painter.text(rect.center(), Align2::CENTER_CENTER, msg, FontId::proportional(12.0), DARK_TEXT_DIM);
        }
    }
    painter.rect_stroke(rect, 4, border, egui::StrokeKind::Outside);
    response
}

/// Largest size with `src`'s aspect ratio that fits inside `max`.
pub fn fit_size(src: Vec2, max: Vec2) -> Vec2 {
    if src.x <= 0.0 || src.y <= 0.0 {
        return max;
    }
    let scale = (max.x / src.x).min(max.y / src.y).max(0.0);
    src * scale
}
