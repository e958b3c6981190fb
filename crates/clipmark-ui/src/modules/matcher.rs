// crates/clipmark-ui/src/modules/matcher.rs
//
// Match document panel: the query clip on the left, its targets in a
// wrapping grid on the right. Left click marks a target similar, right click
// dissimilar; clicking the same side again clears it. The tile border shows
// the current classification.
//
// Classifications are not saved automatically: Ctrl+S, File → Save, or the
// close prompt writes them.

use egui::{RichText, ScrollArea, Stroke, Ui};

use clipmark_core::annotation::MatchAnnotation;
use clipmark_core::commands::AnnotatorCommand;
use clipmark_core::helpers::format::metadata_value;
use clipmark_core::media_types::ViewerId;
use clipmark_core::Navigator;

use super::scrubber::ScrubberModule;
use super::viewer::show_viewer;
use super::AnnotatorModule;
use crate::context::FrameTextures;
use crate::helpers::format::fit_label;
use crate::theme::{classification_stroke, ACCENT, DARK_TEXT_DIM};

const QUERY_BOX: egui::Vec2 = egui::vec2(420.0, 320.0);
const TILE_BOX:  egui::Vec2 = egui::vec2(240.0, 160.0);

#[derive(Default)]
pub struct MatcherModule {
    scrubber: ScrubberModule,
}

impl AnnotatorModule for MatcherModule {
    fn name(&self) -> &str { "Matcher" }

    fn ui(&mut self, ui: &mut Ui, nav: &Navigator, frames: &FrameTextures, cmd: &mut Vec<AnnotatorCommand>) {
        egui::TopBottomPanel::bottom("matcher_scrubber")
            .show_inside(ui, |ui| self.scrubber.ui(ui, nav, frames, cmd));

        egui::CentralPanel::default().show_inside(ui, |ui| {
            ui.label(RichText::new(nav.metadata_text()).monospace().size(12.0));
            ui.add_space(4.0);

            let Some(entry) = nav.current_match() else {
                ui.label(RichText::new("No clips in this document").weak());
                return;
            };

            ui.horizontal_top(|ui| {
                ui.vertical(|ui| {
                    ui.label(RichText::new("Query").strong());
                    show_viewer(ui, frames, nav, ViewerId::Query, QUERY_BOX, Stroke::new(2.0, ACCENT));
                    ui.add_space(4.0);
                    ui.label(
                        RichText::new("left click: similar · right click: dissimilar")
                            .size(11.0)
                            .color(DARK_TEXT_DIM),
                    );
                });
                ui.separator();
                ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for i in 0..entry.targets().len() {
                            target_tile(ui, nav, frames, entry, i, cmd);
                        }
                    });
                });
            });
        });
    }
}

fn target_tile(
    ui:     &mut Ui,
    nav:    &Navigator,
    frames: &FrameTextures,
    entry:  &MatchAnnotation,
    i:      usize,
    cmd:    &mut Vec<AnnotatorCommand>,
) {
    let target = &entry.targets()[i];
    ui.vertical(|ui| {
        ui.set_width(TILE_BOX.x);
        let stroke = classification_stroke(entry.classification(i));
        let resp = show_viewer(ui, frames, nav, ViewerId::Target(i), TILE_BOX, stroke);
        if resp.clicked() {
            cmd.push(AnnotatorCommand::ClassifyTarget { target: i, similar: true });
        }
        if resp.secondary_clicked() {
            cmd.push(AnnotatorCommand::ClassifyTarget { target: i, similar: false });
        }
        resp.on_hover_text(hover_text(entry, i));

        let name = target.path().file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ui.label(
            RichText::new(format!(
                "#{i} {} ({} - {})",
                fit_label(&name, TILE_BOX.x - 80.0), target.start_frame(), target.end_frame(),
            ))
            .size(11.0),
        );
    });
}

/// Full path, range and every metadata field of target `i`.
fn hover_text(entry: &MatchAnnotation, i: usize) -> String {
    let t = &entry.targets()[i];
    let mut lines = vec![format!("{} ({} - {})", t.path().display(), t.start_frame(), t.end_frame())];
    if let Some(meta) = entry.target_metadata().get(i) {
        lines.extend(meta.iter().map(|(k, v)| format!("{k}: {}", metadata_value(v))));
    }
    lines.join("\n")
}
