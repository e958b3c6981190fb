// crates/clipmark-ui/src/modules/scrubber.rs
//
// Clip index slider with step buttons. Dragging emits a SetIndex for every
// value the slider passes through; the navigator's debounce turns that into
// a single decode once the user lets go.

use egui::{RichText, Ui};

use clipmark_core::commands::AnnotatorCommand;
use clipmark_core::Navigator;

use super::AnnotatorModule;
use crate::context::FrameTextures;

#[derive(Default)]
pub struct ScrubberModule;

impl AnnotatorModule for ScrubberModule {
    fn name(&self) -> &str { "Scrubber" }

    fn ui(&mut self, ui: &mut Ui, nav: &Navigator, _frames: &FrameTextures, cmd: &mut Vec<AnnotatorCommand>) {
        if nav.is_empty() {
            ui.label(RichText::new("No clips in this document").weak());
            return;
        }
        ui.horizontal(|ui| {
            if ui.button("◀").on_hover_text("Previous clip (←)").clicked() {
                cmd.push(AnnotatorCommand::StepLeft);
            }
            let mut index = nav.index();
            let last = nav.len() - 1;
            ui.spacing_mut().slider_width = (ui.available_width() - 120.0).max(80.0);
            let resp = ui.add(egui::Slider::new(&mut index, 0..=last).text(format!("/ {last}")));
            if resp.changed() && index != nav.index() {
                cmd.push(AnnotatorCommand::SetIndex(index));
            }
            if ui.button("▶").on_hover_text("Next clip (→)").clicked() {
                cmd.push(AnnotatorCommand::StepRight);
            }
        });
    }
}
