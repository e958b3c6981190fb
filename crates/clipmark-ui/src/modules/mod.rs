// crates/clipmark-ui/src/modules/mod.rs
//
// Panel registry. A document tab shows exactly one top-level panel: the
// labeler for label documents, the matcher for match documents. Both embed
// the scrubber and draw clips through viewer::show_viewer.

pub mod labeler;
pub mod matcher;
pub mod scrubber;
pub mod viewer;

use egui::Ui;

use clipmark_core::commands::AnnotatorCommand;
use clipmark_core::Navigator;

use crate::context::FrameTextures;

/// Every panel implements this trait.
/// Panels read the navigator and emit commands; they never mutate it.
pub trait AnnotatorModule {
    fn name(&self) -> &str;
    fn ui(
        &mut self,
        ui:     &mut Ui,
        nav:    &Navigator,
        frames: &FrameTextures,
        cmd:    &mut Vec<AnnotatorCommand>,
    );
}
