// crates/clipmark-ui/src/modules/labeler.rs
//
// Label document panel.
//
//   ┌──────────────────────────────┬──────────────┐
//   │ metadata                     │ entry box    │
//   │ viewer (Main)                │ suggestions  │
//   │ current labels (click = del) │ (vocabulary) │
//   ├──────────────────────────────┴──────────────┤
//   │ scrubber                                    │
//   └─────────────────────────────────────────────┘
//
// Every label edit is saved by the store as soon as the navigator applies it.

use egui::{Align2, Button, Key, RichText, ScrollArea, TextEdit, Ui};

use clipmark_core::commands::AnnotatorCommand;
use clipmark_core::labels::filter_prefix;
use clipmark_core::media_types::ViewerId;
use clipmark_core::Navigator;

use super::scrubber::ScrubberModule;
use super::viewer::show_viewer;
use super::AnnotatorModule;
use crate::context::FrameTextures;
use crate::helpers::format::fit_label;
use crate::theme::{label_color, text_on, ACCENT_DIM, DARK_TEXT_DIM};

const SUGGESTION_PX: f32 = 200.0;
/// Vertical room kept under the viewer for the current-label row.
const LABEL_ROW_H: f32 = 64.0;

#[derive(Default)]
pub struct LabelerModule {
    /// Entry box text; also filters the suggestions.
    entry:    String,
    scrubber: ScrubberModule,
    /// Open rename dialog: (label being renamed, replacement text).
    rename:   Option<(String, String)>,
    /// Open delete confirmation.
    delete:   Option<String>,
}

impl AnnotatorModule for LabelerModule {
    fn name(&self) -> &str { "Labeler" }

    fn ui(&mut self, ui: &mut Ui, nav: &Navigator, frames: &FrameTextures, cmd: &mut Vec<AnnotatorCommand>) {
        egui::TopBottomPanel::bottom("labeler_scrubber")
            .show_inside(ui, |ui| self.scrubber.ui(ui, nav, frames, cmd));

        egui::SidePanel::right("labeler_suggestions")
            .resizable(true)
            .default_width(240.0)
            .min_width(160.0)
            .show_inside(ui, |ui| self.suggestions_ui(ui, nav, cmd));

        egui::CentralPanel::default().show_inside(ui, |ui| {
            ui.label(RichText::new(nav.metadata_text()).monospace().size(12.0));
            ui.add_space(4.0);

            let avail = ui.available_size() - egui::vec2(0.0, LABEL_ROW_H);
            ui.vertical_centered(|ui| {
                show_viewer(ui, frames, nav, ViewerId::Main, avail.max(egui::vec2(64.0, 36.0)), egui::Stroke::new(1.0, ACCENT_DIM));
            });
            ui.add_space(6.0);

            ui.horizontal_wrapped(|ui| {
                let current = nav.current_labels();
                if current.is_empty() {
                    ui.label(RichText::new("unlabeled").italics().color(DARK_TEXT_DIM));
                }
                for label in current {
                    let fill = label_color(label);
                    let btn = ui.add(Button::new(RichText::new(label).color(text_on(fill))).fill(fill))
                        .on_hover_text("Click to remove from this clip");
                    if btn.clicked() {
                        cmd.push(AnnotatorCommand::RemoveLabel(label.clone()));
                    }
                }
            });
        });

        self.dialogs(ui.ctx(), cmd);
    }
}

impl LabelerModule {
    fn suggestions_ui(&mut self, ui: &mut Ui, nav: &Navigator, cmd: &mut Vec<AnnotatorCommand>) {
        ui.add_space(4.0);
        ui.label(RichText::new("Labels").strong());

        let edit = ui.add(
            TextEdit::singleline(&mut self.entry)
                .hint_text("type a label, Enter adds")
                .desired_width(f32::INFINITY),
        );
        if edit.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
            cmd.extend(self.submit_entry());
            edit.request_focus();
        }
        ui.separator();

        let shown = filter_prefix(nav.vocabulary(), self.entry.trim());
        if shown.is_empty() {
            ui.label(RichText::new("no matching labels").italics().color(DARK_TEXT_DIM));
        }
        let mut picked = None;
        ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                for label in shown {
                    let fill = label_color(label);
                    let btn = ui.add(
                        Button::new(RichText::new(fit_label(label, SUGGESTION_PX)).color(text_on(fill))).fill(fill),
                    );
                    if btn.clicked() {
                        picked = Some(label);
                    }
                    btn.on_hover_text(label).context_menu(|ui| {
                        if ui.button("Edit…").clicked() {
                            self.rename = Some((label.to_string(), label.to_string()));
                            ui.close_menu();
                        }
                        if ui.button("Delete…").clicked() {
                            self.delete = Some(label.to_string());
                            ui.close_menu();
                        }
                        ui.separator();
                        if ui.button("Next instance").clicked() {
                            cmd.push(AnnotatorCommand::NextInstance(label.to_string()));
                            ui.close_menu();
                        }
                        if ui.button("Previous instance").clicked() {
                            cmd.push(AnnotatorCommand::PrevInstance(label.to_string()));
                            ui.close_menu();
                        }
                    });
                }
            });
        });
        if let Some(label) = picked {
            cmd.push(self.pick_suggestion(label));
        }
    }

    /// Entry box confirmed with Enter. Blank text adds nothing.
    fn submit_entry(&mut self) -> Option<AnnotatorCommand> {
        let label = self.entry.trim().to_string();
        if label.is_empty() {
            return None;
        }
        self.entry.clear();
        Some(AnnotatorCommand::AddLabel(label))
    }

    /// A suggestion was clicked. The filter resets so the full vocabulary
    /// shows again.
    fn pick_suggestion(&mut self, label: &str) -> AnnotatorCommand {
        self.entry.clear();
        AnnotatorCommand::AddLabel(label.to_string())
    }

    fn dialogs(&mut self, ctx: &egui::Context, cmd: &mut Vec<AnnotatorCommand>) {
        if let Some((old, new)) = &mut self.rename {
            let mut open = true;
            let mut done = false;
            egui::Window::new("Rename label")
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(format!("Rename \"{old}\" on every clip to:"));
                    let r = ui.text_edit_singleline(new);
                    let enter = r.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
                    ui.horizontal(|ui| {
                        if ui.button("Rename").clicked() || enter {
                            cmd.push(AnnotatorCommand::RenameLabel {
                                old: old.clone(),
                                new: new.trim().to_string(),
                            });
                            done = true;
                        }
                        if ui.button("Cancel").clicked() {
                            done = true;
                        }
                    });
                });
            if done || !open {
                self.rename = None;
            }
        }

        if let Some(label) = &self.delete {
            let mut open = true;
            let mut done = false;
            egui::Window::new("Delete label")
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(format!("Remove \"{label}\" from every clip?"));
                    ui.horizontal(|ui| {
                        if ui.button("Delete").clicked() {
                            cmd.push(AnnotatorCommand::DeleteLabel(label.clone()));
                            done = true;
                        }
                        if ui.button("Cancel").clicked() {
                            done = true;
                        }
                    });
                });
            if done || !open {
                self.delete = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picking_a_suggestion_clears_the_filter() {
        let mut m = LabelerModule { entry: "ca".into(), ..Default::default() };
        assert_eq!(m.pick_suggestion("cat"), AnnotatorCommand::AddLabel("cat".into()));
        assert!(m.entry.is_empty());
    }

    #[test]
    fn entry_submits_trimmed_text_once() {
        let mut m = LabelerModule { entry: "  dog ".into(), ..Default::default() };
        assert_eq!(m.submit_entry(), Some(AnnotatorCommand::AddLabel("dog".into())));
        assert!(m.entry.is_empty());
        assert_eq!(m.submit_entry(), None);

        m.entry = "   ".into();
        assert_eq!(m.submit_entry(), None);
        assert_eq!(m.entry, "   ");
    }
}
