// crates/clipmark-ui/src/app.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Align2, Key, Modifiers, RichText, ViewportCommand};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use clipmark_core::commands::{AnnotatorCommand, CloseChoice};
use clipmark_core::{AnnotationStore, AnnotatorConfig, Navigator};
use clipmark_media::{FfmpegOpener, SourceOpener};

use crate::context::DocumentTab;
use crate::helpers::format::tab_title;
use crate::theme::{configure_style, ACCENT, DARK_TEXT_DIM, WARNING};

/// Entries kept in File → Open Recent.
const MAX_RECENT: usize = 10;
/// Poll interval while a decode is in flight and nothing else is scheduled.
const LOADING_POLL: Duration = Duration::from_millis(16);

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct AppStorage {
    config: AnnotatorConfig,
    recent: Vec<PathBuf>,
}

/// Command-line values that win over the stored config for this session only.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigOverrides {
    pub fps:                Option<u32>,
    pub debounce_ms:        Option<u64>,
    pub max_target_viewers: Option<usize>,
    pub max_frame_width:    Option<u32>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: AnnotatorConfig) -> AnnotatorConfig {
        if let Some(v) = self.fps                { config.fps = v; }
        if let Some(v) = self.debounce_ms        { config.debounce_ms = v; }
        if let Some(v) = self.max_target_viewers { config.max_target_viewers = v; }
        if let Some(v) = self.max_frame_width    { config.max_frame_width = v; }
        config
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct ClipmarkApp {
    /// As loaded from storage; this is what gets persisted.
    stored_config: AnnotatorConfig,
    /// Stored config with command-line overrides applied.
    config:        AnnotatorConfig,
    opener:        Arc<dyn SourceOpener>,
    tabs:          Vec<DocumentTab>,
    active:        Option<Uuid>,
    recent:        Vec<PathBuf>,
    /// Open failures, shown together in one dialog.
    open_errors:   Vec<String>,
    /// The window close button was pressed and dirty tabs are being resolved.
    quitting:      bool,
    allow_close:   bool,
}

impl ClipmarkApp {
    pub fn new(cc: &eframe::CreationContext<'_>, overrides: ConfigOverrides, files: Vec<PathBuf>) -> Self {
        configure_style(&cc.egui_ctx);
        // Pin to dark mode so egui doesn't swap visuals on OS theme changes.
        cc.egui_ctx.options_mut(|o| {
            o.theme_preference = egui::ThemePreference::Dark;
        });

        let stored = cc.storage
            .and_then(|s| eframe::get_value::<AppStorage>(s, eframe::APP_KEY))
            .unwrap_or_default();
        let config = overrides.apply(stored.config.clone());
        info!("[app] config {config:?}");

        let mut app = Self {
            stored_config: stored.config,
            opener:        Arc::new(FfmpegOpener { max_width: config.max_frame_width }),
            config,
            tabs:          Vec::new(),
            active:        None,
            recent:        stored.recent,
            open_errors:   Vec::new(),
            quitting:      false,
            allow_close:   false,
        };
        app.open_paths(files);
        app
    }

    fn open_paths(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            if let Some(tab) = self.tabs.iter().find(|t| t.nav.store().path() == path) {
                self.active = Some(tab.id);
                continue;
            }
            match AnnotationStore::load(&path) {
                Ok(store) => {
                    let nav = Navigator::new(store, self.config.clone(), Instant::now());
                    let tab = DocumentTab::new(nav, Arc::clone(&self.opener));
                    self.active = Some(tab.id);
                    self.tabs.push(tab);
                    self.remember(path);
                }
                Err(e) => {
                    warn!("[app] open {} failed: {e}", path.display());
                    self.open_errors.push(format!("{}: {e}", path.display()));
                }
            }
        }
    }

    fn remember(&mut self, path: PathBuf) {
        self.recent.retain(|p| *p != path);
        self.recent.insert(0, path);
        self.recent.truncate(MAX_RECENT);
    }

    fn active_tab_mut(&mut self) -> Option<&mut DocumentTab> {
        let id = self.active?;
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    fn push_active(&mut self, cmd: AnnotatorCommand) {
        if let Some(tab) = self.active_tab_mut() {
            tab.pending.push(cmd);
        }
    }

    fn pick_files(&mut self) {
        if let Some(paths) = FileDialog::new()
            .add_filter("Annotations", &["json"])
            .pick_files()
        {
            self.open_paths(paths);
        }
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (save, open, close) = ctx.input_mut(|i| (
            i.consume_key(Modifiers::COMMAND, Key::S),
            i.consume_key(Modifiers::COMMAND, Key::O),
            i.consume_key(Modifiers::COMMAND, Key::W),
        ));
        // Arrow keys step clips unless a text field has focus.
        let (left, right) = if ctx.wants_keyboard_input() {
            (false, false)
        } else {
            ctx.input(|i| (i.key_pressed(Key::ArrowLeft), i.key_pressed(Key::ArrowRight)))
        };

        if save  { self.push_active(AnnotatorCommand::Save); }
        if close { self.push_active(AnnotatorCommand::RequestClose); }
        if left  { self.push_active(AnnotatorCommand::StepLeft); }
        if right { self.push_active(AnnotatorCommand::StepRight); }
        if open  { self.pick_files(); }
    }

    /// Intercept the window close button while any document is dirty and
    /// route each one through its own Save / Discard / Cancel prompt.
    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) || self.allow_close {
            return;
        }
        if !self.tabs.iter().any(|t| t.nav.is_dirty()) {
            return;
        }
        ctx.send_viewport_cmd(ViewportCommand::CancelClose);
        self.quitting = true;
        for tab in self.tabs.iter_mut().filter(|t| t.nav.is_dirty()) {
            tab.pending.push(AnnotatorCommand::RequestClose);
        }
    }

    // ── Panels and dialogs ────────────────────────────────────────────────────

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        let mut to_open: Vec<PathBuf> = Vec::new();
        let mut pick = false;
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open…  (Ctrl+O)").clicked() {
                    pick = true;
                    ui.close_menu();
                }
                ui.add_enabled_ui(!self.recent.is_empty(), |ui| {
                    ui.menu_button("Open Recent", |ui| {
                        for path in &self.recent {
                            if ui.button(path.display().to_string()).clicked() {
                                to_open.push(path.clone());
                                ui.close_menu();
                            }
                        }
                    });
                });
                ui.separator();
                let has_tab = self.active.is_some();
                if ui.add_enabled(has_tab, egui::Button::new("Save  (Ctrl+S)")).clicked() {
                    self.push_active(AnnotatorCommand::Save);
                    ui.close_menu();
                }
                if ui.add_enabled(has_tab, egui::Button::new("Close  (Ctrl+W)")).clicked() {
                    self.push_active(AnnotatorCommand::RequestClose);
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    ui.ctx().send_viewport_cmd(ViewportCommand::Close);
                    ui.close_menu();
                }
            });

            ui.separator();
            ui.label(RichText::new("clipmark").strong().color(ACCENT));
        });

        if pick {
            self.pick_files();
        }
        self.open_paths(to_open);
    }

    fn tab_strip(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for tab in &mut self.tabs {
                let selected = self.active == Some(tab.id);
                let title = tab_title(tab.nav.store().path(), tab.nav.is_dirty());
                let resp = ui.selectable_label(selected, title)
                    .on_hover_text(tab.nav.store().path().display().to_string());
                if resp.clicked() {
                    self.active = Some(tab.id);
                }
                if ui.small_button("×").on_hover_text("Close").clicked() {
                    tab.pending.push(AnnotatorCommand::RequestClose);
                }
                ui.separator();
            }
        });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let Some(tab) = self.active_tab_mut() else {
                ui.label(RichText::new("Open an annotation file (Ctrl+O)").color(DARK_TEXT_DIM));
                return;
            };
            ui.label(RichText::new(tab.view.module().name()).strong());
            ui.separator();
            ui.label(format!("clip {} of {}", tab.nav.index() + 1, tab.nav.len()));
            if tab.nav.is_dirty() {
                ui.separator();
                ui.label(RichText::new("unsaved").color(WARNING));
            }
            ui.separator();
            // A failed save stays visible until a later save succeeds.
            match (tab.nav.save_error(), &tab.status) {
                (Some(err), _) => { ui.label(RichText::new(format!("Save failed: {err}")).color(WARNING)); }
                (None, Some((msg, true)))  => { ui.label(RichText::new(msg).color(WARNING)); }
                (None, Some((msg, false))) => { ui.label(RichText::new(msg).color(DARK_TEXT_DIM)); }
                (None, None) => {}
            }
        });
    }

    fn close_prompts(&mut self, ctx: &egui::Context) {
        for tab in &mut self.tabs {
            if !tab.nav.close_prompt() {
                continue;
            }
            let title = tab_title(tab.nav.store().path(), false);
            let mut choice = None;
            egui::Window::new("Unsaved changes")
                .id(egui::Id::new(("close_prompt", tab.id)))
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(format!("{title} has unsaved changes. Save before closing?"));
                    ui.add_space(6.0);
                    ui.horizontal(|ui| {
                        if ui.button("Save").clicked()    { choice = Some(CloseChoice::SaveAndClose); }
                        if ui.button("Discard").clicked() { choice = Some(CloseChoice::DiscardAndClose); }
                        if ui.button("Cancel").clicked()  { choice = Some(CloseChoice::Cancel); }
                    });
                });
            if let Some(c) = choice {
                tab.pending.push(AnnotatorCommand::ResolveClose(c));
            }
        }
    }

    fn error_dialog(&mut self, ctx: &egui::Context) {
        if self.open_errors.is_empty() {
            return;
        }
        let mut dismissed = false;
        egui::Window::new("Could not open")
            .collapsible(false)
            .resizable(true)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                    for e in &self.open_errors {
                        ui.label(RichText::new(e).monospace());
                        ui.separator();
                    }
                });
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.open_errors.clear();
        }
    }

    // ── Housekeeping ──────────────────────────────────────────────────────────

    /// Drop closed tabs, and finish a pending window close once every dirty
    /// document has been saved or discarded.
    fn reap_tabs(&mut self, ctx: &egui::Context) {
        self.tabs.retain_mut(|t| {
            if t.nav.is_closed() {
                t.shutdown();
                false
            } else {
                true
            }
        });
        if self.active.is_some_and(|id| !self.tabs.iter().any(|t| t.id == id)) {
            self.active = self.tabs.last().map(|t| t.id);
        }

        if self.quitting && !self.tabs.iter().any(|t| t.nav.close_prompt()) {
            self.quitting = false;
            // Still dirty means a prompt was cancelled or a save failed.
            if !self.tabs.iter().any(|t| t.nav.is_dirty()) {
                self.allow_close = true;
                ctx.send_viewport_cmd(ViewportCommand::Close);
            }
        }
    }

    fn schedule_repaint(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(tab) = self.active_tab_mut() else { return };
        let loading = tab.nav.viewers().iter().any(|(v, _)| tab.nav.is_loading(*v));
        let wake = match (tab.nav.next_wakeup(now), loading) {
            (Some(d), true)  => Some(d.min(LOADING_POLL)),
            (Some(d), false) => Some(d),
            (None, true)     => Some(LOADING_POLL),
            (None, false)    => None,
        };
        if let Some(d) = wake {
            ctx.request_repaint_after(d);
        }
    }
}

// ── eframe::App ───────────────────────────────────────────────────────────────

impl eframe::App for ClipmarkApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &AppStorage {
            config: self.stored_config.clone(),
            recent: self.recent.clone(),
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        for tab in &mut self.tabs {
            tab.shutdown();
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_close_request(ctx);
        self.handle_shortcuts(ctx);

        // ── Media: finished decodes, due loads, playback ──────────────────────
        for tab in &mut self.tabs {
            tab.ingest_results(now);
        }
        if let Some(tab) = self.active_tab_mut() {
            tab.tick(ctx, now);
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ui);
            if !self.tabs.is_empty() {
                ui.separator();
                self.tab_strip(ui);
            }
        });

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(26.0)
            .show(ctx, |ui| self.status_bar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.active_tab_mut() {
                Some(tab) => {
                    let DocumentTab { view, nav, textures, pending, .. } = tab;
                    view.module().ui(ui, nav, textures, pending);
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label(RichText::new("File → Open… to load a label or match document").color(DARK_TEXT_DIM));
                    });
                }
            }
        });

        self.close_prompts(ctx);
        self.error_dialog(ctx);

        // ── Process commands emitted this frame ───────────────────────────────
        for tab in &mut self.tabs {
            tab.process_commands(now);
        }
        self.reap_tabs(ctx);
        self.schedule_repaint(ctx, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_touch_given_fields() {
        let o = ConfigOverrides { fps: Some(12), max_frame_width: Some(320), ..Default::default() };
        let c = o.apply(AnnotatorConfig::default());
        assert_eq!(c.fps, 12);
        assert_eq!(c.max_frame_width, 320);
        assert_eq!(c.debounce_ms, 50);
        assert_eq!(c.max_target_viewers, 10);
    }

    #[test]
    fn storage_tolerates_missing_fields() {
        let s: AppStorage = serde_json::from_str(r#"{"recent": ["a.json"]}"#).unwrap();
        assert_eq!(s.recent, [PathBuf::from("a.json")]);
        assert_eq!(s.config, AnnotatorConfig::default());
    }
}
