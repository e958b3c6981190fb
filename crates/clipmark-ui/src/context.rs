// crates/clipmark-ui/src/context.rs
//
// Runtime handles for one open document. ClipmarkApp holds a Vec of these
// (one per tab) plus the persisted config.
//
//   DocumentTab
//     ├── nav       — Navigator (store, index, debounce, players)
//     ├── loader    — ClipLoader worker threads for this document's viewers
//     ├── textures  — GPU copy of each viewer's current frame
//     ├── view      — the labeler or matcher panel and its widget state
//     └── pending   — commands emitted by the panel this frame

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;
use tracing::debug;
use uuid::Uuid;

use clipmark_core::annotation::ClipRef;
use clipmark_core::commands::{AnnotatorCommand, Notice};
use clipmark_core::media_types::ViewerId;
use clipmark_core::playback::PlaybackEvent;
use clipmark_core::Navigator;
use clipmark_media::{ClipLoader, SourceOpener};

use crate::modules::{labeler::LabelerModule, matcher::MatcherModule, AnnotatorModule};

// ── FrameTextures ─────────────────────────────────────────────────────────────

/// Which frame of which clip a texture currently holds.
type Shown = (ClipRef, usize);

/// One texture per viewer, rewritten in place as the player's cursor moves.
/// Viewers without a player have no entry, so a stale frame is never drawn.
#[derive(Default)]
pub struct FrameTextures {
    shown: HashMap<ViewerId, (Shown, egui::TextureHandle)>,
}

impl FrameTextures {
    pub fn get(&self, viewer: ViewerId) -> Option<&egui::TextureHandle> {
        self.shown.get(&viewer).map(|(_, t)| t)
    }

    /// Upload a viewer's current frame when its player advanced this tick or
    /// when it holds a clip the GPU has not seen yet. Textures for viewers
    /// that lost their player are dropped.
    pub fn sync(
        &mut self,
        ctx:    &egui::Context,
        tab:    Uuid,
        nav:    &Navigator,
        events: &[(ViewerId, PlaybackEvent)],
    ) {
        let viewers: Vec<ViewerId> = nav.viewers().into_iter().map(|(v, _)| v).collect();
        self.shown.retain(|v, _| viewers.contains(v) && nav.player(*v).is_some());

        for viewer in viewers {
            let Some(player) = nav.player(viewer) else { continue };
            let advanced = events.iter().any(|(v, _)| *v == viewer);
            let fresh = !self.shown.get(&viewer)
                .is_some_and(|((clip, _), _)| *clip == player.clip().clip);
            if !advanced && !fresh {
                continue;
            }
            let Some(frame) = player.current_frame() else { continue };
            let key: Shown = (player.clip().clip.clone(), player.cursor());
            let image = egui::ColorImage::from_rgb(
                [frame.width as usize, frame.height as usize], &frame.data,
            );
            match self.shown.get_mut(&viewer) {
                Some((k, tex)) => {
                    tex.set(image, egui::TextureOptions::LINEAR);
                    *k = key;
                }
                None => {
                    let tex = ctx.load_texture(
                        format!("{tab}-{viewer:?}"), image, egui::TextureOptions::LINEAR,
                    );
                    self.shown.insert(viewer, (key, tex));
                }
            }
        }
    }

    #[cfg(test)]
    fn shown_cursor(&self, viewer: ViewerId) -> Option<usize> {
        self.shown.get(&viewer).map(|((_, cursor), _)| *cursor)
    }

    pub fn clear(&mut self) {
        self.shown.clear();
    }
}

// ── DocumentTab ───────────────────────────────────────────────────────────────

pub enum TabView {
    Label(LabelerModule),
    Match(MatcherModule),
}

impl TabView {
    pub fn module(&mut self) -> &mut dyn AnnotatorModule {
        match self {
            TabView::Label(m) => m,
            TabView::Match(m) => m,
        }
    }
}

pub struct DocumentTab {
    pub id:       Uuid,
    pub nav:      Navigator,
    pub loader:   ClipLoader,
    pub textures: FrameTextures,
    pub view:     TabView,
    pub pending:  Vec<AnnotatorCommand>,
    /// Last notice worth showing in the status bar.
    pub status:   Option<(String, bool)>,
}

impl DocumentTab {
    pub fn new(nav: Navigator, opener: Arc<dyn SourceOpener>) -> Self {
        let view = if nav.is_match() {
            TabView::Match(MatcherModule::default())
        } else {
            TabView::Label(LabelerModule::default())
        };
        Self {
            id:       Uuid::new_v4(),
            nav,
            loader:   ClipLoader::new(opener),
            textures: FrameTextures::default(),
            view,
            pending:  Vec::new(),
            status:   None,
        }
    }

    /// Hand finished decodes to the navigator.
    pub fn ingest_results(&mut self, now: Instant) {
        for result in self.loader.poll() {
            if let Some(notice) = self.nav.deliver(result, now) {
                self.note(notice);
            }
        }
    }

    /// Fire due loads, advance players and refresh textures.
    pub fn tick(&mut self, ctx: &egui::Context, now: Instant) {
        let events = self.nav.tick(now, &mut self.loader);
        self.textures.sync(ctx, self.id, &self.nav, &events);
    }

    /// Run everything the panel emitted this frame through the navigator.
    pub fn process_commands(&mut self, now: Instant) {
        let cmds: Vec<AnnotatorCommand> = self.pending.drain(..).collect();
        for cmd in cmds {
            debug!("[tab] {cmd:?}");
            let notices = self.nav.dispatch(cmd, now, &mut self.loader);
            for n in notices {
                self.note(n);
            }
        }
        if self.nav.is_closed() {
            self.textures.clear();
        }
    }

    pub fn shutdown(&mut self) {
        self.nav.shutdown(&mut self.loader);
        self.loader.shutdown();
        self.textures.clear();
    }

    fn note(&mut self, notice: Notice) {
        self.status = match notice {
            Notice::Saved(path)             => Some((format!("Saved → {}", path.display()), false)),
            Notice::SaveFailed(msg)         => Some((format!("Save failed: {msg}"), true)),
            Notice::LoadFailed { viewer, msg } => Some((format!("{viewer:?}: {msg}"), true)),
            Notice::Rejected(msg)           => Some((msg, true)),
            Notice::ConfirmClose | Notice::Closed => return,
        };
    }
}
