// crates/clipmark-core/src/navigation.rs
//
// Navigator: the one place user intent turns into state changes.
//
// Every AnnotatorCommand goes through dispatch(). Index changes take effect
// immediately for everything cheap (index, metadata text, labels) and defer
// the expensive part, decoding, behind a debounce so scrubbing the slider
// coalesces into a single load for wherever the user stops.
//
// Per-viewer ordering on an index change:
//   1. the pending debounce is replaced
//   2. every in-flight decode is cancelled (the loader joins the worker)
//   3. every player is dropped, releasing its frames
//   4. after the quiet period, one request per viewer is issued
// Results carrying a RequestId that is no longer live are discarded, so a
// superseded clip can never reach a player.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::annotation::{ClipRef, Document, MatchAnnotation};
use crate::commands::{AnnotatorCommand, CloseChoice, Notice};
use crate::config::AnnotatorConfig;
use crate::debounce::Debouncer;
use crate::error::AnnotatorError;
use crate::helpers::format::{clip_metadata, match_metadata};
use crate::media_types::{ClipRequester, LoadResult, RequestId, ViewerId};
use crate::playback::{PlaybackEvent, PlaybackScheduler};
use crate::store::{AnnotationStore, LabelOp};

pub struct Navigator {
    store:        AnnotationStore,
    config:       AnnotatorConfig,
    index:        usize,
    /// Cached union of every label, recomputed after each label mutation.
    vocabulary:   Vec<String>,
    pending_load: Debouncer<usize>,
    /// Requests issued and not yet delivered, per viewer.
    live:         BTreeMap<ViewerId, RequestId>,
    players:      BTreeMap<ViewerId, PlaybackScheduler>,
    /// Last save failure, cleared by the next successful save.
    save_error:   Option<String>,
    close_prompt: bool,
    closed:       bool,
}

impl Navigator {
    /// Open at the store's resume index (clamped into range) and schedule the
    /// first load.
    pub fn new(store: AnnotationStore, config: AnnotatorConfig, now: Instant) -> Self {
        let index = clamp_index(store.resume_index(), store.len());
        let vocabulary = store.unique_labels();
        let mut pending_load = Debouncer::new(config.debounce());
        if !store.is_empty() {
            pending_load.schedule(index, now);
        }
        info!("[nav] opened {} at clip {index}/{}", store.path().display(), store.len());
        Self {
            store,
            config,
            index,
            vocabulary,
            pending_load,
            live:         BTreeMap::new(),
            players:      BTreeMap::new(),
            save_error:   None,
            close_prompt: false,
            closed:       false,
        }
    }

    // ── Read-only state for the shell ─────────────────────────────────────────

    pub fn store(&self) -> &AnnotationStore { &self.store }
    pub fn config(&self) -> &AnnotatorConfig { &self.config }
    pub fn index(&self) -> usize { self.index }
    pub fn len(&self) -> usize { self.store.len() }
    pub fn is_empty(&self) -> bool { self.store.is_empty() }
    pub fn vocabulary(&self) -> &[String] { &self.vocabulary }
    pub fn current_labels(&self) -> &[String] { self.store.labels_at(self.index) }
    pub fn is_dirty(&self) -> bool { self.store.is_dirty() }
    pub fn save_error(&self) -> Option<&str> { self.save_error.as_deref() }
    pub fn close_prompt(&self) -> bool { self.close_prompt }
    pub fn is_closed(&self) -> bool { self.closed }

    pub fn is_match(&self) -> bool {
        matches!(self.store.document(), Document::Match(_))
    }

    pub fn current_match(&self) -> Option<&MatchAnnotation> {
        match self.store.document() {
            Document::Match(a) => a.get(self.index),
            Document::Label(_) => None,
        }
    }

    pub fn metadata_text(&self) -> String {
        match self.store.document() {
            Document::Label(a) => a.get(self.index)
                .map(|e| clip_metadata(self.index, &e.clip))
                .unwrap_or_default(),
            Document::Match(a) => a.get(self.index)
                .map(|e| match_metadata(self.index, e))
                .unwrap_or_default(),
        }
    }

    /// The viewers the current entry needs, with the clip each one shows.
    pub fn viewers(&self) -> Vec<(ViewerId, ClipRef)> {
        self.viewers_for(self.index)
    }

    pub fn player(&self, viewer: ViewerId) -> Option<&PlaybackScheduler> {
        self.players.get(&viewer)
    }

    /// True while `viewer` has a decode in flight or queued behind the debounce.
    pub fn is_loading(&self, viewer: ViewerId) -> bool {
        self.live.contains_key(&viewer) || (self.pending_load.is_pending() && !self.players.contains_key(&viewer))
    }

    /// How long the event loop may sleep before something needs a tick.
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        let debounce = self.pending_load.deadline().map(|d| d.saturating_duration_since(now));
        let playback = self.players.values().map(|p| p.time_until_next(now)).min();
        match (debounce, playback) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ── Event loop entry points ───────────────────────────────────────────────

    /// Fire the debounced load if its quiet period has passed, then advance
    /// every player.
    pub fn tick(&mut self, now: Instant, loader: &mut dyn ClipRequester) -> Vec<(ViewerId, PlaybackEvent)> {
        if self.closed {
            return Vec::new();
        }
        if let Some(index) = self.pending_load.poll(now) {
            for (viewer, clip) in self.viewers_for(index) {
                debug!("[nav] load {viewer:?} ← {} ({} - {})",
                    clip.path().display(), clip.start_frame(), clip.end_frame());
                let id = loader.request(viewer, clip);
                self.live.insert(viewer, id);
            }
        }
        self.players.iter_mut()
            .filter_map(|(v, p)| p.tick(now).map(|e| (*v, e)))
            .collect()
    }

    /// Accept a finished decode. Results for superseded requests are dropped.
    pub fn deliver(&mut self, result: LoadResult, now: Instant) -> Option<Notice> {
        let viewer = result.viewer();
        if self.live.get(&viewer) != Some(&result.request()) {
            debug!("[nav] drop stale result for {viewer:?} (request {})", result.request());
            return None;
        }
        self.live.remove(&viewer);
        match result {
            LoadResult::Loaded { clip, .. } => {
                debug!("[nav] {viewer:?} ready: {} frames, {} KiB", clip.len(), clip.byte_size() / 1024);
                let player = PlaybackScheduler::start(clip, self.config.frame_interval(), now);
                self.players.insert(viewer, player);
                None
            }
            LoadResult::Failed { error, .. } => {
                warn!("[nav] {viewer:?} load failed: {error}");
                self.players.remove(&viewer);
                Some(Notice::LoadFailed { viewer, msg: error.to_string() })
            }
        }
    }

    /// Apply one user command.
    pub fn dispatch(&mut self, cmd: AnnotatorCommand, now: Instant, loader: &mut dyn ClipRequester) -> Vec<Notice> {
        if self.closed {
            return Vec::new();
        }
        let mut notices = Vec::new();
        match cmd {
            // ── Navigation ───────────────────────────────────────────────────
            AnnotatorCommand::SetIndex(i) => self.set_index(i, now, loader),
            AnnotatorCommand::StepLeft => {
                self.set_index(self.index.saturating_sub(1), now, loader);
            }
            AnnotatorCommand::StepRight => {
                self.set_index(self.index.saturating_add(1), now, loader);
            }
            AnnotatorCommand::NextInstance(label) => {
                match self.store.next_instance(self.index, &label) {
                    Some(i) => self.set_index(i, now, loader),
                    None => notices.push(Notice::Rejected(format!("no later clip labeled \"{label}\""))),
                }
            }
            AnnotatorCommand::PrevInstance(label) => {
                match self.store.prev_instance(self.index, &label) {
                    Some(i) => self.set_index(i, now, loader),
                    None => notices.push(Notice::Rejected(format!("no earlier clip labeled \"{label}\""))),
                }
            }

            // ── Labels ───────────────────────────────────────────────────────
            AnnotatorCommand::AddLabel(label) => {
                notices.extend(self.mutate(LabelOp::Add(label)));
            }
            AnnotatorCommand::RemoveLabel(label) => {
                notices.extend(self.mutate(LabelOp::Remove(label)));
            }
            AnnotatorCommand::RenameLabel { old, new } => {
                if new.is_empty() || new == old {
                    return notices;
                }
                notices.extend(self.mutate(LabelOp::RenameEverywhere { old, new }));
            }
            AnnotatorCommand::DeleteLabel(label) => {
                notices.extend(self.mutate(LabelOp::DeleteEverywhere(label)));
            }

            // ── Matching ─────────────────────────────────────────────────────
            AnnotatorCommand::ClassifyTarget { target, similar } => {
                if let Err(e) = self.store.classify_target(self.index, target, similar) {
                    notices.push(Notice::Rejected(e.to_string()));
                }
            }

            // ── Document ─────────────────────────────────────────────────────
            AnnotatorCommand::Save => notices.push(self.save()),
            AnnotatorCommand::RequestClose => {
                if self.store.is_dirty() {
                    self.close_prompt = true;
                    notices.push(Notice::ConfirmClose);
                } else {
                    notices.push(self.close(loader));
                }
            }
            AnnotatorCommand::ResolveClose(choice) => {
                self.close_prompt = false;
                match choice {
                    CloseChoice::SaveAndClose => match self.save() {
                        saved @ Notice::Saved(_) => {
                            notices.push(saved);
                            notices.push(self.close(loader));
                        }
                        failed => notices.push(failed),
                    },
                    CloseChoice::DiscardAndClose => notices.push(self.close(loader)),
                    CloseChoice::Cancel => {}
                }
            }
        }
        notices
    }

    /// Cancel everything in flight. Called on shutdown.
    pub fn shutdown(&mut self, loader: &mut dyn ClipRequester) {
        self.pending_load.cancel();
        for viewer in std::mem::take(&mut self.live).into_keys() {
            loader.cancel(viewer);
        }
        self.players.clear();
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn set_index(&mut self, requested: usize, now: Instant, loader: &mut dyn ClipRequester) {
        if self.store.is_empty() {
            return;
        }
        let index = clamp_index(requested, self.store.len());
        if index == self.index && (self.pending_load.is_pending() || !self.live.is_empty() || !self.players.is_empty()) {
            return;
        }
        self.index = index;
        self.pending_load.cancel();
        for viewer in std::mem::take(&mut self.live).into_keys() {
            loader.cancel(viewer);
        }
        self.players.clear();
        self.pending_load.schedule(index, now);
    }

    fn mutate(&mut self, op: LabelOp) -> Option<Notice> {
        let result = self.store.mutate_label(self.index, op);
        self.vocabulary = self.store.unique_labels();
        match result {
            Ok(()) => {
                self.save_error = None;
                Some(Notice::Saved(self.store.path().to_path_buf()))
            }
            Err(e) => Some(self.report(e)),
        }
    }

    fn save(&mut self) -> Notice {
        match self.store.save() {
            Ok(()) => {
                self.save_error = None;
                Notice::Saved(self.store.path().to_path_buf())
            }
            Err(e) => self.report(e),
        }
    }

    fn report(&mut self, e: AnnotatorError) -> Notice {
        match e {
            AnnotatorError::Io { .. } => {
                let msg = e.to_string();
                warn!("[nav] save failed: {msg}");
                self.save_error = Some(msg.clone());
                Notice::SaveFailed(msg)
            }
            other => Notice::Rejected(other.to_string()),
        }
    }

    fn close(&mut self, loader: &mut dyn ClipRequester) -> Notice {
        self.shutdown(loader);
        self.closed = true;
        info!("[nav] closed {}", self.store.path().display());
        Notice::Closed
    }

    fn viewers_for(&self, index: usize) -> Vec<(ViewerId, ClipRef)> {
        match self.store.document() {
            Document::Label(a) => a.get(index)
                .map(|e| vec![(ViewerId::Main, e.clip.clone())])
                .unwrap_or_default(),
            Document::Match(a) => a.get(index)
                .map(|e| {
                    std::iter::once((ViewerId::Query, e.query.clone()))
                        .chain(
                            e.targets().iter()
                                .take(self.config.max_target_viewers)
                                .enumerate()
                                .map(|(i, t)| (ViewerId::Target(i), t.clone())),
                        )
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}
