// crates/clipmark-media/src/loader.rs
//
// ClipLoader: one dedicated decode thread per viewer, at most.
//
// request() cancels and joins the viewer's previous worker before spawning
// the next, so two decodes never race for the same viewer. Workers poll a
// CancelToken between frames; a cancelled worker sends nothing. Results
// travel over a single channel and poll() discards any whose RequestId is no
// longer the live request for its viewer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use clipmark_core::annotation::ClipRef;
use clipmark_core::error::AnnotatorError;
use clipmark_core::media_types::{ClipRequester, DecodedClip, LoadResult, RequestId, ViewerId};

use crate::source::SourceOpener;

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Shared stop flag between the event loop and one worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Debug)]
pub enum DecodeOutcome {
    Complete(DecodedClip),
    /// The token fired; whatever was decoded so far has been dropped.
    Cancelled,
}

/// Decode exactly the frames `[start, end)` of `clip`.
///
/// Fails with `Decode` if the range runs past the stream's frame count, if
/// any frame fails or arrives out of sequence, or if the stream ends early.
/// A partial clip is never returned.
pub fn decode_range(
    opener: &dyn SourceOpener,
    clip:   &ClipRef,
    cancel: &CancelToken,
) -> Result<DecodeOutcome, AnnotatorError> {
    let fail = |msg: String| AnnotatorError::Decode { path: clip.path().to_path_buf(), msg };

    if cancel.is_cancelled() {
        return Ok(DecodeOutcome::Cancelled);
    }
    let mut source = opener.open(clip.path()).map_err(|e| fail(format!("{e:#}")))?;

    let available = source.frame_count();
    if clip.end_frame() > available {
        return Err(fail(format!(
            "frames {}..{} out of range (file has {available})",
            clip.start_frame(), clip.end_frame(),
        )));
    }
    source.seek(clip.start_frame()).map_err(|e| fail(format!("seek: {e:#}")))?;

    let wanted = clip.frame_count() as usize;
    let mut frames = Vec::with_capacity(wanted);
    while frames.len() < wanted {
        if cancel.is_cancelled() {
            return Ok(DecodeOutcome::Cancelled);
        }
        let index = clip.start_frame() + frames.len() as u64;
        match source.next_frame().map_err(|e| fail(format!("frame {index}: {e:#}")))? {
            Some((got, frame)) if got == index => frames.push(frame),
            Some((got, _)) => {
                return Err(fail(format!("expected frame {index}, decoder produced {got}")));
            }
            None => {
                return Err(fail(format!(
                    "stream ended at frame {index}, {} of {wanted} decoded",
                    frames.len(),
                )));
            }
        }
    }
    Ok(DecodeOutcome::Complete(DecodedClip { clip: clip.clone(), frames }))
}

// ── Loader ────────────────────────────────────────────────────────────────────

struct Worker {
    request: RequestId,
    cancel:  CancelToken,
    handle:  Option<JoinHandle<()>>,
}

pub struct ClipLoader {
    opener:  Arc<dyn SourceOpener>,
    /// Unbounded: a worker must never block on send while request() joins it.
    tx:      Sender<LoadResult>,
    rx:      Receiver<LoadResult>,
    workers: HashMap<ViewerId, Worker>,
    next_id: RequestId,
}

impl ClipLoader {
    pub fn new(opener: Arc<dyn SourceOpener>) -> Self {
        let (tx, rx) = unbounded();
        Self { opener, tx, rx, workers: HashMap::new(), next_id: 0 }
    }

    /// The live request for `viewer`, if a worker is running or has finished
    /// without its result being polled yet.
    pub fn live_request(&self, viewer: ViewerId) -> Option<RequestId> {
        self.workers.get(&viewer).map(|w| w.request)
    }

    /// Drain completed results, dropping any that were superseded.
    pub fn poll(&mut self) -> Vec<LoadResult> {
        let mut fresh = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            let viewer = result.viewer();
            if self.live_request(viewer) != Some(result.request()) {
                debug!("[loader] discard stale result {} for {viewer:?}", result.request());
                continue;
            }
            // The worker sent its one result and is exiting; reap it.
            if let Some(w) = self.workers.remove(&viewer) {
                join(viewer, w.handle);
            }
            fresh.push(result);
        }
        fresh
    }

    /// Cancel and join every worker.
    pub fn shutdown(&mut self) {
        let viewers: Vec<ViewerId> = self.workers.keys().copied().collect();
        for viewer in viewers {
            self.cancel(viewer);
        }
        while self.rx.try_recv().is_ok() {}
    }
}

impl ClipRequester for ClipLoader {
    fn request(&mut self, viewer: ViewerId, clip: ClipRef) -> RequestId {
        self.cancel(viewer);

        self.next_id += 1;
        let request = self.next_id;
        let cancel  = CancelToken::new();

        let opener = Arc::clone(&self.opener);
        let tx     = self.tx.clone();
        let token  = cancel.clone();
        let spawned = thread::Builder::new()
            .name(format!("clipmark-load-{request}"))
            .spawn(move || {
                let result = match decode_range(opener.as_ref(), &clip, &token) {
                    Ok(DecodeOutcome::Complete(decoded)) => LoadResult::Loaded { viewer, request, clip: decoded },
                    Ok(DecodeOutcome::Cancelled) => {
                        debug!("[loader] request {request} cancelled");
                        return;
                    }
                    Err(error) => LoadResult::Failed { viewer, request, error },
                };
                let _ = tx.send(result);
            });

        match spawned {
            Ok(handle) => {
                debug!("[loader] request {request} → {viewer:?}");
                self.workers.insert(viewer, Worker { request, cancel, handle: Some(handle) });
            }
            Err(e) => {
                warn!("[loader] could not spawn worker: {e}");
                // No thread to join, but the failure still has to reach poll().
                self.workers.insert(viewer, Worker { request, cancel, handle: None });
                let _ = self.tx.send(LoadResult::Failed {
                    viewer,
                    request,
                    error: AnnotatorError::Decode { path: Default::default(), msg: e.to_string() },
                });
            }
        }
        request
    }

    fn cancel(&mut self, viewer: ViewerId) {
        if let Some(w) = self.workers.remove(&viewer) {
            w.cancel.cancel();
            join(viewer, w.handle);
        }
    }
}

impl Drop for ClipLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join(viewer: ViewerId, handle: Option<JoinHandle<()>>) {
    if handle.is_some_and(|h| h.join().is_err()) {
        warn!("[loader] worker for {viewer:?} panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    use clipmark_core::media_types::Frame;

    use crate::source::FrameSource;

    /// In-memory stream whose frame `i` is a 1×1 pixel of value `i`.
    struct FakeSource {
        reported: u64,
        /// Frames actually readable; may be fewer than `reported`.
        real:     u64,
        pos:      u64,
        broken:   Option<u64>,
        /// Silently dropped, the way a concealing decoder loses a frame.
        dropped:  Option<u64>,
        delay:    Duration,
    }

    impl FrameSource for FakeSource {
        fn frame_count(&self) -> u64 { self.reported }

        fn seek(&mut self, index: u64) -> anyhow::Result<()> {
            self.pos = index;
            Ok(())
        }

        fn next_frame(&mut self) -> anyhow::Result<Option<(u64, Frame)>> {
            thread::sleep(self.delay);
            if self.dropped == Some(self.pos) {
                self.pos += 1;
            }
            if self.broken == Some(self.pos) {
                anyhow::bail!("corrupt frame");
            }
            if self.pos >= self.real {
                return Ok(None);
            }
            let index = self.pos;
            self.pos += 1;
            Ok(Some((index, Frame { width: 1, height: 1, data: vec![index as u8; 3] })))
        }
    }

    struct FakeOpener {
        reported: u64,
        real:     u64,
        broken:   Option<u64>,
        dropped:  Option<u64>,
        delay:    Duration,
        opened:   AtomicUsize,
    }

    impl FakeOpener {
        fn new(frames: u64) -> Self {
            Self {
                reported: frames,
                real:     frames,
                broken:   None,
                dropped:  None,
                delay:    Duration::ZERO,
                opened:   AtomicUsize::new(0),
            }
        }

        fn slow(frames: u64, per_frame: Duration) -> Self {
            Self { delay: per_frame, ..Self::new(frames) }
        }
    }

    impl SourceOpener for FakeOpener {
        fn open(&self, path: &Path) -> anyhow::Result<Box<dyn FrameSource>> {
            if path.to_str() == Some("missing.mp4") {
                anyhow::bail!("no such file");
            }
            self.opened.fetch_add(1, Ordering::Relaxed);
            Ok(Box::new(FakeSource {
                reported: self.reported,
                real:     self.real,
                pos:      0,
                broken:   self.broken,
                dropped:  self.dropped,
                delay:    self.delay,
            }))
        }
    }

    fn clip(start: u64, end: u64) -> ClipRef {
        ClipRef::new("a.mp4", start, end).unwrap()
    }

    fn complete(outcome: Result<DecodeOutcome, AnnotatorError>) -> DecodedClip {
        match outcome {
            Ok(DecodeOutcome::Complete(c)) => c,
            other => panic!("expected a complete decode, got {other:?}"),
        }
    }

    /// Poll until `n` results arrive or two seconds pass.
    fn wait_for(loader: &mut ClipLoader, n: usize) -> Vec<LoadResult> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut out = Vec::new();
        while out.len() < n && Instant::now() < deadline {
            out.extend(loader.poll());
            thread::sleep(Duration::from_millis(1));
        }
        out
    }

    #[test]
    fn decodes_exact_range() {
        let decoded = complete(decode_range(&FakeOpener::new(100), &clip(10, 15), &CancelToken::new()));
        assert_eq!(decoded.len(), 5);
        let firsts: Vec<u8> = decoded.frames.iter().map(|f| f.data[0]).collect();
        assert_eq!(firsts, [10, 11, 12, 13, 14]);
    }

    #[test]
    fn range_past_end_fails() {
        let err = decode_range(&FakeOpener::new(20), &clip(15, 21), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnnotatorError::Decode { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn range_ending_on_last_frame_is_fine() {
        let decoded = complete(decode_range(&FakeOpener::new(20), &clip(15, 20), &CancelToken::new()));
        assert_eq!(decoded.len(), 5);
    }

    #[test]
    fn short_stream_fails_instead_of_truncating() {
        let opener = FakeOpener { real: 12, ..FakeOpener::new(100) };
        let err = decode_range(&opener, &clip(10, 15), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("stream ended at frame 12"));
    }

    #[test]
    fn broken_frame_fails_whole_request() {
        let opener = FakeOpener { broken: Some(13), ..FakeOpener::new(100) };
        let err = decode_range(&opener, &clip(10, 15), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("frame 13"));
    }

    #[test]
    fn dropped_frame_fails_instead_of_shifting() {
        let opener = FakeOpener { dropped: Some(12), ..FakeOpener::new(100) };
        let err = decode_range(&opener, &clip(10, 15), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnnotatorError::Decode { .. }));
        assert!(err.to_string().contains("expected frame 12"));
    }

    #[test]
    fn seek_landing_late_fails() {
        // Frame 10 is lost to the seek; the first frame out is 11.
        let opener = FakeOpener { dropped: Some(10), ..FakeOpener::new(100) };
        let err = decode_range(&opener, &clip(10, 15), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("expected frame 10"));
    }

    #[test]
    fn open_failure_is_decode_error() {
        let c = ClipRef::new("missing.mp4", 0, 1).unwrap();
        let err = decode_range(&FakeOpener::new(10), &c, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, AnnotatorError::Decode { .. }));
    }

    #[test]
    fn cancelled_token_stops_before_opening() {
        let opener = FakeOpener::new(10);
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(decode_range(&opener, &clip(0, 5), &token), Ok(DecodeOutcome::Cancelled)));
        assert_eq!(opener.opened.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn loader_delivers_result() {
        let mut loader = ClipLoader::new(Arc::new(FakeOpener::new(50)));
        let id = loader.request(ViewerId::Main, clip(0, 3));
        let results = wait_for(&mut loader, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].request(), id);
        assert!(matches!(&results[0], LoadResult::Loaded { clip, .. } if clip.len() == 3));
        assert_eq!(loader.live_request(ViewerId::Main), None);
    }

    #[test]
    fn superseded_request_never_delivered() {
        let mut loader = ClipLoader::new(Arc::new(FakeOpener::slow(100, Duration::from_millis(2))));
        let old = loader.request(ViewerId::Main, clip(0, 40));
        let new = loader.request(ViewerId::Main, clip(50, 53));
        assert_ne!(old, new);

        let results = wait_for(&mut loader, 1);
        thread::sleep(Duration::from_millis(20));
        let mut all = results;
        all.extend(loader.poll());
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].request(), new);
        match &all[0] {
            LoadResult::Loaded { clip: decoded, .. } => assert_eq!(decoded.clip, clip(50, 53)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancel_joins_and_emits_nothing() {
        let mut loader = ClipLoader::new(Arc::new(FakeOpener::slow(100, Duration::from_millis(2))));
        loader.request(ViewerId::Query, clip(0, 80));
        loader.cancel(ViewerId::Query);
        assert_eq!(loader.live_request(ViewerId::Query), None);
        thread::sleep(Duration::from_millis(10));
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn viewers_are_independent() {
        let mut loader = ClipLoader::new(Arc::new(FakeOpener::new(50)));
        let q  = loader.request(ViewerId::Query, clip(0, 2));
        let t0 = loader.request(ViewerId::Target(0), clip(2, 4));
        let t1 = loader.request(ViewerId::Target(1), clip(40, 60));
        let mut ids: Vec<_> = wait_for(&mut loader, 3).iter().map(LoadResult::request).collect();
        ids.sort();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&q) && ids.contains(&t0) && ids.contains(&t1));
    }

    #[test]
    fn failure_is_delivered_with_request_id() {
        let mut loader = ClipLoader::new(Arc::new(FakeOpener::new(10)));
        let id = loader.request(ViewerId::Main, clip(5, 20));
        let results = wait_for(&mut loader, 1);
        assert!(matches!(
            &results[..],
            [LoadResult::Failed { request, error: AnnotatorError::Decode { .. }, .. }] if *request == id
        ));
    }

    #[test]
    fn shutdown_stops_everything() {
        let mut loader = ClipLoader::new(Arc::new(FakeOpener::slow(100, Duration::from_millis(2))));
        loader.request(ViewerId::Query, clip(0, 90));
        loader.request(ViewerId::Target(3), clip(0, 90));
        loader.shutdown();
        assert_eq!(loader.live_request(ViewerId::Query), None);
        assert_eq!(loader.live_request(ViewerId::Target(3)), None);
        assert!(loader.poll().is_empty());
    }
}
