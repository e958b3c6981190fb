// crates/clipmark-core/src/media_types.rs
//
// Types that flow between clipmark-media worker threads and the event loop.
// No egui, no ffmpeg. Just plain data.

use crate::annotation::ClipRef;
use crate::error::AnnotatorError;

/// One on-screen clip player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewerId {
    /// The single viewer of a label document.
    Main,
    /// The query clip of a match document.
    Query,
    /// Target `i` of the current match entry.
    Target(usize),
}

/// Monotonic per-loader id. A result is only accepted if its id is still the
/// live request for that viewer.
pub type RequestId = u64;

/// A decoded frame: packed RGB24, no stride padding.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width:  u32,
    pub height: u32,
    pub data:   Vec<u8>,
}

impl Frame {
    /// Expected `data` length for a `width × height` RGB frame.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Every frame of `clip`, in order, exactly `clip.frame_count()` of them.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedClip {
    pub clip:   ClipRef,
    pub frames: Vec<Frame>,
}

impl DecodedClip {
    pub fn len(&self) -> usize { self.frames.len() }
    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    /// Approximate resident size, for logging.
    pub fn byte_size(&self) -> usize {
        self.frames.iter().map(|f| f.data.len()).sum()
    }
}

/// Completion sent by a loader worker. Cancelled workers send nothing.
#[derive(Debug)]
pub enum LoadResult {
    Loaded { viewer: ViewerId, request: RequestId, clip: DecodedClip },
    Failed { viewer: ViewerId, request: RequestId, error: AnnotatorError },
}

impl LoadResult {
    pub fn viewer(&self) -> ViewerId {
        match self {
            LoadResult::Loaded { viewer, .. } | LoadResult::Failed { viewer, .. } => *viewer,
        }
    }

    pub fn request(&self) -> RequestId {
        match self {
            LoadResult::Loaded { request, .. } | LoadResult::Failed { request, .. } => *request,
        }
    }
}

/// The seam between navigation and decoding. Implemented by
/// `clipmark_media::ClipLoader`; tests use a recording fake.
pub trait ClipRequester {
    /// Start decoding `clip` for `viewer`, superseding any earlier request for
    /// the same viewer. The earlier worker must be stopped before this returns.
    fn request(&mut self, viewer: ViewerId, clip: ClipRef) -> RequestId;

    /// Stop the in-flight request for `viewer`, if any, and wait for it.
    fn cancel(&mut self, viewer: ViewerId);
}
