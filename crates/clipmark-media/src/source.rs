// crates/clipmark-media/src/source.rs
//
// The decoder seam. The loader only ever talks to these two traits, so tests
// can drive it with in-memory sources instead of real video files.

use std::path::Path;

use anyhow::Result;

use clipmark_core::media_types::Frame;

/// An opened video stream, read forward one frame at a time.
///
/// Frame indices are 0-based and counted at the stream's nominal rate.
pub trait FrameSource {
    /// Total frames in the stream.
    fn frame_count(&self) -> u64;

    /// Position the stream so the next `next_frame()` returns frame `index`.
    fn seek(&mut self, index: u64) -> Result<()>;

    /// The next frame and the index it actually carries, or `None` at end of
    /// stream. A decoder that drops frames shows up as a gap in the indices.
    fn next_frame(&mut self) -> Result<Option<(u64, Frame)>>;
}

/// Opens a `FrameSource` for a path. Shared by every loader worker, so it
/// must be thread-safe; the sources it returns stay on the worker that opened
/// them.
pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}
