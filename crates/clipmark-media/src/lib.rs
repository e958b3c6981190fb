// crates/clipmark-media/src/lib.rs
//
// No egui dependency. Results reach clipmark-ui over a channel only.
//
// To plug in another decoder:
//   1. Implement `source::FrameSource` + `source::SourceOpener`
//   2. Hand the opener to `ClipLoader::new`

pub mod decode;
pub mod loader;
pub mod source;

mod helpers;

pub use decode::FfmpegOpener;
pub use loader::{decode_range, CancelToken, ClipLoader, DecodeOutcome};
pub use source::{FrameSource, SourceOpener};
