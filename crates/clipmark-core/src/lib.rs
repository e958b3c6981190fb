// crates/clipmark-core/src/lib.rs
//
// Annotation state engine: data model, label algebra, persistence, playback
// and navigation. No egui, no ffmpeg; the shell and the media crate plug in
// through `media_types::ClipRequester` and the command/notice enums.

pub mod annotation;
pub mod color;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod error;
pub mod helpers;
pub mod labels;
pub mod media_types;
pub mod navigation;
pub mod playback;
pub mod store;

pub use annotation::{ClipRef, Document, LabelAnnotation, MatchAnnotation};
pub use commands::{AnnotatorCommand, CloseChoice, Notice};
pub use config::AnnotatorConfig;
pub use error::AnnotatorError;
pub use media_types::{ClipRequester, DecodedClip, Frame, LoadResult, RequestId, ViewerId};
pub use navigation::Navigator;
pub use store::{AnnotationStore, LabelOp};
