// crates/clipmark-core/src/helpers/format.rs
//
// Human-readable clip descriptions for the metadata panel.

use crate::annotation::{ClipRef, MatchAnnotation};

/// Three-line description of a label-document clip.
///
/// ```
/// use clipmark_core::annotation::ClipRef;
/// use clipmark_core::helpers::format::clip_metadata;
/// let c = ClipRef::new("a.mp4", 0, 10).unwrap();
/// assert_eq!(clip_metadata(3, &c), "Clip index: 3\nPath: a.mp4\nFrames: (0 - 10)");
/// ```
pub fn clip_metadata(index: usize, clip: &ClipRef) -> String {
    format!(
        "Clip index: {index}\nPath: {}\nFrames: ({} - {})",
        clip.path().display(), clip.start_frame(), clip.end_frame(),
    )
}

/// Single-line description of a match entry's query plus a classification
/// tally, so the header doesn't grow with the target grid.
pub fn match_metadata(index: usize, entry: &MatchAnnotation) -> String {
    let q = &entry.query;
    format!(
        "Clip index = {index}, Path = {}, Frames = ({} - {}) · {} targets, {} similar, {} dissimilar",
        q.path().display(), q.start_frame(), q.end_frame(),
        entry.targets().len(), entry.similar().len(), entry.dissimilar().len(),
    )
}

/// One metadata value rendered compactly: strings unquoted, everything else
/// as JSON.
pub fn metadata_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
