// crates/clipmark-core/src/annotation.rs
//
// Pure annotation data: no egui, no ffmpeg, no runtime handles.
//
// The persisted form is positional JSON (tuples, not objects). Each record type
// round-trips through a private tuple type via `#[serde(try_from, into)]`, which
// is also where parse-time invariants are enforced:
//   ClipRef          — start < end
//   LabelAnnotation  — labels sorted + de-duplicated on the way in
//   MatchAnnotation  — metadata aligned with targets, similar ∩ dissimilar = ∅,
//                      every classified index points at a real target

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::labels;

/// Free-form per-target metadata as stored in match documents.
pub type Metadata = Map<String, Value>;

// ── ClipRef ───────────────────────────────────────────────────────────────────

/// Half-open frame range `[start_frame, end_frame)` inside one video file.
///
/// Whether `end_frame` fits inside the file is only known once the file is
/// opened for decoding, so that check lives in the loader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(PathBuf, u64, u64)", into = "(PathBuf, u64, u64)")]
pub struct ClipRef {
    path:        PathBuf,
    start_frame: u64,
    end_frame:   u64,
}

impl ClipRef {
    /// Returns `None` when the range is empty or inverted.
    pub fn new(path: impl Into<PathBuf>, start_frame: u64, end_frame: u64) -> Option<Self> {
        (start_frame < end_frame).then(|| Self { path: path.into(), start_frame, end_frame })
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn start_frame(&self) -> u64 { self.start_frame }
    pub fn end_frame(&self) -> u64 { self.end_frame }

    /// Number of frames in the range. Always at least 1.
    pub fn frame_count(&self) -> u64 { self.end_frame - self.start_frame }
}

impl TryFrom<(PathBuf, u64, u64)> for ClipRef {
    type Error = String;

    fn try_from((path, start, end): (PathBuf, u64, u64)) -> Result<Self, Self::Error> {
        ClipRef::new(path.clone(), start, end).ok_or_else(|| {
            format!("clip {} has an empty frame range ({start} - {end})", path.display())
        })
    }
}

impl From<ClipRef> for (PathBuf, u64, u64) {
    fn from(c: ClipRef) -> Self {
        (c.path, c.start_frame, c.end_frame)
    }
}

// ── LabelAnnotation ───────────────────────────────────────────────────────────

/// One clip plus its free-text labels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LabelTuple", into = "LabelTuple")]
pub struct LabelAnnotation {
    pub clip: ClipRef,
    labels:   Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct LabelTuple(PathBuf, u64, u64, Vec<String>);

impl LabelAnnotation {
    pub fn new(clip: ClipRef, labels: Vec<String>) -> Self {
        Self { clip, labels: labels::normalize(labels) }
    }

    /// Sorted, duplicate-free.
    pub fn labels(&self) -> &[String] { &self.labels }

    pub fn is_labeled(&self) -> bool { !self.labels.is_empty() }

    /// Replace the label list. Callers go through `labels::*`, which already
    /// returns normalized output; normalizing again keeps the invariant local.
    pub(crate) fn set_labels(&mut self, labels: Vec<String>) {
        self.labels = labels::normalize(labels);
    }
}

impl TryFrom<LabelTuple> for LabelAnnotation {
    type Error = String;

    fn try_from(LabelTuple(path, start, end, labels): LabelTuple) -> Result<Self, Self::Error> {
        let clip = ClipRef::try_from((path, start, end))?;
        Ok(Self::new(clip, labels))
    }
}

impl From<LabelAnnotation> for LabelTuple {
    fn from(a: LabelAnnotation) -> Self {
        let (path, start, end) = a.clip.into();
        LabelTuple(path, start, end, a.labels)
    }
}

// ── MatchAnnotation ───────────────────────────────────────────────────────────

/// A query clip and the targets it is compared against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatchTuple", into = "MatchTuple")]
pub struct MatchAnnotation {
    pub query:       ClipRef,
    targets:         Vec<ClipRef>,
    target_metadata: Vec<Metadata>,
    similar:         BTreeSet<usize>,
    dissimilar:      BTreeSet<usize>,
}

#[derive(Serialize, Deserialize)]
struct MatchTuple(
    ClipRef,
    Vec<ClipRef>,
    #[serde(default)] Vec<Metadata>,
    #[serde(default)] BTreeSet<usize>,
    #[serde(default)] BTreeSet<usize>,
);

/// How a single target is currently classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Unclassified,
    Similar,
    Dissimilar,
}

impl MatchAnnotation {
    /// Builds an unclassified entry. Missing metadata is padded with empty maps.
    pub fn new(query: ClipRef, targets: Vec<ClipRef>, mut target_metadata: Vec<Metadata>) -> Option<Self> {
        if target_metadata.is_empty() {
            target_metadata = vec![Metadata::new(); targets.len()];
        }
        if target_metadata.len() != targets.len() {
            return None;
        }
        Some(Self {
            query,
            targets,
            target_metadata,
            similar:    BTreeSet::new(),
            dissimilar: BTreeSet::new(),
        })
    }

    pub fn targets(&self) -> &[ClipRef] { &self.targets }
    pub fn target_metadata(&self) -> &[Metadata] { &self.target_metadata }
    pub fn similar(&self) -> &BTreeSet<usize> { &self.similar }
    pub fn dissimilar(&self) -> &BTreeSet<usize> { &self.dissimilar }

    pub fn is_classified(&self) -> bool {
        !self.similar.is_empty() || !self.dissimilar.is_empty()
    }

    pub fn classification(&self, target: usize) -> Classification {
        if self.similar.contains(&target) {
            Classification::Similar
        } else if self.dissimilar.contains(&target) {
            Classification::Dissimilar
        } else {
            Classification::Unclassified
        }
    }

    /// Toggle `target` into `similar` (or `dissimilar`). Clicking the side it
    /// is already on clears it. The opposite set is always cleared first.
    ///
    /// Returns `false` when `target` is out of range.
    pub(crate) fn toggle(&mut self, target: usize, as_similar: bool) -> bool {
        if target >= self.targets.len() {
            return false;
        }
        let (this, other) = if as_similar {
            (&mut self.similar, &mut self.dissimilar)
        } else {
            (&mut self.dissimilar, &mut self.similar)
        };
        other.remove(&target);
        if !this.remove(&target) {
            this.insert(target);
        }
        true
    }
}

impl TryFrom<MatchTuple> for MatchAnnotation {
    type Error = String;

    fn try_from(t: MatchTuple) -> Result<Self, Self::Error> {
        let MatchTuple(query, targets, metadata, similar, dissimilar) = t;
        let n_targets = targets.len();
        let n_meta    = metadata.len();
        let mut entry = MatchAnnotation::new(query, targets, metadata).ok_or_else(|| {
            format!("{n_meta} metadata objects for {n_targets} targets")
        })?;
        if let Some(i) = similar.intersection(&dissimilar).next() {
            return Err(format!("target {i} is both similar and dissimilar"));
        }
        if let Some(i) = similar.iter().chain(dissimilar.iter()).find(|&&i| i >= n_targets) {
            return Err(format!("classified target {i} out of range (0..{n_targets})"));
        }
        entry.similar    = similar;
        entry.dissimilar = dissimilar;
        Ok(entry)
    }
}

impl From<MatchAnnotation> for MatchTuple {
    fn from(m: MatchAnnotation) -> Self {
        MatchTuple(m.query, m.targets, m.target_metadata, m.similar, m.dissimilar)
    }
}

// ── Document ──────────────────────────────────────────────────────────────────

/// The whole annotation file. The variant is decided once at load and never
/// changes for the lifetime of the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "annotations", rename_all = "lowercase")]
pub enum Document {
    Label(Vec<LabelAnnotation>),
    Match(Vec<MatchAnnotation>),
}

impl Document {
    pub fn len(&self) -> usize {
        match self {
            Document::Label(a) => a.len(),
            Document::Match(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn kind(&self) -> &'static str {
        match self {
            Document::Label(_) => "label",
            Document::Match(_) => "match",
        }
    }

    /// Every clip the document refers to, query clips included.
    pub fn clips(&self) -> Box<dyn Iterator<Item = &ClipRef> + '_> {
        match self {
            Document::Label(a) => Box::new(a.iter().map(|e| &e.clip)),
            Document::Match(a) => Box::new(
                a.iter().flat_map(|e| std::iter::once(&e.query).chain(e.targets.iter())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(path: &str, s: u64, e: u64) -> ClipRef {
        ClipRef::new(path, s, e).unwrap()
    }

    #[test]
    fn clip_ref_rejects_empty_range() {
        assert!(ClipRef::new("a.mp4", 5, 5).is_none());
        assert!(ClipRef::new("a.mp4", 6, 5).is_none());
        assert_eq!(clip("a.mp4", 0, 10).frame_count(), 10);
    }

    #[test]
    fn label_entry_is_tuple_on_disk() {
        let e = LabelAnnotation::new(clip("a.mp4", 0, 10), vec!["dog".into(), "cat".into()]);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"["a.mp4",0,10,["cat","dog"]]"#);
    }

    #[test]
    fn label_entry_normalizes_on_parse() {
        let e: LabelAnnotation =
            serde_json::from_str(r#"["a.mp4",0,10,["dog","cat","dog"]]"#).unwrap();
        assert_eq!(e.labels(), ["cat", "dog"]);
    }

    #[test]
    fn document_tagged_form() {
        let json = r#"{"type":"label","annotations":[["a.mp4",0,10,[]]]}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.kind(), "label");
        assert_eq!(doc.len(), 1);
        assert_eq!(serde_json::to_string(&doc).unwrap(), json);
    }

    #[test]
    fn unknown_document_type_fails() {
        let json = r#"{"type":"bogus","annotations":[]}"#;
        assert!(serde_json::from_str::<Document>(json).is_err());
    }

    #[test]
    fn match_entry_pads_missing_metadata() {
        let json = r#"[["q.mp4",0,5],[["t.mp4",0,5],["t.mp4",5,10]],[],[],[]]"#;
        let m: MatchAnnotation = serde_json::from_str(json).unwrap();
        assert_eq!(m.target_metadata().len(), 2);
        assert!(m.target_metadata().iter().all(|md| md.is_empty()));
    }

    #[test]
    fn match_entry_rejects_overlap_and_out_of_range() {
        let overlap = r#"[["q.mp4",0,5],[["t.mp4",0,5]],[{}],[0],[0]]"#;
        assert!(serde_json::from_str::<MatchAnnotation>(overlap).is_err());
        let oob = r#"[["q.mp4",0,5],[["t.mp4",0,5]],[{}],[3],[]]"#;
        assert!(serde_json::from_str::<MatchAnnotation>(oob).is_err());
        let misaligned = r#"[["q.mp4",0,5],[["t.mp4",0,5]],[{},{}],[],[]]"#;
        assert!(serde_json::from_str::<MatchAnnotation>(misaligned).is_err());
    }

    #[test]
    fn toggle_keeps_sets_disjoint() {
        let mut m = MatchAnnotation::new(
            clip("q.mp4", 0, 5),
            vec![clip("t.mp4", 0, 5), clip("t.mp4", 5, 10), clip("t.mp4", 10, 15)],
            Vec::new(),
        ).unwrap();
        assert!(m.toggle(2, false));
        assert!(m.toggle(2, true));
        assert_eq!(m.similar().iter().copied().collect::<Vec<_>>(), [2]);
        assert!(m.dissimilar().is_empty());
        // Same side again clears it.
        assert!(m.toggle(2, true));
        assert_eq!(m.classification(2), Classification::Unclassified);
        assert!(!m.toggle(3, true));
    }

    #[test]
    fn inverted_label_range_fails_to_parse() {
        let json = r#"{"type":"label","annotations":[["a.mp4",10,0,[]]]}"#;
        assert!(serde_json::from_str::<Document>(json).is_err());
    }
}
