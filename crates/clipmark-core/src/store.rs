// crates/clipmark-core/src/store.rs
//
// AnnotationStore: sole owner of the loaded Document and the path it came from.
//
// Label mutations save synchronously after every change. Match classification
// is batched: it only marks the store dirty and waits for an explicit save()
// (the shell prompts on close when dirty).
//
// Saves write to a temp file next to the target and rename over it, so a
// failed write never leaves a truncated annotation file behind.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info, warn};

use crate::annotation::{ClipRef, Document, LabelAnnotation};
use crate::error::{AnnotatorError, Result};
use crate::labels;

/// A label edit. `Add`/`Remove` touch one clip; the `*Everywhere` variants
/// scan the whole document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelOp {
    Add(String),
    Remove(String),
    RenameEverywhere { old: String, new: String },
    DeleteEverywhere(String),
}

/// On-disk shape the document was read from, so save() writes it back the
/// same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileLayout {
    /// `{"type": ..., "annotations": [...]}`
    Tagged,
    /// A bare array of label tuples (older label files).
    BareLabels,
}

pub struct AnnotationStore {
    path:     PathBuf,
    document: Document,
    layout:   FileLayout,
    dirty:    bool,
}

impl AnnotationStore {
    /// Parse `path` and verify every referenced video exists.
    ///
    /// Nothing is returned unless the whole document is usable: a missing
    /// annotation file, malformed JSON, an unknown `type` or any missing video
    /// aborts the load. Missing videos are reported all at once.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AnnotatorError::NotFound { paths: vec![path] });
            }
            Err(source) => return Err(AnnotatorError::Io { path, source }),
        };

        let parse_err = |e: serde_json::Error| AnnotatorError::Parse {
            path: path.clone(),
            msg:  e.to_string(),
        };
        let (document, layout) = if text.trim_start().starts_with('[') {
            let entries: Vec<LabelAnnotation> = serde_json::from_str(&text).map_err(parse_err)?;
            (Document::Label(entries), FileLayout::BareLabels)
        } else {
            let doc: Document = serde_json::from_str(&text).map_err(parse_err)?;
            (doc, FileLayout::Tagged)
        };

        let missing: BTreeSet<PathBuf> = document.clips()
            .map(ClipRef::path)
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect();
        if !missing.is_empty() {
            warn!("[store] {} referenced videos missing for {}", missing.len(), path.display());
            return Err(AnnotatorError::NotFound { paths: missing.into_iter().collect() });
        }

        info!(
            "[store] loaded {} document ({} clips) ← {}",
            document.kind(), document.len(), path.display(),
        );
        Ok(Self { path, document, layout, dirty: false })
    }

    /// Wrap an in-memory document. Nothing is checked or written until save().
    pub fn from_document(path: impl Into<PathBuf>, document: Document) -> Self {
        Self { path: path.into(), document, layout: FileLayout::Tagged, dirty: false }
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn document(&self) -> &Document { &self.document }
    pub fn len(&self) -> usize { self.document.len() }
    pub fn is_empty(&self) -> bool { self.document.is_empty() }

    /// True when in-memory state differs from what was last written.
    pub fn is_dirty(&self) -> bool { self.dirty }

    /// The clip shown in the main/query viewer for entry `index`.
    pub fn primary_clip(&self, index: usize) -> Option<&ClipRef> {
        match &self.document {
            Document::Label(a) => a.get(index).map(|e| &e.clip),
            Document::Match(a) => a.get(index).map(|e| &e.query),
        }
    }

    /// Write the whole document back to its path, pretty-printed.
    pub fn save(&mut self) -> Result<()> {
        let io_err = |source: io::Error| AnnotatorError::Io { path: self.path.clone(), source };

        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        let encoded = match (&self.document, self.layout) {
            (Document::Label(entries), FileLayout::BareLabels) => entries.serialize(&mut ser),
            (doc, _) => doc.serialize(&mut ser),
        };
        encoded.map_err(|e| io_err(io::Error::other(e)))?;
        buf.push(b'\n');

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&buf).map_err(io_err)?;
        // The temp file is created owner-only; keep the target's mode instead.
        match fs::metadata(&self.path) {
            Ok(meta) => tmp.as_file().set_permissions(meta.permissions()).map_err(io_err)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        self.dirty = false;
        debug!("[store] saved {} bytes → {}", buf.len(), self.path.display());
        Ok(())
    }

    /// Where the UI should reopen.
    ///
    /// Label documents: one past the highest labeled index, even if earlier
    /// clips are still unlabeled. May equal `len()` when the last clip is
    /// labeled. Match documents: one past the highest classified index,
    /// clamped to the last valid index. Both return 0 when nothing is done.
    pub fn resume_index(&self) -> usize {
        match &self.document {
            Document::Label(a) => a.iter()
                .rposition(LabelAnnotation::is_labeled)
                .map_or(0, |i| i + 1),
            Document::Match(a) => a.iter()
                .rposition(|e| e.is_classified())
                .map_or(0, |i| (i + 1).min(a.len() - 1)),
        }
    }

    /// Sorted vocabulary across the whole document. Empty for match documents.
    pub fn unique_labels(&self) -> Vec<String> {
        match &self.document {
            Document::Label(a) => labels::unique(a.iter().map(LabelAnnotation::labels)),
            Document::Match(_) => Vec::new(),
        }
    }

    /// Labels on entry `index` (empty for match documents or out-of-range).
    pub fn labels_at(&self, index: usize) -> &[String] {
        match &self.document {
            Document::Label(a) => a.get(index).map(LabelAnnotation::labels).unwrap_or(&[]),
            Document::Match(_) => &[],
        }
    }

    /// Apply `op`, then save.
    ///
    /// The in-memory change is kept even when the save fails; the error is
    /// returned so the caller can surface it, and the store stays dirty until
    /// a later save succeeds.
    pub fn mutate_label(&mut self, index: usize, op: LabelOp) -> Result<()> {
        let kind = self.document.kind();
        let Document::Label(entries) = &mut self.document else {
            return Err(AnnotatorError::WrongDocumentKind { op: "label edit", kind });
        };
        let len = entries.len();

        match &op {
            LabelOp::Add(label) | LabelOp::Remove(label) => {
                let entry = entries.get_mut(index)
                    .ok_or(AnnotatorError::InvalidIndex { index, len })?;
                let next = match &op {
                    LabelOp::Add(_) => labels::add(entry.labels(), label),
                    _               => labels::remove(entry.labels(), label),
                };
                entry.set_labels(next);
            }
            LabelOp::RenameEverywhere { old, new } => {
                for entry in entries.iter_mut() {
                    let next = labels::rename(entry.labels(), old, new);
                    entry.set_labels(next);
                }
            }
            LabelOp::DeleteEverywhere(label) => {
                for entry in entries.iter_mut() {
                    let next = labels::remove(entry.labels(), label);
                    entry.set_labels(next);
                }
            }
        }
        debug!("[store] {op:?} at {index}");

        self.dirty = true;
        self.save()
    }

    /// Toggle `target_index` of entry `clip_index` into similar (or
    /// dissimilar), clearing it from the other set. Does not save.
    pub fn classify_target(&mut self, clip_index: usize, target_index: usize, as_similar: bool) -> Result<()> {
        let kind = self.document.kind();
        let Document::Match(entries) = &mut self.document else {
            return Err(AnnotatorError::WrongDocumentKind { op: "target classification", kind });
        };
        let len = entries.len();
        let entry = entries.get_mut(clip_index)
            .ok_or(AnnotatorError::InvalidIndex { index: clip_index, len })?;
        let n_targets = entry.targets().len();
        if !entry.toggle(target_index, as_similar) {
            return Err(AnnotatorError::InvalidIndex { index: target_index, len: n_targets });
        }
        self.dirty = true;
        Ok(())
    }

    /// Nearest label-document entry after `from` carrying `label`.
    pub fn next_instance(&self, from: usize, label: &str) -> Option<usize> {
        let Document::Label(a) = &self.document else { return None };
        (from.saturating_add(1)..a.len()).find(|&i| a[i].labels().iter().any(|l| l == label))
    }

    /// Nearest label-document entry before `from` carrying `label`.
    pub fn prev_instance(&self, from: usize, label: &str) -> Option<usize> {
        let Document::Label(a) = &self.document else { return None };
        (0..from.min(a.len())).rev().find(|&i| a[i].labels().iter().any(|l| l == label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Classification, MatchAnnotation};
    use tempfile::TempDir;

    /// Temp dir holding an annotation file plus empty stand-in videos.
    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(videos: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            for v in videos {
                fs::write(dir.path().join(v), b"").unwrap();
            }
            Self { dir }
        }

        fn video(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        fn write(&self, name: &str, json: &serde_json::Value) -> PathBuf {
            let p = self.dir.path().join(name);
            fs::write(&p, serde_json::to_string(json).unwrap()).unwrap();
            p
        }

        fn label_doc(&self, entries: serde_json::Value) -> PathBuf {
            self.write("labels.json", &serde_json::json!({ "type": "label", "annotations": entries }))
        }
    }

    fn read_json(p: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap()
    }

    #[test]
    fn scenario_a_resume_past_last_labeled() {
        let fx = Fixture::new(&["a.mp4"]);
        let a = fx.video("a.mp4");
        let p = fx.label_doc(serde_json::json!([[a, 0, 10, []], [a, 10, 20, ["cat"]]]));
        let store = AnnotationStore::load(&p).unwrap();
        assert_eq!(store.resume_index(), 2);
    }

    #[test]
    fn resume_skips_earlier_gaps() {
        let fx = Fixture::new(&["a.mp4"]);
        let a = fx.video("a.mp4");
        let p = fx.label_doc(serde_json::json!([
            [a, 0, 1, ["x"]], [a, 1, 2, []], [a, 2, 3, ["y"]], [a, 3, 4, []], [a, 4, 5, []],
        ]));
        assert_eq!(AnnotationStore::load(&p).unwrap().resume_index(), 3);
    }

    #[test]
    fn resume_prefix_labeled_and_all_empty() {
        let clip = |s| ClipRef::new("a.mp4", s, s + 1).unwrap();
        for k in 0..4usize {
            let entries = (0..5u64)
                .map(|i| {
                    let l = if (i as usize) <= k { vec!["x".to_string()] } else { vec![] };
                    LabelAnnotation::new(clip(i), l)
                })
                .collect();
            let store = AnnotationStore::from_document("unused.json", Document::Label(entries));
            assert_eq!(store.resume_index(), k + 1);
        }
        let empty = (0..5u64).map(|i| LabelAnnotation::new(clip(i), vec![])).collect();
        let store = AnnotationStore::from_document("unused.json", Document::Label(empty));
        assert_eq!(store.resume_index(), 0);
    }

    #[test]
    fn match_resume_is_clamped() {
        let c = |s| ClipRef::new("q.mp4", s, s + 1).unwrap();
        let entries = (0..3u64)
            .map(|i| MatchAnnotation::new(c(i), vec![c(10), c(11)], vec![]).unwrap())
            .collect();
        let mut store = AnnotationStore::from_document("unused.json", Document::Match(entries));
        assert_eq!(store.resume_index(), 0);
        store.classify_target(0, 1, false).unwrap();
        assert_eq!(store.resume_index(), 1);
        store.classify_target(2, 0, true).unwrap();
        assert_eq!(store.resume_index(), 2);
    }

    #[test]
    fn missing_videos_are_aggregated() {
        let fx = Fixture::new(&["present.mp4"]);
        let p = fx.label_doc(serde_json::json!([
            [fx.video("present.mp4"), 0, 10, []],
            [fx.video("gone1.mp4"), 0, 10, []],
            [fx.video("gone2.mp4"), 0, 10, []],
            [fx.video("gone1.mp4"), 10, 20, []],
        ]));
        match AnnotationStore::load(&p) {
            Err(AnnotatorError::NotFound { paths }) => {
                assert_eq!(paths.len(), 2);
                assert!(paths[0].ends_with("gone1.mp4"));
                assert!(paths[1].ends_with("gone2.mp4"));
            }
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_match_targets_are_reported() {
        let fx = Fixture::new(&["q.mp4", "t1.mp4"]);
        let p = fx.write("m.json", &serde_json::json!({
            "type": "match",
            "annotations": [
                [[fx.video("q.mp4"), 0, 10], [[fx.video("t1.mp4"), 0, 10], [fx.video("t2.mp4"), 0, 10]]],
                [[fx.video("q.mp4"), 10, 20], [[fx.video("t2.mp4"), 10, 20]]],
            ],
        }));
        match AnnotationStore::load(&p) {
            Err(AnnotatorError::NotFound { paths }) => {
                assert_eq!(paths.len(), 1);
                assert!(paths[0].ends_with("t2.mp4"));
            }
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_annotation_file() {
        let fx = Fixture::new(&[]);
        let p = fx.dir.path().join("nope.json");
        assert!(matches!(AnnotationStore::load(&p), Err(AnnotatorError::NotFound { .. })));
    }

    #[test]
    fn malformed_and_unknown_type_are_parse_errors() {
        let fx = Fixture::new(&[]);
        let bad = fx.dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(AnnotationStore::load(&bad), Err(AnnotatorError::Parse { .. })));

        let unknown = fx.write("u.json", &serde_json::json!({ "type": "sort", "annotations": [] }));
        assert!(matches!(AnnotationStore::load(&unknown), Err(AnnotatorError::Parse { .. })));
    }

    #[test]
    fn save_round_trips() {
        let fx = Fixture::new(&["a.mp4", "b.mp4"]);
        let original = serde_json::json!({
            "type": "match",
            "annotations": [[
                [fx.video("a.mp4"), 0, 30],
                [[fx.video("b.mp4"), 0, 30], [fx.video("b.mp4"), 30, 60]],
                [{ "score": 0.9 }, { "score": 0.4 }],
                [1],
                [0],
            ]],
        });
        let p = fx.write("m.json", &original);
        let mut store = AnnotationStore::load(&p).unwrap();
        store.save().unwrap();
        assert_eq!(read_json(&p), original);
        assert!(fs::read_to_string(&p).unwrap().contains("\n    "));
    }

    #[test]
    fn bare_label_array_saves_as_bare_array() {
        let fx = Fixture::new(&["a.mp4"]);
        let original = serde_json::json!([[fx.video("a.mp4"), 0, 10, ["dog"]]]);
        let p = fx.write("bare.json", &original);
        let mut store = AnnotationStore::load(&p).unwrap();
        store.mutate_label(0, LabelOp::Add("cat".into())).unwrap();
        assert_eq!(
            read_json(&p),
            serde_json::json!([[fx.video("a.mp4"), 0, 10, ["cat", "dog"]]]),
        );
    }

    #[test]
    fn label_mutations_persist_immediately() {
        let fx = Fixture::new(&["a.mp4"]);
        let a = fx.video("a.mp4");
        let p = fx.label_doc(serde_json::json!([[a, 0, 10, ["cat"]], [a, 10, 20, ["cat", "dog"]]]));
        let mut store = AnnotationStore::load(&p).unwrap();

        store.mutate_label(0, LabelOp::Add("bird".into())).unwrap();
        assert_eq!(AnnotationStore::load(&p).unwrap().labels_at(0), ["bird", "cat"]);

        store.mutate_label(0, LabelOp::RenameEverywhere { old: "cat".into(), new: "dog".into() }).unwrap();
        let reloaded = AnnotationStore::load(&p).unwrap();
        assert_eq!(reloaded.labels_at(0), ["bird", "dog"]);
        assert_eq!(reloaded.labels_at(1), ["dog"]);

        store.mutate_label(1, LabelOp::DeleteEverywhere("dog".into())).unwrap();
        let reloaded = AnnotationStore::load(&p).unwrap();
        assert_eq!(reloaded.unique_labels(), ["bird"]);
        assert!(!store.is_dirty());
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new(&["a.mp4"]);
        let p = fx.label_doc(serde_json::json!([[fx.video("a.mp4"), 0, 10, []]]));
        fs::set_permissions(&p, fs::Permissions::from_mode(0o644)).unwrap();

        let mut store = AnnotationStore::load(&p).unwrap();
        store.mutate_label(0, LabelOp::Add("cat".into())).unwrap();

        let mode = fs::metadata(&p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(AnnotationStore::load(&p).unwrap().labels_at(0), ["cat"]);
    }

    #[test]
    fn failed_save_keeps_mutation_and_dirty_flag() {
        let entries = vec![LabelAnnotation::new(ClipRef::new("a.mp4", 0, 1).unwrap(), vec![])];
        let mut store = AnnotationStore::from_document(
            "/definitely/not/a/dir/labels.json",
            Document::Label(entries),
        );
        let err = store.mutate_label(0, LabelOp::Add("cat".into())).unwrap_err();
        assert!(matches!(err, AnnotatorError::Io { .. }));
        assert_eq!(store.labels_at(0), ["cat"]);
        assert!(store.is_dirty());
    }

    #[test]
    fn out_of_range_and_wrong_kind() {
        let entries = vec![LabelAnnotation::new(ClipRef::new("a.mp4", 0, 1).unwrap(), vec![])];
        let mut store = AnnotationStore::from_document("x.json", Document::Label(entries));
        assert!(matches!(
            store.mutate_label(5, LabelOp::Add("x".into())),
            Err(AnnotatorError::InvalidIndex { index: 5, len: 1 }),
        ));
        assert!(matches!(
            store.classify_target(0, 0, true),
            Err(AnnotatorError::WrongDocumentKind { .. }),
        ));
    }

    #[test]
    fn scenario_c_classification_is_exclusive_and_batched() {
        let c = |s| ClipRef::new("q.mp4", s, s + 1).unwrap();
        let entry = MatchAnnotation::new(c(0), vec![c(1), c(2), c(3)], vec![]).unwrap();
        let mut store = AnnotationStore::from_document("unused.json", Document::Match(vec![entry]));

        store.classify_target(0, 2, false).unwrap();
        store.classify_target(0, 2, true).unwrap();
        let Document::Match(a) = store.document() else { unreachable!() };
        assert_eq!(a[0].similar().iter().copied().collect::<Vec<_>>(), [2]);
        assert!(a[0].dissimilar().is_empty());
        assert_eq!(a[0].classification(2), Classification::Similar);
        assert!(store.is_dirty());

        assert!(store.classify_target(0, 7, true).is_err());
    }

    #[test]
    fn instance_navigation() {
        let c = |s| ClipRef::new("a.mp4", s, s + 1).unwrap();
        let l = |x: &[&str]| x.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let entries = vec![
            LabelAnnotation::new(c(0), l(&["cat"])),
            LabelAnnotation::new(c(1), l(&[])),
            LabelAnnotation::new(c(2), l(&["cat", "dog"])),
            LabelAnnotation::new(c(3), l(&["dog"])),
        ];
        let store = AnnotationStore::from_document("x.json", Document::Label(entries));
        assert_eq!(store.next_instance(0, "cat"), Some(2));
        assert_eq!(store.next_instance(2, "cat"), None);
        assert_eq!(store.prev_instance(3, "cat"), Some(2));
        assert_eq!(store.prev_instance(2, "cat"), Some(0));
        assert_eq!(store.prev_instance(0, "dog"), None);
    }
}
