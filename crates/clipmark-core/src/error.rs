// crates/clipmark-core/src/error.rs
//
// Error taxonomy shared by the store, the loader and the shell.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotatorError {
    /// The annotation file, or one or more referenced videos, do not exist.
    /// Every missing path is listed, not just the first.
    #[error("missing files:\n{}", display_paths(.paths))]
    NotFound { paths: Vec<PathBuf> },

    /// Malformed JSON, unknown document `type`, or a record that violates an
    /// invariant.
    #[error("{}: {msg}", .path.display())]
    Parse { path: PathBuf, msg: String },

    /// A frame range could not be decoded in full.
    #[error("decode failed for {}: {msg}", .path.display())]
    Decode { path: PathBuf, msg: String },

    #[error("could not write {}: {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("clip index {index} out of range (document has {len} clips)")]
    InvalidIndex { index: usize, len: usize },

    /// The operation does not apply to this kind of document (e.g. labelling
    /// a match document).
    #[error("{op} is not supported on a {kind} document")]
    WrongDocumentKind { op: &'static str, kind: &'static str },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, AnnotatorError>;
