//! Error types for the comment pipeline.

use crate::cache::CacheError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unterminated comment opened at line {line}")]
    UnterminatedComment { line: usize },

    #[error("malformed comment line {line}: {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("unsupported markdown construct: {construct}")]
    Unsupported { construct: String },

    #[error("don't know if {parent} can or cannot contain {child}")]
    Containment { parent: String, child: String },

    #[error("invalid document tree: {detail}")]
    InvalidTree { detail: String },

    #[error("cyclic reference at \"{uri}\" (depth {depth})")]
    CyclicReference { uri: String, depth: usize },

    #[error("cannot resolve \"{uri}\" relative to \"{}\"", base.display())]
    Reference {
        uri: String,
        base: PathBuf,
        #[source]
        source: CacheError,
    },

    #[error("comment at lines {first}-{last} of {}", path.display())]
    InBlock {
        first: usize,
        last: usize,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("extract file {} already exists", path.display())]
    ExtractExists { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unsupported(construct: impl Into<String>) -> Self {
        Error::Unsupported {
            construct: construct.into(),
        }
    }

    pub fn invalid_tree(detail: impl Into<String>) -> Self {
        Error::InvalidTree {
            detail: detail.into(),
        }
    }
}
