//! doctor — rewrites `/** ... */` documentation comments.
//!
//! Comment bodies are read as a small markdown dialect in which `doc://`
//! references pull in named fragments from companion `.md` files. The
//! resolved document is re-wrapped and written back in Doxygen or Swift
//! style, or the comments are extracted into fragments instead.

pub mod cache;
pub mod comment;
pub mod error;
pub mod markdown;
pub mod process;
pub mod render;
