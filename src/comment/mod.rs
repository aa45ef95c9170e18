//! Comment extraction — source lines in, plain lines and comment blocks out.
//!
//! Three stages, each an iterator over the previous one:
//!
//! - [`source_lines`] numbers the physical lines.
//! - [`line::Scanner`] classifies each line as plain code or as a start,
//!   continuation or finish line of a `/** ... */` comment. Tabs are
//!   expanded in comment lines only.
//! - [`block::Segmenter`] groups the comment lines into [`CommentBlock`]s.

pub mod block;
pub mod line;

pub use block::{CommentBlock, Segmenter};
pub use line::{CommentLine, LineItem, Part, Scanner};

/// Tab stop used when expanding tabs before analysis.
pub const TAB_SIZE: usize = 4;

/// One physical line of a source file, end-of-line marker included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Output of the segmenter: either an untouched line or a whole comment.
#[derive(Debug, Clone)]
pub enum Element {
    Plain(SourceLine),
    Comment(CommentBlock),
}

impl Element {
    /// Name used for the per-file line type counts.
    pub fn type_name(&self) -> &'static str {
        match self {
            Element::Plain(_) => "line",
            Element::Comment(_) => "comment",
        }
    }
}

/// Split `text` into numbered lines.
pub fn source_lines(text: &str) -> impl Iterator<Item = SourceLine> + '_ {
    text.split_inclusive('\n')
        .enumerate()
        .map(|(index, line)| SourceLine {
            number: index + 1,
            text: line.to_string(),
        })
}

/// Expand tab characters to the next multiple of `tab_size` columns.
pub fn expand_tabs(line: &str, tab_size: usize) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + tab_size);
    let mut column = 0;
    for ch in line.chars() {
        match ch {
            '\t' => {
                let pad = tab_size - (column % tab_size);
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(ch);
                column = 0;
            }
            _ => {
                out.push(ch);
                column += 1;
            }
        }
    }
    out
}

/// Run the whole extraction front end over a file's text.
pub fn elements(text: &str) -> Segmenter<Scanner<impl Iterator<Item = SourceLine> + '_>> {
    Segmenter::new(Scanner::new(source_lines(text)))
}
