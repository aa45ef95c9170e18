//! Comment segmenter and block shuffler.

use super::line::{CommentLine, LineItem, Part};
use super::Element;
use crate::error::{Error, Result};

/// A comment from its start line to its finish line, inclusive.
#[derive(Debug, Clone)]
pub struct CommentBlock {
    pub lines: Vec<CommentLine>,
    /// Column of the open leader.
    pub indent_start: usize,
    /// Indent shared by the continuation lines, if they agree.
    pub indent_continue: Option<usize>,
    pub all_have_leader: bool,
    pub all_indented_ok: bool,
    pub line_first: usize,
    pub line_last: usize,
}

impl CommentBlock {
    /// Build a block from its lines, normalising leaderless continuations.
    pub fn new(mut lines: Vec<CommentLine>) -> Self {
        let indent_start = lines.first().map_or(0, |l| l.indent.len());
        let all_have_leader = lines.iter().all(CommentLine::has_leader);
        if !all_have_leader {
            shuffle_lines(&mut lines, indent_start);
        }
        let (all_indented_ok, indent_continue) =
            analyse_indentation(&lines, all_have_leader, indent_start);
        let line_first = lines.first().map_or(0, |l| l.number);
        let line_last = lines.last().map_or(line_first, |l| l.number);
        CommentBlock {
            lines,
            indent_start,
            indent_continue,
            all_have_leader,
            all_indented_ok,
            line_first,
            line_last,
        }
    }

    pub fn start(&self) -> Option<&CommentLine> {
        self.lines.iter().find(|l| l.part == Part::Start)
    }

    pub fn finish(&self) -> Option<&CommentLine> {
        self.lines.iter().rev().find(|l| l.part == Part::Finish)
    }

    /// The comment body as markdown source: text and end-of-line of every
    /// start and continuation line.
    pub fn extraction(&self) -> String {
        self.lines
            .iter()
            .filter(|l| l.part != Part::Finish)
            .map(CommentLine::body)
            .collect()
    }

    /// Fragment name used when the block is extracted.
    pub fn fragment_name(&self) -> String {
        format!("line-{}-{}", self.line_first, self.line_last)
    }

    /// Reassemble the original text of the block.
    pub fn to_source(&self) -> String {
        self.lines.iter().map(CommentLine::to_source).collect()
    }
}

/// Demote leaders, margins and excess indentation of continuation lines to
/// literal text. Used when at least one line has no leader, so that an
/// asterisk at the start of a line is a markdown list marker.
fn shuffle_lines(lines: &mut [CommentLine], indent_start: usize) {
    for line in lines.iter_mut().filter(|l| l.part == Part::Continue) {
        // Inherited threshold: one column past the open leader.
        let keep = indent_start + 1;
        let mut demoted = String::new();
        if line.indent.len() > keep {
            demoted.push_str(&line.indent[keep..]);
            line.indent.truncate(keep);
        }
        demoted.push_str(&line.leader);
        demoted.push_str(&line.margin);
        demoted.push_str(&line.text);
        line.text = demoted;
        line.leader.clear();
        line.margin.clear();
    }
}

fn analyse_indentation(
    lines: &[CommentLine],
    all_have_leader: bool,
    indent_start: usize,
) -> (bool, Option<usize>) {
    let mut indent_continue = None;
    // A finish counts only when it opens its physical line.
    let checked = lines.iter().enumerate().filter(|(index, l)| match l.part {
        Part::Start => false,
        Part::Continue => true,
        Part::Finish => *index == 0 || lines[index - 1].number != l.number,
    });
    for (_, line) in checked {
        if !all_have_leader && !line.has_leader() && line.text.chars().all(|c| c == ' ') {
            continue;
        }
        let indent = line.indent.len();
        match indent_continue {
            None if indent == indent_start || indent == indent_start + 1 => {
                indent_continue = Some(indent);
            }
            None => return (false, None),
            Some(expected) if indent != expected => return (false, indent_continue),
            Some(_) => {}
        }
    }
    (true, indent_continue)
}

// -- Segmenter ----------------------------------------------------------------

/// Groups classified lines into comment blocks. Plain lines outside a
/// comment pass through untouched. A finish always closes the open block.
pub struct Segmenter<I> {
    items: I,
    open: Option<Vec<CommentLine>>,
    done: bool,
}

impl<I: Iterator<Item = Result<LineItem>>> Segmenter<I> {
    pub fn new(items: I) -> Self {
        Segmenter {
            items,
            open: None,
            done: false,
        }
    }
}

impl<I: Iterator<Item = Result<LineItem>>> Iterator for Segmenter<I> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let item = match self.items.next() {
                Some(Ok(item)) => item,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return self.open.take().map(|lines| {
                        Err(Error::UnterminatedComment {
                            line: lines.first().map_or(0, |l| l.number),
                        })
                    });
                }
            };

            match item {
                LineItem::Plain(line) => {
                    if let Some(lines) = &self.open {
                        self.done = true;
                        return Some(Err(Error::MalformedLine {
                            line: lines.first().map_or(line.number, |l| l.number),
                            text: line.text,
                        }));
                    }
                    return Some(Ok(Element::Plain(line)));
                }
                LineItem::Comment(line) => {
                    let part = line.part;
                    self.open.get_or_insert_with(Vec::new).push(line);
                    if part == Part::Finish {
                        let lines = self.open.take().unwrap_or_default();
                        return Some(Ok(Element::Comment(CommentBlock::new(lines))));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::elements;

    fn blocks(text: &str) -> Vec<CommentBlock> {
        elements(text)
            .filter_map(|e| match e.unwrap() {
                Element::Comment(block) => Some(block),
                Element::Plain(_) => None,
            })
            .collect()
    }

    #[test]
    fn block_spans_line_range() {
        let b = &blocks("int a;\n/** One\n * two\n */\nint b;\n")[0];
        assert_eq!((b.line_first, b.line_last), (2, 4));
        assert_eq!(b.fragment_name(), "line-2-4");
        assert_eq!(b.extraction(), "One\ntwo\n");
        assert!(b.all_have_leader);
        assert!(b.all_indented_ok);
        assert_eq!(b.indent_continue, Some(1));
    }

    #[test]
    fn single_line_extraction_has_no_eol() {
        let b = &blocks("/** Hello. */\n")[0];
        assert_eq!(b.extraction(), "Hello. ");
    }

    #[test]
    fn leaderless_block_keeps_list_markers() {
        let b = &blocks("/** List:\n\n * item one\n *   continued\n */\n")[0];
        assert!(!b.all_have_leader);
        assert_eq!(b.extraction(), "List:\n\n* item one\n*   continued\n");
    }

    #[test]
    fn excess_indent_becomes_text() {
        let b = &blocks("  /** Code:\n\n        indented\n   */\n")[0];
        assert_eq!(b.lines[2].indent, "   ");
        assert_eq!(b.lines[2].text, "     indented");
        assert_eq!(b.indent_start, 2);
        assert_eq!(b.to_source(), "  /** Code:\n\n        indented\n   */");
    }

    #[test]
    fn inconsistent_indent_is_flagged() {
        let b = &blocks("/** a\n * b\n   * c\n */\n")[0];
        assert!(!b.all_indented_ok);
        assert_eq!(b.indent_continue, Some(1));
    }

    #[test]
    fn misaligned_finish_is_flagged() {
        let b = &blocks("/** a\n * b\n   */\n")[0];
        assert!(!b.all_indented_ok);
        let b = &blocks("  /**\n   * a\n  */\n")[0];
        assert!(!b.all_indented_ok);
    }

    #[test]
    fn finish_after_text_is_not_checked() {
        let b = &blocks("    /** a\n     * b */\n")[0];
        assert!(b.all_indented_ok);
        let b = &blocks("  /** one line */\n")[0];
        assert!(b.all_indented_ok);
        assert_eq!(b.indent_continue, None);
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let result: Result<Vec<_>> = elements("int a;\n/** never\n * closed\n").collect();
        assert!(matches!(
            result,
            Err(Error::UnterminatedComment { line: 2 })
        ));
    }
}
