//! Line analyzer — classifies lines of a source file against the comment
//! grammar and splits comment lines into indent, leader, margin, text and
//! end-of-line components.

use super::{expand_tabs, SourceLine, TAB_SIZE};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

static RE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)/\*\*( ?)").unwrap());

static RE_FINISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^([ \t]*))?\*/").unwrap());

// Continuation alternatives, tried in order on the line without its eol.
static RE_LEADER_EOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^( *)\*$").unwrap());

static RE_LEADER_MARGIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^( *)\* ").unwrap());

static RE_LEADER_TEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^( *)\*[^/]").unwrap());

static RE_BLANK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^( *)$").unwrap());

static RE_NO_LEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^( *)[^* ]").unwrap());

static RE_EOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]*$").unwrap());

/// Leader that opens a documentation comment.
pub const OPEN: &str = "/**";
/// Leader that closes a comment.
pub const CLOSE: &str = "*/";
/// Per-line continuation leader.
pub const LEADER: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Start,
    Continue,
    Finish,
}

/// One analysed comment line.
///
/// `indent + leader + margin + text + eol` is exactly the source text the
/// line was built from. An empty `leader` means the line had none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub number: usize,
    pub part: Part,
    pub indent: String,
    pub leader: String,
    pub margin: String,
    pub text: String,
    pub eol: String,
}

impl CommentLine {
    fn new(number: usize, part: Part, indent: &str, leader: &str) -> Self {
        CommentLine {
            number,
            part,
            indent: indent.to_string(),
            leader: leader.to_string(),
            margin: String::new(),
            text: String::new(),
            eol: String::new(),
        }
    }

    pub fn has_leader(&self) -> bool {
        !self.leader.is_empty()
    }

    /// Reassemble the source text of this line.
    pub fn to_source(&self) -> String {
        let mut out = String::with_capacity(
            self.indent.len() + self.leader.len() + self.margin.len() + self.text.len() + 2,
        );
        out.push_str(&self.indent);
        out.push_str(&self.leader);
        out.push_str(&self.margin);
        out.push_str(&self.text);
        out.push_str(&self.eol);
        out
    }

    /// Text contributed to the comment body.
    pub fn body(&self) -> String {
        format!("{}{}", self.text, self.eol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItem {
    Plain(SourceLine),
    Comment(CommentLine),
}

/// Split a trailing run of end-of-line characters off `text`.
pub fn split_eol(text: &str) -> (&str, &str) {
    let at = RE_EOL.find(text).map_or(text.len(), |m| m.start());
    text.split_at(at)
}

/// Match a comment start at the beginning of `text`.
///
/// Returns `(indent, margin, rest)`. The character after the open leader
/// must not be `/`, so `/**/` is not a documentation comment.
fn match_start(text: &str) -> Option<(&str, &str, &str)> {
    let caps = RE_START.captures(text)?;
    let indent = caps.get(1).map_or("", |m| m.as_str());
    let margin = caps.get(2).map_or("", |m| m.as_str());
    let end = caps.get(0).map_or(0, |m| m.end());
    let rest = &text[end..];
    if rest.starts_with('/') {
        if margin.is_empty() {
            return None;
        }
        // "/** /": the margin can't be taken, it becomes text.
        let open_end = end - margin.len();
        return Some((indent, "", &text[open_end..]));
    }
    Some((indent, margin, rest))
}

struct Finish<'a> {
    before: &'a str,
    indent: &'a str,
    after: &'a str,
}

/// Search for a comment finish anywhere in `text`.
fn find_finish(text: &str) -> Option<Finish<'_>> {
    let caps = RE_FINISH.captures(text)?;
    let whole = caps.get(0)?;
    Some(Finish {
        before: &text[..whole.start()],
        indent: caps.get(1).map_or("", |m| m.as_str()),
        after: &text[whole.end()..],
    })
}

/// Analyse a continuation line, given without its end-of-line marker.
fn match_continue(number: usize, content: &str) -> Option<CommentLine> {
    let line = |indent: &str, leader: &str, margin: &str, text: &str| {
        let mut line = CommentLine::new(number, Part::Continue, indent, leader);
        line.margin = margin.to_string();
        line.text = text.to_string();
        line
    };

    if let Some(caps) = RE_LEADER_EOL.captures(content) {
        return Some(line(&caps[1], LEADER, "", ""));
    }
    if let Some(caps) = RE_LEADER_MARGIN.captures(content) {
        let rest = &content[caps[0].len()..];
        return Some(line(&caps[1], LEADER, " ", rest));
    }
    if let Some(caps) = RE_LEADER_TEXT.captures(content) {
        let rest = &content[caps[1].len() + LEADER.len()..];
        return Some(line(&caps[1], LEADER, "", rest));
    }
    if let Some(caps) = RE_BLANK.captures(content) {
        return Some(line(&caps[1], "", "", ""));
    }
    if let Some(caps) = RE_NO_LEADER.captures(content) {
        let rest = &content[caps[1].len()..];
        return Some(line(&caps[1], "", "", rest));
    }
    None
}

// -- Scanner ------------------------------------------------------------------

/// Classifies a stream of source lines.
///
/// A physical line can hold several items: a start and a finish on the
/// same line, or code after a finish. Whatever follows a finish is fed
/// back through the analysis, so it may open another comment.
pub struct Scanner<I> {
    lines: I,
    pending: VecDeque<LineItem>,
    in_comment: bool,
    failed: bool,
}

impl<I: Iterator<Item = SourceLine>> Scanner<I> {
    pub fn new(lines: I) -> Self {
        Scanner {
            lines,
            pending: VecDeque::new(),
            in_comment: false,
            failed: false,
        }
    }

    fn analyse(&mut self, number: usize, line: &str) -> Result<()> {
        let mut text = line;
        loop {
            let mut start = None;
            if !self.in_comment {
                match match_start(text) {
                    None => {
                        self.pending.push_back(LineItem::Plain(SourceLine {
                            number,
                            text: text.to_string(),
                        }));
                        return Ok(());
                    }
                    Some((indent, margin, rest)) => {
                        let mut line = CommentLine::new(number, Part::Start, indent, OPEN);
                        line.margin = margin.to_string();
                        start = Some(line);
                        text = rest;
                        self.in_comment = true;
                    }
                }
            }

            let finish = find_finish(text);
            let body = finish.as_ref().map_or(text, |f| f.before);

            if let Some(mut line) = start {
                let (content, eol) = split_eol(body);
                line.text = content.to_string();
                line.eol = eol.to_string();
                self.pending.push_back(LineItem::Comment(line));
            } else if !body.is_empty() {
                let (content, eol) = split_eol(body);
                let mut line =
                    match_continue(number, content).ok_or_else(|| Error::MalformedLine {
                        line: number,
                        text: body.to_string(),
                    })?;
                line.eol = eol.to_string();
                self.pending.push_back(LineItem::Comment(line));
            } else if finish.is_none() {
                return Err(Error::MalformedLine {
                    line: number,
                    text: text.to_string(),
                });
            }

            let Some(finish) = finish else {
                return Ok(());
            };
            self.pending
                .push_back(LineItem::Comment(CommentLine::new(
                    number,
                    Part::Finish,
                    finish.indent,
                    CLOSE,
                )));
            self.in_comment = false;
            if finish.after.is_empty() {
                return Ok(());
            }
            text = finish.after;
        }
    }
}

impl<I: Iterator<Item = SourceLine>> Iterator for Scanner<I> {
    type Item = Result<LineItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }
            if self.failed {
                return None;
            }
            let line = self.lines.next()?;
            if !self.in_comment && match_start(&line.text).is_none() {
                self.pending.push_back(LineItem::Plain(line));
                continue;
            }
            let text = expand_tabs(&line.text, TAB_SIZE);
            if let Err(err) = self.analyse(line.number, &text) {
                self.failed = true;
                self.pending.clear();
                return Some(Err(err));
            }
        }
    }
}
