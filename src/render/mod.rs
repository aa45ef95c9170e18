//! Comment renderer — trait-based dispatch over output conventions.
//!
//! A comment block goes through the whole document pipeline here: parse,
//! resolve, splice, at-command normalisation, then print assembly and
//! wrapping inside the convention's `/** ... */` envelope.

pub mod at_command;
pub mod prints;
pub mod wrap;

use crate::cache::ContentCache;
use crate::comment::line::{CLOSE, OPEN};
use crate::comment::CommentBlock;
use crate::error::Result;
use crate::markdown::{parse, resolve, splice};
use at_command::AtCommand;
use prints::Logical;
use std::path::Path;

/// Syntax of the rewritten comment.
pub trait Convention {
    fn name(&self) -> &'static str;

    /// Replacement for a recognised at-command, or `None` to leave the
    /// text as written.
    fn at_prefix(&self, command: &AtCommand) -> Option<String>;

    /// Line opening the comment before any body line, if the convention
    /// puts the open leader on a line of its own.
    fn opening(&self, indent: usize) -> Option<String>;

    /// Prefix of the first body line.
    fn first_prefix(&self, indent: usize) -> String;

    /// Prefix of every other body line.
    fn line_prefix(&self, indent: usize) -> String;
}

/// `@param name` style with a `*` leader on every line.
pub struct Doxygen;

impl Convention for Doxygen {
    fn name(&self) -> &'static str {
        "doxygen"
    }

    fn at_prefix(&self, command: &AtCommand) -> Option<String> {
        match command {
            AtCommand::File => None,
            AtCommand::Parameter(name) => Some(format!("@param {} ", name)),
            other => Some(format!("@{} ", other.keyword())),
        }
    }

    fn opening(&self, _indent: usize) -> Option<String> {
        None
    }

    fn first_prefix(&self, indent: usize) -> String {
        format!("{}{} ", " ".repeat(indent), OPEN)
    }

    fn line_prefix(&self, indent: usize) -> String {
        format!("{}* ", " ".repeat(indent + 1))
    }
}

/// Swift documentation markup: `- Parameter name:` fields, no leaders.
pub struct Swift;

impl Convention for Swift {
    fn name(&self) -> &'static str {
        "swift"
    }

    fn at_prefix(&self, command: &AtCommand) -> Option<String> {
        match command {
            AtCommand::Summary(_) => Some(String::new()),
            AtCommand::Return => Some("- Returns: ".to_string()),
            AtCommand::Version => Some("- Version: ".to_string()),
            AtCommand::Parameter(name) => Some(format!("- Parameter {}: ", name)),
            AtCommand::File => None,
        }
    }

    fn opening(&self, indent: usize) -> Option<String> {
        Some(format!("{}{}", " ".repeat(indent), OPEN))
    }

    fn first_prefix(&self, indent: usize) -> String {
        self.line_prefix(indent)
    }

    fn line_prefix(&self, indent: usize) -> String {
        " ".repeat(indent + 1)
    }
}

/// Pick the convention for a source file from its suffix.
pub fn create_convention(path: &Path) -> Box<dyn Convention> {
    let swift = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("swift"));
    if swift {
        Box::new(Swift)
    } else {
        Box::new(Doxygen)
    }
}

/// Settings shared by every block of a run.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Maximum line width; 0 disables wrapping.
    pub width: usize,
    /// Bracket injected content with `<doc>` markers.
    pub markers: bool,
}

/// Rewrite one comment block, resolving references from `cache`. The
/// result runs from the open leader to the close leader, without the
/// end-of-line after it.
pub fn render_block(
    block: &CommentBlock,
    path: &Path,
    cache: &mut ContentCache,
    convention: &dyn Convention,
    options: &RenderOptions,
) -> Result<String> {
    let mut tree = parse::parse(&block.extraction(), path)?;
    resolve::resolve(&mut tree, cache)?;
    resolve::lift_singles(&mut tree);
    splice::finish(&mut tree, options.markers)?;
    at_command::normalise(&mut tree, convention);
    log::debug!("{} {}:\n{}", path.display(), block.fragment_name(), tree);

    let lines = prints::assemble(&prints::prints(&tree));
    Ok(render_lines(&lines, block.indent_start, options.width, convention))
}

/// Wrap logical lines into the comment envelope.
pub fn render_lines(
    lines: &[Logical],
    indent: usize,
    width: usize,
    convention: &dyn Convention,
) -> String {
    let first_prefix = convention.first_prefix(indent);
    let line_prefix = convention.line_prefix(indent);

    let mut out: Vec<String> = convention.opening(indent).into_iter().collect();
    if lines.is_empty() && out.is_empty() {
        out.push(first_prefix.clone());
    }
    for (index, line) in lines.iter().enumerate() {
        let prefix = if index == 0 { &first_prefix } else { &line_prefix };
        match line {
            Logical::Wrapped { text, hanging } => {
                let subsequent = format!("{}{}", line_prefix, " ".repeat(*hanging));
                out.extend(wrap::wrap(text, width, prefix, &subsequent));
            }
            Logical::Verbatim(text) => {
                out.push(format!("{}{}", prefix, text).trim_end().to_string());
            }
        }
    }
    out.push(format!("{}{}", " ".repeat(indent + 1), CLOSE));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{elements, Element};

    fn render(source: &str, path: &str, width: usize) -> String {
        let mut cache = ContentCache::new();
        render_with(source, path, width, &mut cache)
    }

    fn render_with(source: &str, path: &str, width: usize, cache: &mut ContentCache) -> String {
        let path = Path::new(path);
        let convention = create_convention(path);
        let options = RenderOptions {
            width,
            markers: false,
        };
        let mut out = String::new();
        for element in elements(source) {
            match element.unwrap() {
                Element::Plain(line) => out.push_str(&line.text),
                Element::Comment(block) => out.push_str(
                    &render_block(&block, path, cache, convention.as_ref(), &options).unwrap(),
                ),
            }
        }
        out
    }

    #[test]
    fn convention_follows_suffix() {
        assert_eq!(create_convention(Path::new("a.SWIFT")).name(), "swift");
        assert_eq!(create_convention(Path::new("a.h")).name(), "doxygen");
        assert_eq!(create_convention(Path::new("Makefile")).name(), "doxygen");
    }

    #[test]
    fn doxygen_parameter_and_return() {
        let out = render(
            "/** @param foo the foo value\n * @return the result */\nint f(int foo);\n",
            "a.h",
            80,
        );
        assert_eq!(
            out,
            "/** @param foo the foo value\n *\n * @return the result\n */\nint f(int foo);\n"
        );
    }

    #[test]
    fn swift_parameter_and_return() {
        let out = render(
            "    /** @param foo the foo value\n     * @return the result */\n    func f()\n",
            "a.swift",
            80,
        );
        assert_eq!(
            out,
            concat!(
                "    /**\n",
                "     - Parameter foo: the foo value\n",
                "\n",
                "     - Returns: the result\n",
                "     */\n",
                "    func f()\n",
            )
        );
    }

    #[test]
    fn wrapped_parameter_hangs_under_text() {
        let out = render(
            "/**\n * @param count how many widgets to make before stopping\n */\n",
            "a.h",
            30,
        );
        assert_eq!(
            out,
            concat!(
                "/** @param count how many\n",
                " *              widgets to\n",
                " *              make before\n",
                " *              stopping\n",
                " */\n",
            )
        );
    }

    #[test]
    fn reference_is_inlined() {
        let mut cache = ContentCache::new();
        cache
            .load_str(Path::new("/docs/notes.md"), "# intro\nHello world\n")
            .unwrap();
        let out = render_with("/** doc://#intro */\n", "/src/a.h", 80, &mut cache);
        assert_eq!(out, "/** Hello world\n */\n");
        assert!(!out.contains("doc:"));
    }

    #[test]
    fn code_block_and_list() {
        let out = render(
            "/**\n * Steps:\n *\n *     run();\n *\n * - one\n * - two\n */\n",
            "a.h",
            80,
        );
        assert_eq!(
            out,
            concat!(
                "/** Steps:\n",
                " *\n",
                " *     run();\n",
                " *\n",
                " * -   one\n",
                " * -   two\n",
                " */\n",
            )
        );
    }

    #[test]
    fn empty_bodies() {
        assert_eq!(render("/** */\n", "a.h", 80), "/** \n */\n");
        assert_eq!(render("/** */\n", "a.swift", 80), "/**\n */\n");
    }

    #[test]
    fn rewrap_is_idempotent() {
        let source = concat!(
            "  /** Computes a value from the inputs given, wrapping long lines as it goes.\n",
            "   * @param first the first input, which can be rather long indeed\n",
            "   * @returns the combined value\n",
            "   *\n",
            "   *     code();\n",
            "   *\n",
            "   * - item one\n",
            "   * - item two with more words than fit\n",
            "   */\n",
            "  int compute(int first);\n",
        );
        let once = render(source, "a.h", 40);
        let twice = render(&once, "a.h", 40);
        assert_eq!(once, twice);
    }

    #[test]
    fn escaped_text_survives_rewrap() {
        let source = "/** Use \\_name\\_ and \\*stars\\* with \\<tag> and a & b. */\n";
        let once = render(source, "a.h", 80);
        assert_eq!(
            once,
            "/** Use \\_name\\_ and \\*stars\\* with \\<tag> and a & b.\n */\n"
        );
        assert_eq!(render(&once, "a.h", 80), once);
    }

    #[test]
    fn swift_fields_read_back_as_list_items() {
        let once = render(
            "    /** @param foo the foo value\n     * @return the result */\n",
            "a.swift",
            80,
        );
        let twice = render(&once, "a.swift", 80);
        assert_eq!(
            twice,
            concat!(
                "    /**\n",
                "     -   Parameter foo: the foo value\n",
                "\n",
                "     -   Returns: the result\n",
                "     */\n",
            )
        );
        assert_eq!(render(&twice, "a.swift", 80), twice);
    }

    #[test]
    fn leaders_follow_convention() {
        let source = "  /** A fairly long sentence that needs wrapping.\n   * @param x value\n   */\n";
        let doxygen = render(source, "a.h", 30);
        for line in doxygen.lines().skip(1) {
            assert!(line.starts_with("   *"), "{:?}", line);
        }
        let swift = render(source, "a.swift", 30);
        for line in swift.lines().skip(1) {
            assert!(line.is_empty() || line.starts_with("   "), "{:?}", line);
            assert!(!line.trim_start().starts_with('*') || line.trim() == "*/", "{:?}", line);
        }
    }
}
