//! File driver — runs the pipeline over whole source files in injection or
//! extraction mode, and keeps the per-file and per-job reports.

use crate::cache::{absolute, ContentCache};
use crate::comment::line::{CLOSE, OPEN};
use crate::comment::{elements, CommentBlock, Element};
use crate::error::{Error, Result};
use crate::render::{create_convention, render_block, RenderOptions};
use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Suffixes processed when walking a directory.
pub const EXTENSIONS: &[&str] = &["h", "swift"];

/// Extension reported for files named directly.
pub const NOT_CHECKED: &str = "not checked";

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub render: RenderOptions,
    /// Write results; otherwise only report.
    pub overwrite: bool,
    pub extract: bool,
    pub extract_dir: Option<PathBuf>,
    /// Keep a unified diff of each edited file in its report.
    pub diffs: bool,
}

/// A file to process. Files found by walking a directory are filtered by
/// extension, files named directly are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub checked: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub extension: String,
    pub overwrote: bool,
    pub extract: bool,
    pub extract_path: Option<PathBuf>,
    /// Output differs from input.
    pub edited: bool,
    /// Elements seen, by type name.
    pub line_types: BTreeMap<String, usize>,
    #[serde(skip)]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub total_files: usize,
    pub overwrites: usize,
    pub edited: usize,
    pub failed: usize,
    pub extension_counts: BTreeMap<String, usize>,
}

impl JobReport {
    pub fn record(&mut self, report: &FileReport) {
        self.total_files += 1;
        if report.overwrote {
            self.overwrites += 1;
        }
        if report.edited {
            self.edited += 1;
        }
        *self
            .extension_counts
            .entry(report.extension.clone())
            .or_default() += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_files += 1;
        self.failed += 1;
    }
}

pub struct Processor {
    cache: ContentCache,
    options: Options,
    /// Common directory of the inputs, re-rooted under the extract dir.
    root: Option<PathBuf>,
}

impl Processor {
    pub fn new(cache: ContentCache, options: Options, root: Option<PathBuf>) -> Self {
        Processor {
            cache,
            options,
            root,
        }
    }

    /// Process one file. On error the file is left as it was.
    pub fn process(&mut self, source: &Source) -> Result<FileReport> {
        let path = &source.path;
        let extension = if source.checked {
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase()
        } else {
            NOT_CHECKED.to_string()
        };
        let mut report = FileReport {
            path: path.clone(),
            extension,
            extract: self.options.extract,
            ..FileReport::default()
        };
        if source.checked && !EXTENSIONS.contains(&report.extension.as_str()) {
            log::debug!("skipping {}", path.display());
            return Ok(report);
        }

        let text = fs::read_to_string(path)?;
        let output = if self.options.extract {
            let extract_path = self.extract_path(path)?;
            if extract_path.exists() {
                return Err(Error::ExtractExists { path: extract_path });
            }
            let (output, fragments) = extract(path, &extract_path, &text, &mut report)?;
            report.extract_path = Some(extract_path.clone());
            report.edited = output != text;
            // The source is replaced right after the companion is written.
            report.overwrote = self.options.overwrite && report.edited;
            if self.options.overwrite {
                write_extract(&extract_path, &report, &fragments)?;
            }
            output
        } else {
            self.inject(path, &text, &mut report)?
        };

        report.edited = output != text;
        if self.options.diffs && report.edited {
            report.diff = Some(unified_diff(path, &text, &output));
        }
        if self.options.overwrite && report.edited {
            replace_file(path, &output)?;
            report.overwrote = true;
            log::info!("wrote {}", path.display());
        }
        Ok(report)
    }

    fn inject(&mut self, path: &Path, text: &str, report: &mut FileReport) -> Result<String> {
        let convention = create_convention(path);
        let mut out = String::with_capacity(text.len());
        for element in elements(text) {
            let element = element?;
            count(report, &element);
            match element {
                Element::Plain(line) => out.push_str(&line.text),
                Element::Comment(block) => {
                    let rendered = render_block(
                        &block,
                        path,
                        &mut self.cache,
                        convention.as_ref(),
                        &self.options.render,
                    )
                    .map_err(|e| in_block(&block, path, e))?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }

    /// Where the extracted fragments of `path` go.
    fn extract_path(&self, path: &Path) -> Result<PathBuf> {
        let companion = path.with_extension("md");
        let Some(dir) = &self.options.extract_dir else {
            return Ok(companion);
        };
        let companion = absolute(&companion)?;
        let relative = match &self.root {
            Some(root) => companion.strip_prefix(root).ok().map(Path::to_path_buf),
            None => None,
        };
        let relative = relative
            .or_else(|| companion.file_name().map(PathBuf::from))
            .unwrap_or_default();
        Ok(dir.join(relative))
    }
}

fn count(report: &mut FileReport, element: &Element) {
    *report
        .line_types
        .entry(element.type_name().to_string())
        .or_default() += 1;
}

fn in_block(block: &CommentBlock, path: &Path, source: Error) -> Error {
    Error::InBlock {
        first: block.line_first,
        last: block.line_last,
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

/// Replace every comment with a reference to its extracted fragment.
/// Returns the new source text and the fragments file body.
fn extract(
    path: &Path,
    extract_path: &Path,
    text: &str,
    report: &mut FileReport,
) -> Result<(String, String)> {
    let link = relative_link(path, extract_path)?;
    let mut out = String::with_capacity(text.len());
    let mut fragments = String::new();
    let mut first = true;
    for element in elements(text) {
        let element = element?;
        count(report, &element);
        match element {
            Element::Plain(line) => out.push_str(&line.text),
            Element::Comment(block) => {
                let name = block.fragment_name();
                fragments.push_str(&format!("# {}\n{}\n", name, block.extraction()));
                // The first reference loads the file; the rest hit the cache.
                let target = if first { link.as_str() } else { "" };
                first = false;
                out.push_str(&reference_comment(
                    &block,
                    &format!("doc://{}#{}", target, name),
                ));
            }
        }
    }
    Ok((out, fragments))
}

/// A comment holding only `[uri]`, keeping the block's start and finish
/// layout.
fn reference_comment(block: &CommentBlock, uri: &str) -> String {
    let (indent, margin, eol) = block
        .start()
        .map_or(("", "", ""), |l| (&l.indent[..], &l.margin[..], &l.eol[..]));
    let finish_indent = block.finish().map_or("", |l| &l.indent[..]);
    format!(
        "{}{}{}[{}]{}{}{}",
        indent, OPEN, margin, uri, eol, finish_indent, CLOSE
    )
}

fn write_extract(extract_path: &Path, report: &FileReport, fragments: &str) -> Result<()> {
    if let Some(dir) = extract_path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(io::Error::from)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(extract_path)?;
    write!(
        file,
        "Automatic extraction by the Doctor.\nExtract time (ISO 8601): {}\n{}\n\n{}",
        chrono::Local::now().to_rfc3339(),
        json,
        fragments
    )?;
    log::info!("created {}", extract_path.display());
    Ok(())
}

/// Path of `target` as written in a reference from `source`: relative to
/// the source's directory, starting with `./` or `../`.
pub fn relative_link(source: &Path, target: &Path) -> Result<String> {
    let source = absolute(source)?;
    let target = absolute(target)?;
    let base: Vec<Component> = source
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let target: Vec<Component> = target.components().collect();
    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts = vec!["..".to_string(); base.len() - common];
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    let link = parts.join("/");
    if link.starts_with("../") {
        Ok(link)
    } else {
        Ok(format!("./{}", link))
    }
}

/// Deepest directory containing every one of `paths`.
pub fn common_root(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs = paths
        .iter()
        .filter_map(|p| absolute(p).ok())
        .filter_map(|p| p.parent().map(Path::to_path_buf));
    let mut root = dirs.next()?;
    for dir in dirs {
        while !dir.starts_with(&root) {
            if !root.pop() {
                break;
            }
        }
    }
    Some(root)
}

fn unified_diff(path: &Path, before: &str, after: &str) -> String {
    let name = path.display().to_string();
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&name, &name)
        .to_string()
}

/// Atomically replace `path` with `contents`, keeping its permissions.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(temp.path(), meta.permissions())?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
