//! Content cache — named fragments loaded from companion documentation files.
//!
//! A content file is a sequence of fragments. A line starting with a single
//! `#` opens a fragment named by the rest of the line; the lines up to the
//! next such header are its body. Lines before the first header are ignored.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// URI scheme of a reference.
pub const SCHEME: &str = "doc:";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("unsupported URI scheme in \"{0}\", expected doc://")]
    Scheme(String),

    #[error("don't know how to resolve host \"{0}\"")]
    Host(String),

    #[error("no fragment in \"{0}\"")]
    MissingFragment(String),

    #[error("fragment \"{fragment}\" not found in {location}")]
    NotFound { fragment: String, location: String },

    #[error("Repeated fragment \"{fragment}\" in file \"{}\"", path.display())]
    RepeatedFragment { fragment: String, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parsed `doc://<host><path>#<fragment>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocUri {
    pub host: String,
    pub path: String,
    pub fragment: String,
}

impl DocUri {
    pub fn parse(uri: &str) -> Result<Self, CacheError> {
        let normal = uri.replace('\\', "/");
        let rest = match normal.get(..SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &normal[SCHEME.len()..],
            _ => return Err(CacheError::Scheme(uri.to_string())),
        };
        let (rest, fragment) = match rest.split_once('#') {
            Some((rest, fragment)) => (rest, fragment),
            None => (rest, ""),
        };
        if fragment.is_empty() {
            return Err(CacheError::MissingFragment(uri.to_string()));
        }
        let (host, path) = match rest.strip_prefix("//") {
            Some(authority) => {
                let end = authority.find('/').unwrap_or(authority.len());
                (&authority[..end], &authority[end..])
            }
            None => ("", rest),
        };
        Ok(DocUri {
            host: host.to_string(),
            path: path.to_string(),
            fragment: fragment.to_string(),
        })
    }

    /// Absolute path of the content file, or `None` for a cache-only
    /// reference. `source` is the file the reference appeared in.
    pub fn file_path(&self, source: &Path) -> Result<Option<PathBuf>, CacheError> {
        let base = match self.host.as_str() {
            "" => return Ok(None),
            "." | ".." => {
                let source = absolute(source).map_err(|e| CacheError::Io {
                    path: source.to_path_buf(),
                    source: e,
                })?;
                let mut dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
                if self.host == ".." {
                    dir.pop();
                }
                dir
            }
            other => return Err(CacheError::Host(other.to_string())),
        };
        Ok(Some(normalize(&base.join(self.path.trim_start_matches('/')))))
    }
}

/// One named fragment of a content file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub path: PathBuf,
    pub name: String,
    pub lines: Vec<String>,
}

impl Fragment {
    pub fn content(&self) -> String {
        self.lines.concat()
    }
}

/// Split a content file into `(name, lines)` pairs. The last line of each
/// fragment loses its end-of-line marker.
pub fn parse_fragments(text: &str) -> Vec<(String, Vec<String>)> {
    let mut fragments = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in text.split_inclusive('\n') {
        if let Some((_, lines)) = current.as_mut() {
            if line.starts_with('#') && !line.starts_with("##") {
                fragments.extend(current.take());
            } else {
                lines.push(line.to_string());
            }
        }
        if current.is_none() && line.starts_with('#') {
            let name = line[1..].trim();
            if !name.is_empty() && !name.starts_with('#') {
                current = Some((name.to_string(), Vec::new()));
            }
        }
    }
    fragments.extend(current);

    for (_, lines) in fragments.iter_mut() {
        if let Some(last) = lines.last_mut() {
            let trimmed = last.trim_end_matches(['\r', '\n']).len();
            last.truncate(trimmed);
        }
    }
    fragments
}

/// Process-wide store of loaded fragments. Loading a file twice is a no-op.
#[derive(Debug, Default)]
pub struct ContentCache {
    fragments: Vec<Fragment>,
    files: HashSet<PathBuf>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a content file, or every file under a directory.
    pub fn load(&mut self, path: &Path) -> Result<(), CacheError> {
        let path = absolute(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if path.is_dir() {
            let files = walk_files(&path).map_err(|e| CacheError::Io {
                path: path.clone(),
                source: e,
            })?;
            for file in files {
                self.load_file(&file)?;
            }
            Ok(())
        } else {
            self.load_file(&path)
        }
    }

    /// Load one content file given its absolute path.
    pub fn load_file(&mut self, path: &Path) -> Result<(), CacheError> {
        if self.files.contains(path) {
            return Ok(());
        }
        let text = fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.load_str(path, &text)
    }

    /// Index already-read content as if loaded from `path`.
    pub fn load_str(&mut self, path: &Path, text: &str) -> Result<(), CacheError> {
        if self.files.contains(path) {
            return Ok(());
        }
        let mut seen = HashSet::new();
        let mut loaded = Vec::new();
        for (name, lines) in parse_fragments(text) {
            if !seen.insert(name.clone()) {
                return Err(CacheError::RepeatedFragment {
                    fragment: name,
                    path: path.to_path_buf(),
                });
            }
            loaded.push(Fragment {
                path: path.to_path_buf(),
                name,
                lines,
            });
        }
        log::info!("loaded {} fragment(s) from {}", loaded.len(), path.display());
        self.fragments.extend(loaded);
        self.files.insert(path.to_path_buf());
        Ok(())
    }

    /// Find the fragment a reference URI names. Path-qualified references
    /// load their file on demand; cache-only references match the first
    /// loaded fragment of that name.
    pub fn resolve(&mut self, uri: &str, source: &Path) -> Result<&Fragment, CacheError> {
        let parsed = DocUri::parse(uri)?;
        let path = parsed.file_path(source)?;
        if let Some(path) = &path {
            self.load_file(path)?;
        }
        self.fragments
            .iter()
            .find(|f| {
                f.name == parsed.fragment && path.as_ref().map_or(true, |p| &f.path == p)
            })
            .ok_or_else(|| CacheError::NotFound {
                fragment: parsed.fragment.clone(),
                location: match &path {
                    Some(p) => format!("file \"{}\"", p.display()),
                    None => "cache".to_string(),
                },
            })
    }
}

/// Absolute, lexically normalised form of `path`.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// All files under `dir`, recursively, in sorted order. Finder metadata
/// files are skipped.
pub fn walk_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() != ".DS_Store" {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
