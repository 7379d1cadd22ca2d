//! Loads a configuration file and everything it includes into one tree.

use crate::error::LoadError;
use crate::grammar::{self, Statement};
use crate::include::resolve_include;
use crate::meta::FileMeta;
use crate::tree::{ConfigTree, ConfigValue, IndexList};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Files larger than this are registered but not parsed.
pub const DEFAULT_MAX_SIZE: u64 = 20 * 1024 * 1024;

/// Directives whose values are never stored in the tree.
pub const IGNORED_DIRECTIVES: &[&str] = &[
    "ssl_certificate_key",
    "ssl_client_certificate",
    "ssl_password_file",
    "ssl_stapling_file",
    "ssl_trusted_certificate",
    "auth_basic_user_file",
    "secure_link_secret",
];

/// A file registered during a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    /// Position in first-seen order; never reused within one load.
    pub index: usize,
    #[serde(flatten)]
    pub meta: FileMeta,
    /// Number of newline characters in the file.
    pub lines: usize,
    /// The file could not be read or parsed; later includes skip it.
    pub broken: bool,
}

/// Everything a load produces.
#[derive(Debug, Default)]
pub struct LoadOutput {
    pub tree: ConfigTree,
    pub files: BTreeMap<PathBuf, SourceFile>,
    /// Directories containing registered files.
    pub directories: BTreeMap<PathBuf, FileMeta>,
    pub index: IndexList,
    pub errors: Vec<LoadError>,
}

impl LoadOutput {
    /// Recorded errors rendered as messages.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Resolves an index handle to the file path and line it points at.
    pub fn location(&self, handle: usize) -> Option<(&Path, usize)> {
        let entry = self.index.get(handle)?;
        self.files
            .iter()
            .find(|(_, file)| file.index == entry.file)
            .map(|(path, _)| (path.as_path(), entry.line))
    }

    /// Sum of the sizes of all registered files.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|file| file.meta.size).sum()
    }
}

/// Loads a root configuration file and its includes.
///
/// Each call to [`load`](ConfigLoader::load) starts from scratch; nothing is
/// shared between loads or between loaders.
///
/// # Example
///
/// ```no_run
/// use nginx_agent_parser::ConfigLoader;
///
/// let output = ConfigLoader::new("/etc/nginx/nginx.conf").load();
/// for message in output.error_messages() {
///     eprintln!("{message}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    max_size: u64,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    /// Overrides the per-file size ceiling.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self) -> LoadOutput {
        debug!(root = %self.root.display(), "loading configuration");

        let mut session = Session {
            max_size: self.max_size,
            output: LoadOutput::default(),
            loaded: HashMap::new(),
            active: HashSet::new(),
            next_index: 0,
        };
        let mut tree = ConfigTree::default();
        session.include(&self.root.to_string_lossy(), Path::new(""), &mut tree);

        let mut output = session.output;
        output.tree = tree;
        debug!(
            files = output.files.len(),
            errors = output.errors.len(),
            "configuration loaded"
        );
        output
    }
}

/// State of one load.
struct Session {
    max_size: u64,
    output: LoadOutput,
    /// Statements of every file read so far, keyed by canonical path.
    /// `None` for files that produced nothing (broken, too large, commented out).
    loaded: HashMap<PathBuf, Option<(usize, Vec<Statement>)>>,
    /// Files currently being merged; including one of them again is a cycle.
    active: HashSet<PathBuf>,
    next_index: usize,
}

impl Session {
    fn include(&mut self, pattern: &str, parent_dir: &Path, tree: &mut ConfigTree) {
        for path in resolve_include(pattern, parent_dir) {
            let key = path.canonicalize().unwrap_or_else(|_| path.clone());
            if self.active.contains(&key) {
                debug!(path = %path.display(), "include cycle, skipping");
                continue;
            }

            let Some((file, statements)) = self.statements(&path, &key) else {
                continue;
            };

            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            self.active.insert(key.clone());
            self.merge(file, &dir, statements, tree);
            self.active.remove(&key);
        }
    }

    /// Statements of a file, reading it on first use only.
    fn statements(&mut self, path: &Path, key: &Path) -> Option<(usize, Vec<Statement>)> {
        if let Some(loaded) = self.loaded.get(key) {
            return loaded.clone();
        }
        let loaded = self.read(path);
        self.loaded.insert(key.to_path_buf(), loaded.clone());
        loaded
    }

    fn read(&mut self, path: &Path) -> Option<(usize, Vec<Statement>)> {
        let index = self.next_index;
        self.next_index += 1;

        let meta = match FileMeta::stat(path) {
            Ok(meta) => meta,
            Err(err) => {
                self.unreadable(path, index, FileMeta::default(), err);
                return None;
            }
        };
        self.register_directory(path);

        if meta.size > self.max_size {
            let size = meta.size;
            self.register(path, index, meta, 0);
            self.record(LoadError::TooLarge {
                path: path.to_path_buf(),
                size,
            });
            return None;
        }

        // bytes that are not UTF-8 (Latin-1 comments) are replaced, not fatal
        let source = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                self.unreadable(path, index, meta, err);
                return None;
            }
        };
        self.register(path, index, meta, source.matches('\n').count());

        let source = source.replace("\r\n", "\n");
        if is_commented_out(&source) {
            debug!(path = %path.display(), "no directives, skipping");
            return None;
        }

        match grammar::parse(&source) {
            Ok(statements) => Some((index, statements)),
            Err(err) => {
                if let Some(file) = self.output.files.get_mut(path) {
                    file.broken = true;
                }
                self.record(LoadError::Syntax {
                    path: path.to_path_buf(),
                    source: err,
                });
                None
            }
        }
    }

    fn register(&mut self, path: &Path, index: usize, meta: FileMeta, lines: usize) {
        self.output.files.insert(
            path.to_path_buf(),
            SourceFile {
                index,
                meta,
                lines,
                broken: false,
            },
        );
    }

    fn unreadable(&mut self, path: &Path, index: usize, meta: FileMeta, err: io::Error) {
        self.output.files.insert(
            path.to_path_buf(),
            SourceFile {
                index,
                meta,
                lines: 0,
                broken: true,
            },
        );
        self.record(LoadError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }

    fn register_directory(&mut self, path: &Path) {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if self.output.directories.contains_key(&dir) {
            return;
        }
        match FileMeta::stat(&dir) {
            Ok(meta) => {
                self.output.directories.insert(dir, meta);
            }
            Err(err) => debug!(dir = %dir.display(), error = %err, "failed to stat directory"),
        }
    }

    fn record(&mut self, err: LoadError) {
        error!("{err}");
        self.output.errors.push(err);
    }

    fn merge(&mut self, file: usize, dir: &Path, statements: Vec<Statement>, tree: &mut ConfigTree) {
        for statement in statements {
            match statement {
                Statement::Directive { name, value, line } => {
                    self.merge_directive(file, dir, name, value, line, tree);
                }
                Statement::Block {
                    name,
                    args,
                    line,
                    body,
                } => {
                    let index = self.output.index.push(file, line);
                    let mut subtree = ConfigTree::default();
                    self.merge(file, dir, body, &mut subtree);
                    let value = ConfigValue::Block {
                        tree: subtree,
                        index,
                    };

                    if !args.is_empty() {
                        tree.insert_compound(&name, args, value);
                    } else if name == "server" {
                        tree.append_to_list(&name, value);
                    } else {
                        tree.append(&name, value);
                    }
                }
            }
        }
    }

    fn merge_directive(
        &mut self,
        file: usize,
        dir: &Path,
        name: String,
        value: String,
        line: usize,
        tree: &mut ConfigTree,
    ) {
        if IGNORED_DIRECTIVES.contains(&name.as_str()) {
            return;
        }

        match name.as_str() {
            "log_format" => {
                let Some((format_name, format)) = split_log_format(&value) else {
                    debug!(value = %value, "unrecognized log_format");
                    return;
                };
                let index = self.output.index.push(file, line);
                tree.insert_compound(&name, format_name, ConfigValue::leaf(format, index));
            }
            "include" => {
                let index = self.output.index.push(file, line);
                tree.append_to_list(&name, ConfigValue::leaf(value.clone(), index));
                self.include(&value, dir, tree);
            }
            _ => {
                let index = self.output.index.push(file, line);
                tree.append(&name, ConfigValue::leaf(value, index));
            }
        }
    }
}

fn is_commented_out(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

/// Splits a `log_format` value into its name and the format string.
///
/// An `escape=` parameter is dropped and the quoted pieces of the format are
/// concatenated, so a format wrapped over several lines becomes one string.
fn split_log_format(value: &str) -> Option<(String, String)> {
    let (name, rest) = value.trim().split_once(char::is_whitespace)?;
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }

    let mut rest = rest.trim_start();
    if rest.starts_with("escape=") {
        rest = rest.split_once(char::is_whitespace)?.1.trim_start();
    }

    let format = join_quoted(rest);
    (!format.is_empty()).then(|| (name.to_string(), format))
}

fn join_quoted(text: &str) -> String {
    let mut joined = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped) if escaped == ch => joined.push(escaped),
                            Some(escaped) => {
                                joined.push('\\');
                                joined.push(escaped);
                            }
                            None => joined.push('\\'),
                        },
                        c if c == ch => break,
                        c => joined.push(c),
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => joined.push(c),
        }
    }

    joined
}
