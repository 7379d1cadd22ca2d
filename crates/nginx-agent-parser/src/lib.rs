//! nginx configuration loader for the host agent.
//!
//! This crate reads a root configuration file, follows its `include`
//! directives (literal paths and `*` globs) and merges every file into one
//! [`ConfigTree`]. Each value in the tree carries an index handle pointing
//! at the file and line it came from, and every file read is registered with
//! its size, modification time and permission bits.
//!
//! # Quick Start
//!
//! ```
//! use nginx_agent_parser::parse;
//!
//! let statements = parse("worker_processes auto;\nevents { worker_connections 512; }").unwrap();
//! assert_eq!(statements.len(), 2);
//! assert_eq!(statements[0].name(), "worker_processes");
//! assert_eq!(statements[1].line(), 2);
//! ```
//!
//! Loading a whole tree from disk:
//!
//! ```no_run
//! use nginx_agent_parser::ConfigLoader;
//!
//! let output = ConfigLoader::new("/etc/nginx/nginx.conf").load();
//! println!("{} files, {} errors", output.files.len(), output.errors.len());
//! let simple = output.tree.simplify();
//! ```
//!
//! # Modules
//!
//! - [`scanner`]: character cursor with backtracking
//! - [`grammar`]: ordered statement rules for a single file
//! - [`tree`]: the merged, index-annotated tree
//! - [`loader`]: include resolution, file registry and error accumulation
//! - [`error`]: error types

pub mod error;
pub mod grammar;
pub mod include;
pub mod loader;
pub mod meta;
pub mod scanner;
pub mod tree;

pub use error::{GrammarError, LoadError};
pub use grammar::{Statement, parse};
pub use include::resolve_include;
pub use loader::{ConfigLoader, DEFAULT_MAX_SIZE, IGNORED_DIRECTIVES, LoadOutput, SourceFile};
pub use meta::FileMeta;
pub use tree::{ConfigTree, ConfigValue, IndexEntry, IndexList, SimpleValue};
