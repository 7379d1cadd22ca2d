//! Statement grammar for a single configuration file.
//!
//! Each statement is tried against [`STATEMENT_RULES`] in order and the first
//! rule that accepts the input wins. A rule that does not match leaves the
//! scanner where it found it.

use crate::error::{GrammarError, GrammarResult};
use crate::scanner::{Scanner, ValueMode};

/// One parsed statement, annotated with the line its name starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A simple directive, e.g. `listen 80;`. The value is the raw text
    /// between the name and the terminating `;`, quotes included.
    Directive {
        name: String,
        value: String,
        line: usize,
    },
    /// A block, e.g. `location /status { ... }`. `args` is the header text
    /// after the name with runs of whitespace collapsed to one space.
    Block {
        name: String,
        args: String,
        line: usize,
        body: Vec<Statement>,
    },
}

impl Statement {
    pub fn name(&self) -> &str {
        match self {
            Statement::Directive { name, .. } => name,
            Statement::Block { name, .. } => name,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Statement::Directive { line, .. } => *line,
            Statement::Block { line, .. } => *line,
        }
    }
}

type Rule = fn(&mut Scanner<'_>) -> GrammarResult<Option<Statement>>;

/// Statement rules in the order they are tried.
///
/// Several directives take values containing `;`, braces or quotes that would
/// end a generic assignment early, so they are matched before it.
pub const STATEMENT_RULES: &[(&str, Rule)] = &[
    ("log_format", log_format),
    ("lua", lua_content),
    ("perl_set", perl_set),
    ("set", set),
    ("rewrite", rewrite),
    ("alias", alias),
    ("return", return_like),
    ("assignment", assignment),
    ("server_name", server_name),
    ("sub_filter", sub_filter),
    ("map", map_block),
    ("block", block),
];

/// Names the generic assignment rule never accepts.
const RESERVED_KEYS: &[&str] = &[
    "map",
    "alias",
    "perl_set",
    "if",
    "set",
    "rewrite",
    "server_name",
    "sub_filter",
];

/// Parse the text of one configuration file into statements.
pub fn parse(source: &str) -> GrammarResult<Vec<Statement>> {
    let mut scanner = Scanner::new(source);
    parse_items(&mut scanner, None)
}

/// Parse statements until end of input, or until the `}` closing the block
/// opened on `open_line`.
fn parse_items(scanner: &mut Scanner<'_>, open_line: Option<usize>) -> GrammarResult<Vec<Statement>> {
    let mut items = Vec::new();

    loop {
        scanner.skip_trivia();
        match (scanner.peek(), open_line) {
            (None, None) => return Ok(items),
            (None, Some(line)) => return Err(GrammarError::UnclosedBlock { line }),
            (Some('}'), Some(_)) => {
                scanner.advance();
                return Ok(items);
            }
            (Some('}'), None) => {
                return Err(GrammarError::UnmatchedCloseBrace {
                    line: scanner.line(),
                });
            }
            _ => items.push(statement(scanner)?),
        }
    }
}

fn statement(scanner: &mut Scanner<'_>) -> GrammarResult<Statement> {
    for (_, rule) in STATEMENT_RULES {
        let mark = scanner.mark();
        match rule(scanner)? {
            Some(statement) => return Ok(statement),
            None => scanner.reset(mark),
        }
    }

    Err(GrammarError::UnexpectedInput {
        found: scanner.preview(),
        line: scanner.line(),
    })
}

/// `<keyword> <anything up to ;>;`
fn keyword_directive(
    scanner: &mut Scanner<'_>,
    keyword: &str,
    needs_space: bool,
) -> GrammarResult<Option<Statement>> {
    let line = scanner.line();
    if !scanner.keyword(keyword) {
        return Ok(None);
    }
    if !scanner.skip_whitespace() && needs_space {
        return Ok(None);
    }
    let value = scanner.value(ValueMode::Any)?;
    if !scanner.eat(';') {
        return Ok(None);
    }
    Ok(Some(Statement::Directive {
        name: keyword.to_string(),
        value,
        line,
    }))
}

fn log_format(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    keyword_directive(scanner, "log_format", false)
}

fn set(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    keyword_directive(scanner, "set", false)
}

fn rewrite(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    keyword_directive(scanner, "rewrite", false)
}

fn alias(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    keyword_directive(scanner, "alias", true)
}

fn return_like(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    if let Some(statement) = keyword_directive(scanner, "return", true)? {
        return Ok(Some(statement));
    }
    keyword_directive(scanner, "error_page", true)
}

fn server_name(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    keyword_directive(scanner, "server_name", true)
}

fn sub_filter(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    keyword_directive(scanner, "sub_filter", true)
}

/// `lua_* '<code>';`, `*_by_lua* '<code>';` and `*_by_lua_block { <code> }`.
fn lua_content(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    let line = scanner.line();
    let Some(name) = scanner.name() else {
        return Ok(None);
    };
    if !(name.starts_with("lua_") || name.contains("_by_lua")) {
        return Ok(None);
    }
    scanner.skip_whitespace();

    let value = match scanner.peek() {
        Some('\'') => {
            let code = scanner.quoted('\'')?.to_string();
            scanner.skip_whitespace();
            if !scanner.eat(';') {
                return Ok(None);
            }
            code
        }
        Some('{') if name.ends_with("_by_lua_block") => {
            scanner.advance();
            scanner.raw_block(line)?
        }
        _ => return Ok(None),
    };

    Ok(Some(Statement::Directive {
        name: name.to_string(),
        value,
        line,
    }))
}

/// `perl_set $var '<perl code>';`
fn perl_set(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    let line = scanner.line();
    if !scanner.keyword("perl_set") {
        return Ok(None);
    }
    scanner.skip_whitespace();
    let start = scanner.mark();
    if scanner.name().is_none() {
        return Ok(None);
    }
    scanner.skip_whitespace();
    if scanner.peek() != Some('\'') {
        return Ok(None);
    }
    scanner.quoted('\'')?;
    let value = scanner.slice_from(start).to_string();
    scanner.skip_whitespace();
    if !scanner.eat(';') {
        return Ok(None);
    }
    Ok(Some(Statement::Directive {
        name: "perl_set".to_string(),
        value,
        line,
    }))
}

/// `<name> [value];` for any name not claimed by a more specific rule.
fn assignment(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    let line = scanner.line();
    let Some(name) = scanner.name() else {
        return Ok(None);
    };
    if RESERVED_KEYS.contains(&name) {
        return Ok(None);
    }
    let value = scanner.value(ValueMode::Strict)?;
    if !scanner.eat(';') {
        return Ok(None);
    }
    Ok(Some(Statement::Directive {
        name: name.to_string(),
        value,
        line,
    }))
}

/// `map <source> <target> { <key> [value]; ... }`
fn map_block(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    let line = scanner.line();
    if !scanner.keyword("map") || !scanner.skip_whitespace() {
        return Ok(None);
    }
    let Some(source) = scanner.map_value()? else {
        return Ok(None);
    };
    if !scanner.skip_whitespace() {
        return Ok(None);
    }
    let Some(target) = scanner.map_value()? else {
        return Ok(None);
    };
    scanner.skip_trivia();
    if !scanner.eat('{') {
        return Ok(None);
    }

    let mut body = Vec::new();
    loop {
        scanner.skip_trivia();
        match scanner.peek() {
            None => return Err(GrammarError::UnclosedBlock { line }),
            Some('}') => {
                scanner.advance();
                break;
            }
            _ => {}
        }

        let entry_line = scanner.line();
        let Some(key) = scanner.map_value()? else {
            return Err(unexpected(scanner));
        };
        scanner.skip_whitespace();
        let value = scanner.map_value()?.unwrap_or_default();
        scanner.skip_whitespace();
        if !scanner.eat(';') {
            return Err(unexpected(scanner));
        }
        body.push(Statement::Directive {
            name: key,
            value,
            line: entry_line,
        });
    }

    Ok(Some(Statement::Block {
        name: "map".to_string(),
        args: format!("{source} {target}"),
        line,
        body,
    }))
}

/// `<name> [args] { ... }` or `if (<condition>) { ... }`
fn block(scanner: &mut Scanner<'_>) -> GrammarResult<Option<Statement>> {
    let line = scanner.line();
    let (name, args) = if scanner.keyword("if") {
        scanner.skip_whitespace();
        let Some(condition) = scanner.parenthesized()? else {
            return Ok(None);
        };
        ("if".to_string(), condition)
    } else {
        let Some(name) = scanner.name() else {
            return Ok(None);
        };
        (name.to_string(), scanner.value(ValueMode::Strict)?)
    };

    scanner.skip_trivia();
    if !scanner.eat('{') {
        return Ok(None);
    }
    let body = parse_items(scanner, Some(line))?;

    Ok(Some(Statement::Block {
        name,
        args: normalize_args(&args),
        line,
        body,
    }))
}

fn normalize_args(args: &str) -> String {
    args.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unexpected(scanner: &Scanner<'_>) -> GrammarError {
    GrammarError::UnexpectedInput {
        found: scanner.preview(),
        line: scanner.line(),
    }
}
