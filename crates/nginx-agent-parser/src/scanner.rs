use crate::error::{GrammarError, GrammarResult};

/// Where an unquoted value stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Stops at an unquoted `;`, `{` or `}`. Regex quantifiers such as `{2,3}`,
    /// `${var}` references and escaped braces do not end the value.
    Strict,
    /// Stops only at an unquoted `;`.
    Any,
}

/// A saved scanner position, used to backtrack when a rule does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    offset: usize,
    line: usize,
}

/// Character-level cursor over one file's text.
///
/// The current line is tracked as the cursor moves and is restored together
/// with the offset on [`reset`](Scanner::reset), so every statement is
/// attributed to the line where its own text starts.
pub struct Scanner<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
        }
    }

    /// 1-based line of the cursor.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        self.offset = mark.offset;
        self.line = mark.line;
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    /// Source text between `mark` and the cursor.
    pub fn slice_from(&self, mark: Mark) -> &'a str {
        &self.source[mark.offset..self.offset]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    /// Consumes `expected` if it is the next character.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skips whitespace (newlines included). Returns whether anything was skipped.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.offset;
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
        self.offset > start
    }

    /// Skips whitespace and `#` comments.
    pub fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if self.peek() != Some('#') {
                break;
            }
            self.skip_to_line_end();
        }
    }

    fn skip_to_line_end(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Consumes `word` when it appears as a whole word at the cursor.
    pub fn keyword(&mut self, word: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with(word) {
            return false;
        }
        match rest[word.len()..].chars().next() {
            Some(ch) if is_word_char(ch) => false,
            _ => {
                for _ in word.chars() {
                    self.advance();
                }
                true
            }
        }
    }

    /// Reads a directive name: a run of characters up to whitespace, `;`, `{` or `}`.
    pub fn name(&mut self) -> Option<&'a str> {
        let start = self.offset;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, ';' | '{' | '}') {
                break;
            }
            self.advance();
        }
        (self.offset > start).then(|| &self.source[start..self.offset])
    }

    /// Reads a quoted string starting at the cursor and returns it with its quotes.
    ///
    /// A backslash escapes the following character, so `\'` does not close a
    /// single-quoted string.
    pub fn quoted(&mut self, quote: char) -> GrammarResult<&'a str> {
        let start = self.mark();
        self.advance();
        loop {
            match self.advance() {
                Some('\\') => {
                    if self.advance().is_none() {
                        return Err(GrammarError::UnterminatedString { line: start.line });
                    }
                }
                Some(ch) if ch == quote => return Ok(self.slice_from(start)),
                Some(_) => {}
                None => return Err(GrammarError::UnterminatedString { line: start.line }),
            }
        }
    }

    /// Reads a directive value up to its terminator (not consumed).
    ///
    /// Quoted sections are copied verbatim with their quotes. A `#` that follows
    /// whitespace starts a comment that runs to the end of the line and is left
    /// out of the value. The result is trimmed; interior newlines are kept.
    pub fn value(&mut self, mode: ValueMode) -> GrammarResult<String> {
        let mut value = String::new();
        let mut after_space = true;

        while let Some(ch) = self.peek() {
            match ch {
                ';' => break,
                '{' | '}' if mode == ValueMode::Strict => {
                    let Some(len) = self.peek_regex_quantifier() else {
                        break;
                    };
                    for _ in 0..len {
                        if let Some(c) = self.advance() {
                            value.push(c);
                        }
                    }
                }
                '\\' => {
                    self.advance();
                    value.push('\\');
                    if let Some(escaped) = self.advance() {
                        value.push(escaped);
                    }
                }
                '$' if self.peek_second() == Some('{') => {
                    // ${var} reference
                    while let Some(c) = self.advance() {
                        value.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                }
                '\'' | '"' => value.push_str(self.quoted(ch)?),
                '#' if after_space => {
                    self.skip_to_line_end();
                    continue;
                }
                _ => {
                    self.advance();
                    value.push(ch);
                }
            }
            after_space = value.ends_with(char::is_whitespace);
        }

        Ok(value.trim().to_string())
    }

    /// Reads one `map` entry token: a quoted string, or a run of characters up
    /// to whitespace, `;` or a brace. Backslash-escaped whitespace stays in the
    /// token.
    pub fn map_value(&mut self) -> GrammarResult<Option<String>> {
        if let Some(quote @ ('\'' | '"')) = self.peek() {
            return Ok(Some(self.quoted(quote)?.to_string()));
        }

        let start = self.mark();
        while let Some(ch) = self.peek() {
            if ch == '\\' && self.peek_second().is_some_and(char::is_whitespace) {
                self.advance();
                self.advance();
            } else if ch == '{' && let Some(len) = self.peek_regex_quantifier() {
                for _ in 0..len {
                    self.advance();
                }
            } else if ch.is_whitespace() || matches!(ch, ';' | '{' | '}') {
                break;
            } else {
                self.advance();
            }
        }

        let token = self.slice_from(start);
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    /// Reads a balanced `( ... )` group, as used by `if` conditions.
    ///
    /// Returns `None` when the cursor is not on `(` or the parentheses never balance.
    pub fn parenthesized(&mut self) -> GrammarResult<Option<String>> {
        if self.peek() != Some('(') {
            return Ok(None);
        }

        let start = self.mark();
        let mut depth = 0usize;
        while let Some(ch) = self.peek() {
            match ch {
                '\'' | '"' => {
                    self.quoted(ch)?;
                    continue;
                }
                '\\' => {
                    self.advance();
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(Some(self.slice_from(start).to_string()));
                    }
                }
                _ => {}
            }
            self.advance();
        }

        Ok(None)
    }

    /// Reads the body of a raw block (such as `content_by_lua_block`) after its
    /// opening brace, up to and including the matching closing brace.
    ///
    /// Braces inside string literals and `--` comments are not counted.
    pub fn raw_block(&mut self, open_line: usize) -> GrammarResult<String> {
        let start = self.mark();
        let mut depth = 1usize;

        loop {
            let Some(ch) = self.peek() else {
                return Err(GrammarError::UnclosedBlock { line: open_line });
            };
            match ch {
                '\'' | '"' => {
                    self.quoted(ch)?;
                    continue;
                }
                '-' if self.rest().starts_with("--") => {
                    self.skip_to_line_end();
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let content = self.slice_from(start).trim().to_string();
                        self.advance();
                        return Ok(content);
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// A short excerpt of the input at the cursor, for error messages.
    pub fn preview(&self) -> String {
        self.rest()
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(32)
            .collect()
    }

    /// Length in bytes of a regex quantifier like `{8}`, `{8,}` or `{1,3}` at
    /// the cursor, if there is one.
    fn peek_regex_quantifier(&self) -> Option<usize> {
        let remaining = self.rest();
        let mut chars = remaining.char_indices().peekable();

        // Must start with '{'
        if chars.next().map(|(_, ch)| ch) != Some('{') {
            return None;
        }

        // Must have at least one digit
        if !chars.peek().is_some_and(|(_, ch)| ch.is_ascii_digit()) {
            return None;
        }
        while chars.peek().is_some_and(|(_, ch)| ch.is_ascii_digit()) {
            chars.next();
        }

        if chars.peek().is_some_and(|(_, ch)| *ch == ',') {
            chars.next();
            while chars.peek().is_some_and(|(_, ch)| ch.is_ascii_digit()) {
                chars.next();
            }
        }

        match chars.next() {
            Some((idx, '}')) => Some(idx + 1),
            _ => None,
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
