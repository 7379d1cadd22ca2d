//! Builds one concrete string that a location regex matches.
//!
//! The sampler understands literals, escapes, `.`, character classes,
//! groups, alternation and quantifiers, always taking the first alternative
//! and the minimum repeat count. Anything else (lookaround, backreferences,
//! POSIX classes) yields `None`. Every sample is checked against the compiled
//! regex before it is returned.

use regex::Regex;
use tracing::debug;

/// Largest repeat count the sampler expands.
const MAX_REPEAT: usize = 64;

/// Longest sample, in bytes, the sampler builds.
const MAX_SAMPLE_LEN: usize = 1024;

/// Character used where the pattern accepts any character.
const ANY: char = 'a';

pub fn sample(pattern: &str) -> Option<String> {
    let mut sampler = Sampler {
        chars: pattern.chars().collect(),
        pos: 0,
    };
    let sampled = sampler.alternation()?;
    if sampler.pos != sampler.chars.len() {
        debug!(pattern, "unbalanced regex");
        return None;
    }

    let regex = Regex::new(pattern).ok()?;
    if regex.is_match(&sampled) {
        Some(sampled)
    } else {
        debug!(pattern, sample = %sampled, "regex sample does not match");
        None
    }
}

struct Sampler {
    chars: Vec<char>,
    pos: usize,
}

impl Sampler {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn alternation(&mut self) -> Option<String> {
        let first = self.sequence()?;
        while self.eat('|') {
            self.sequence()?;
        }
        Some(first)
    }

    fn sequence(&mut self) -> Option<String> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch == '|' || ch == ')' {
                break;
            }
            let atom = self.atom()?;
            let count = self.quantifier()?;
            if out.len().saturating_add(atom.len().saturating_mul(count)) > MAX_SAMPLE_LEN {
                debug!("regex sample too long");
                return None;
            }
            out.push_str(&atom.repeat(count));
        }
        Some(out)
    }

    fn atom(&mut self) -> Option<String> {
        match self.next()? {
            '(' => self.group(),
            '[' => self.class().map(String::from),
            '\\' => self.escape(),
            '.' => Some(ANY.to_string()),
            '^' | '$' => Some(String::new()),
            '*' | '+' | '?' | '{' => None,
            literal => Some(literal.to_string()),
        }
    }

    fn group(&mut self) -> Option<String> {
        if self.eat('?') {
            match self.next()? {
                ':' => {}
                'P' | '<' => {
                    if matches!(self.peek(), Some('=' | '!')) {
                        return None;
                    }
                    if self.chars.get(self.pos - 1) == Some(&'P') && !self.eat('<') {
                        return None;
                    }
                    while self.next()? != '>' {}
                }
                '=' | '!' => return None,
                _ => {
                    // inline flags: `(?i)` or `(?i:...)`
                    self.pos -= 1;
                    loop {
                        match self.next()? {
                            ')' => return Some(String::new()),
                            ':' => break,
                            c if c.is_ascii_alphabetic() || c == '-' => {}
                            _ => return None,
                        }
                    }
                }
            }
        }

        let inner = self.alternation()?;
        self.eat(')').then_some(inner)
    }

    fn escape(&mut self) -> Option<String> {
        let sampled = match self.next()? {
            'd' => '0',
            'w' | 'D' | 'S' => ANY,
            'W' => '-',
            's' => ' ',
            'n' => '\n',
            't' => '\t',
            'b' | 'B' | 'A' | 'z' | 'Z' => return Some(String::new()),
            '1'..='9' => return None,
            c if c.is_ascii_alphanumeric() => return None,
            literal => literal,
        };
        Some(sampled.to_string())
    }

    /// Samples a `[...]` class; the opening bracket is already consumed.
    fn class(&mut self) -> Option<char> {
        let negated = self.eat('^');
        let mut ranges: Vec<(char, char)> = Vec::new();
        let mut first = true;

        loop {
            let ch = self.next()?;
            if ch == ']' && !first {
                break;
            }
            first = false;

            let start = match ch {
                '[' if self.peek() == Some(':') => return None,
                '\\' => match self.next()? {
                    'd' => {
                        ranges.push(('0', '9'));
                        continue;
                    }
                    'w' => {
                        ranges.extend([('a', 'z'), ('A', 'Z'), ('0', '9'), ('_', '_')]);
                        continue;
                    }
                    's' => {
                        ranges.extend([(' ', ' '), ('\t', '\t'), ('\n', '\n')]);
                        continue;
                    }
                    c if c.is_ascii_alphanumeric() => return None,
                    literal => literal,
                },
                literal => literal,
            };

            if self.peek() == Some('-') && self.chars.get(self.pos + 1).is_some_and(|c| *c != ']') {
                self.pos += 1;
                let end = match self.next()? {
                    '\\' => self.next()?,
                    end => end,
                };
                if end < start {
                    return None;
                }
                ranges.push((start, end));
            } else {
                ranges.push((start, start));
            }
        }

        if negated {
            let contains = |c: char| ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c));
            ['a', 'z', '0', '_', '-', '.', '~']
                .into_iter()
                .find(|c| !contains(*c))
        } else {
            ranges.first().map(|(lo, _)| *lo)
        }
    }

    /// Minimum repeat count of the quantifier following an atom, 1 if none.
    fn quantifier(&mut self) -> Option<usize> {
        let count = match self.peek() {
            Some('*') | Some('?') => {
                self.pos += 1;
                0
            }
            Some('+') => {
                self.pos += 1;
                1
            }
            Some('{') => {
                self.pos += 1;
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    digits.push(c);
                    self.pos += 1;
                }
                let min: usize = digits.parse().ok()?;
                while self.next()? != '}' {}
                min
            }
            _ => return Some(1),
        };
        // lazy and possessive suffixes
        if !self.eat('?') {
            self.eat('+');
        }
        (count <= MAX_REPEAT).then_some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(sample("/nginx_status").as_deref(), Some("/nginx_status"));
        assert_eq!(sample(r"^/status\.json$").as_deref(), Some("/status.json"));
    }

    #[test]
    fn test_groups_and_alternation() {
        assert_eq!(sample("^/(status|stats)$").as_deref(), Some("/status"));
        assert_eq!(sample("^/(?:basic_)?status").as_deref(), Some("/status"));
        assert_eq!(sample("^/(?P<name>api)/status").as_deref(), Some("/api/status"));
        assert_eq!(sample("(?i)^/status").as_deref(), Some("/status"));
    }

    #[test]
    fn test_quantifiers_take_minimum() {
        assert_eq!(sample("^/status/?$").as_deref(), Some("/status"));
        assert_eq!(sample(r"^/s\d+").as_deref(), Some("/s0"));
        assert_eq!(sample("^/a{2,5}b").as_deref(), Some("/aab"));
        assert_eq!(sample("^/x.*").as_deref(), Some("/x"));
    }

    #[test]
    fn test_classes() {
        assert_eq!(sample("^/[a-z]+_status").as_deref(), Some("/a_status"));
        assert_eq!(sample("^/[^a-z]").as_deref(), Some("/0"));
        assert_eq!(sample(r"^/[\d]x").as_deref(), Some("/0x"));
    }

    #[test]
    fn test_unsupported_constructs_fail() {
        assert_eq!(sample("^/(?=status)"), None);
        assert_eq!(sample(r"^/(a)\1"), None);
        assert_eq!(sample("^/[[:alpha:]]"), None);
        assert_eq!(sample("^/(status"), None);
        assert_eq!(sample("^/status)"), None);
        assert_eq!(sample("*status"), None);
    }

    #[test]
    fn test_sample_length_is_bounded() {
        assert_eq!(sample("^/(a{16}){16}").map(|s| s.len()), Some(257));
        assert_eq!(sample("^/(a{64}){64}"), None);
        assert_eq!(sample("^/((((a{64}){64}){64}){64}){64}"), None);
    }
}
