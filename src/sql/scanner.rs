use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::error::Result;
use crate::{errlex, errnest};

/// The kind of a scanner token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// An identifier or keyword, e.g. SELECT or person_id.
    Word,
    /// One of + - * / || = < <= > >= <> !=
    Operator,
    /// Punctuation: , or .
    SpecialChar,
    /// A named bind parameter, e.g. :person_id.
    BindParameter,
    /// The name of a portability macro, e.g. table in [:table ...].
    PortabilityFunction,
    /// A key=value argument of a portability macro.
    PortabilityArg,
    /// The ; statement terminator.
    EndOfStatement,
    OpenParen,
    CloseParen,
    IntegerLiteral,
    FloatLiteral,
    /// A single-quoted string literal, quotes and '' escapes included.
    StringLiteral,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A scanner token: its kind and the exact source text it matched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::EndOfStatement | TokenKind::OpenParen | TokenKind::CloseParen => {
                write!(f, "{}", self.kind)
            }
            kind => write!(f, "{kind}({:?})", self.text),
        }
    }
}

/// Lexical state of the scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Plain SQL.
    Default,
    /// Inside a [: ... ] portability macro.
    Portability,
}

/// The scanner tokenizes SQL text in the Cerebrum dialect as an iterator of
/// tokens. At each position it takes the longest match of any lexical rule,
/// so e.g. <= is a single operator and -1 a single integer literal.
/// Whitespace and comments are discarded.
///
/// The scanner tracks parenthesis nesting: a ; or the end of input with
/// unclosed parentheses, or a ) without a matching (, is a nesting error.
/// Any character that no rule matches is a lex error. The iterator yields no
/// further tokens after an error.
pub struct Scanner {
    input: Vec<char>,
    pos: usize,
    state: State,
    depth: usize,
    done: bool,
}

impl Iterator for Scanner {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Result<Token>> {
        if self.done {
            return None;
        }
        let result = self.scan().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}

impl Scanner {
    /// Creates a new scanner for the given input string.
    pub fn new(input: &str) -> Self {
        Self { input: input.chars().collect(), pos: 0, state: State::Default, depth: 0, done: false }
    }

    /// Creates a new scanner for the entire contents of a reader.
    pub fn from_reader(mut reader: impl Read, encoding: Encoding) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::new(&encoding.decode(bytes)?))
    }

    /// Returns the character at the given offset from the current position.
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    /// Returns true if the input at the current position starts with s.
    fn lookahead(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    /// Consumes n characters and returns them as a string.
    fn take(&mut self, n: usize) -> String {
        let end = (self.pos + n).min(self.input.len());
        let text = self.input[self.pos..end].iter().collect();
        self.pos = end;
        text
    }

    /// Returns the number of consecutive characters at offset matching the
    /// predicate.
    fn count_at(&self, offset: usize, predicate: impl Fn(char) -> bool) -> usize {
        self.input.iter().skip(self.pos + offset).take_while(|c| predicate(**c)).count()
    }

    /// Formats the 1-based line and column of an input position.
    fn location(&self, pos: usize) -> String {
        let before = &self.input[..pos.min(self.input.len())];
        let line = before.iter().filter(|c| **c == '\n').count() + 1;
        let column = before.iter().rev().take_while(|c| **c != '\n').count() + 1;
        format!("line {line} column {column}")
    }

    /// Scans the next token, if any.
    fn scan(&mut self) -> Result<Option<Token>> {
        loop {
            self.pos += self.count_at(0, is_whitespace);
            match self.state {
                State::Default => {
                    if self.peek().is_none() {
                        return self.scan_end();
                    }
                    if self.skip_comment()? {
                        continue;
                    }
                    if self.lookahead("[:") {
                        self.pos += 2;
                        self.state = State::Portability;
                        continue;
                    }
                    return self.scan_token().map(Some);
                }
                State::Portability => match self.peek() {
                    Some(']') => {
                        self.pos += 1;
                        self.state = State::Default;
                    }
                    Some(_) => return self.scan_portability().map(Some),
                    None => {
                        return errlex!(
                            "unterminated portability macro at {}",
                            self.location(self.pos)
                        );
                    }
                },
            }
        }
    }

    /// Handles the end of input, checking that all parentheses are closed.
    fn scan_end(&mut self) -> Result<Option<Token>> {
        if self.depth > 0 {
            return errnest!(
                "unterminated statement: {} unclosed parentheses at end of input",
                self.depth
            );
        }
        Ok(None)
    }

    /// Skips a line or block comment at the current position, if any.
    fn skip_comment(&mut self) -> Result<bool> {
        if self.lookahead("--") {
            self.pos += self.count_at(0, |c| c != '\n');
            return Ok(true);
        }
        if self.lookahead("/*") {
            let start = self.pos;
            self.pos += 2;
            // Block comments don't nest: the first */ closes the comment.
            while !self.lookahead("*/") {
                if self.peek().is_none() {
                    return errlex!("unterminated block comment at {}", self.location(start));
                }
                self.pos += 1;
            }
            self.pos += 2;
            return Ok(true);
        }
        Ok(false)
    }

    /// Scans a token in the default state.
    fn scan_token(&mut self) -> Result<Token> {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return errlex!("unexpected end of input");
        };
        let token = match c {
            '\'' => Token::new(TokenKind::StringLiteral, self.take_string()?),
            c if is_name_start(c) => Token::new(TokenKind::Word, self.take_name()),
            ':' if self.peek_at(1).is_some_and(is_name_start) => {
                self.pos += 1;
                Token::new(TokenKind::BindParameter, format!(":{}", self.take_name()))
            }
            '(' => {
                self.depth += 1;
                Token::new(TokenKind::OpenParen, self.take(1))
            }
            ')' => {
                if self.depth == 0 {
                    return errnest!("unmatched ) at {}", self.location(start));
                }
                self.depth -= 1;
                Token::new(TokenKind::CloseParen, self.take(1))
            }
            ';' => {
                if self.depth > 0 {
                    return errnest!(
                        "statement terminated at {} with {} unclosed parentheses",
                        self.location(start),
                        self.depth
                    );
                }
                Token::new(TokenKind::EndOfStatement, self.take(1))
            }
            _ => match self.scan_symbol() {
                Some(token) => token,
                None => return errlex!("unexpected character {c:?} at {}", self.location(start)),
            },
        };
        Ok(token)
    }

    /// Scans a number, operator or punctuation token, whichever match is
    /// longest. Numbers win ties, which can't happen with the current rules.
    fn scan_symbol(&mut self) -> Option<Token> {
        let number = self.number_len();
        let operator = self.operator_len().map(|len| (len, TokenKind::Operator));
        let special = matches!(self.peek(), Some(',' | '.')).then_some((1, TokenKind::SpecialChar));
        let (len, kind) = [number, operator, special]
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, TokenKind)>, candidate| match best {
                Some(best) if best.0 >= candidate.0 => Some(best),
                _ => Some(candidate),
            })?;
        Some(Token::new(kind, self.take(len)))
    }

    /// Returns the length and kind of a number literal at the current
    /// position, if any:
    ///
    /// integer: [+-]? digits
    /// float:   [+-]? (digits exp | digits . digits? exp? | . digits exp?)
    /// exp:     [Ee] [+-]? digits
    fn number_len(&self) -> Option<(usize, TokenKind)> {
        let mut len = usize::from(matches!(self.peek(), Some('+' | '-')));
        let digits = self.count_at(len, |c| c.is_ascii_digit());
        len += digits;
        let mut kind = TokenKind::IntegerLiteral;
        if self.peek_at(len) == Some('.') {
            let fraction = self.count_at(len + 1, |c| c.is_ascii_digit());
            if digits > 0 || fraction > 0 {
                len += 1 + fraction;
                kind = TokenKind::FloatLiteral;
            }
        }
        if kind == TokenKind::IntegerLiteral && digits == 0 {
            return None;
        }
        if let Some(exponent) = self.exponent_len(len) {
            len += exponent;
            kind = TokenKind::FloatLiteral;
        }
        Some((len, kind))
    }

    /// Returns the length of an exponent at the given offset, if any.
    fn exponent_len(&self, offset: usize) -> Option<usize> {
        if !matches!(self.peek_at(offset), Some('e' | 'E')) {
            return None;
        }
        let sign = usize::from(matches!(self.peek_at(offset + 1), Some('+' | '-')));
        let digits = self.count_at(offset + 1 + sign, |c| c.is_ascii_digit());
        (digits > 0).then_some(1 + sign + digits)
    }

    /// Returns the length of an operator at the current position, if any.
    fn operator_len(&self) -> Option<usize> {
        if ["||", "<=", ">=", "<>", "!="].iter().any(|op| self.lookahead(op)) {
            return Some(2);
        }
        matches!(self.peek(), Some('+' | '-' | '*' | '/' | '=' | '<' | '>')).then_some(1)
    }

    /// Consumes a name, i.e. a letter or underscore followed by letters,
    /// digits and underscores.
    fn take_name(&mut self) -> String {
        let len = self.count_at(0, |c| c.is_ascii_alphanumeric() || c == '_');
        self.take(len)
    }

    /// Consumes a string literal, returning it verbatim including quotes.
    fn take_string(&mut self) -> Result<String> {
        let start = self.pos;
        let mut len = 1;
        loop {
            match self.peek_at(len) {
                Some('\'') if self.peek_at(len + 1) == Some('\'') => len += 2,
                Some('\'') => break,
                Some(_) => len += 1,
                None => {
                    return errlex!("unterminated string literal at {}", self.location(start));
                }
            }
        }
        Ok(self.take(len + 1))
    }

    /// Scans a portability function name or key=value argument.
    fn scan_portability(&mut self) -> Result<Token> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_name_start(c) => {}
            Some(c) => {
                return errlex!(
                    "unexpected character {c:?} in portability macro at {}",
                    self.location(start)
                );
            }
            None => return errlex!("unterminated portability macro at {}", self.location(start)),
        }
        let name = self.take_name();
        if self.peek() != Some('=') {
            return Ok(Token::new(TokenKind::PortabilityFunction, name));
        }
        self.pos += 1;
        let value = match self.peek() {
            Some('\'') => self.take_string()?,
            Some(c) if is_name_start(c) => self.take_name(),
            _ => match self.number_len() {
                Some((len, _)) => self.take(len),
                None => {
                    return errlex!(
                        "invalid value for portability argument {name} at {}",
                        self.location(start)
                    );
                }
            },
        };
        Ok(Token::new(TokenKind::PortabilityArg, format!("{name}={value}")))
    }
}

/// Returns true if the character is whitespace discarded by the scanner.
fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

/// Returns true if the character can start a name.
fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
